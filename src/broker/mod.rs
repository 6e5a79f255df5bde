//! The broker: storage ownership plus the TCP accept loop.

mod connection;
mod handlers;
pub mod router;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::constants::DEFAULT_SEGMENT_SIZE_LIMIT;
use crate::storage::error::Result as StorageResult;
use crate::storage::offsets::OffsetStore;
use crate::storage::LogStorage;
use router::Router;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Listen address.
    pub addr: String,

    /// Root directory for partition logs and committed offsets.
    pub root: PathBuf,

    /// Size limit of a single log segment in bytes.
    pub segment_size_limit: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:8000".to_owned(),
            root: PathBuf::from("data"),
            segment_size_limit: DEFAULT_SEGMENT_SIZE_LIMIT,
        }
    }
}

/// A single-node broker.
///
/// [`LogStorage`] and [`OffsetStore`] are created once here and shared by
/// every connection task; nothing about them is implicit.
#[derive(Debug)]
pub struct Broker {
    config: BrokerConfig,
    router: Arc<Router>,
    log_storage: Arc<LogStorage>,
    offset_store: Arc<OffsetStore>,
}

impl Broker {
    /// Recovers (or initializes) storage under the configured root.
    pub fn new(config: BrokerConfig) -> StorageResult<Self> {
        let log_storage = Arc::new(LogStorage::load_from_root(
            &config.root,
            config.segment_size_limit,
        )?);
        let offset_store = Arc::new(OffsetStore::load_from_root(&config.root)?);
        let router = Arc::new(Router::new(
            Arc::clone(&log_storage),
            Arc::clone(&offset_store),
        ));
        Ok(Self {
            config,
            router,
            log_storage,
            offset_store,
        })
    }

    pub fn log_storage(&self) -> &Arc<LogStorage> {
        &self.log_storage
    }

    pub fn offset_store(&self) -> &Arc<OffsetStore> {
        &self.offset_store
    }

    /// Binds the configured address and serves until the task is cancelled.
    pub async fn serve(self) -> io::Result<()> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!(addr = %self.config.addr, root = %self.config.root.display(), "broker listening");
        self.serve_on(listener).await
    }

    /// Serves connections from an already-bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "accepted connection");
            tokio::spawn(connection::handle_connection(
                stream,
                Arc::clone(&self.router),
            ));
        }
    }
}
