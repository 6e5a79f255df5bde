use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use kafkaesque::broker::{Broker, BrokerConfig};
use kafkaesque::storage::LogStorage;
use kafkaesque::storage::offsets::OffsetStore;

/// Starts log output if `RUST_LOG` is set.
pub fn maybe_start_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

pub struct TestBroker {
    pub addr: String,
    pub log_storage: Arc<LogStorage>,
    pub offset_store: Arc<OffsetStore>,
    task: JoinHandle<()>,
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs a broker over `root` on an ephemeral port.
pub async fn start_broker(root: &Path, segment_size_limit: u64) -> TestBroker {
    maybe_start_logging();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let broker = Broker::new(BrokerConfig {
        addr: addr.clone(),
        root: root.to_path_buf(),
        segment_size_limit,
    })
    .unwrap();
    let log_storage = Arc::clone(broker.log_storage());
    let offset_store = Arc::clone(broker.offset_store());

    let task = tokio::spawn(async move {
        let _ = broker.serve_on(listener).await;
    });

    TestBroker {
        addr,
        log_storage,
        offset_store,
        task,
    }
}
