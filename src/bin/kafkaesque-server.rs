use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kafkaesque::broker::{Broker, BrokerConfig};
use kafkaesque::constants::DEFAULT_SEGMENT_SIZE_LIMIT;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    target: Target,
}

#[derive(Subcommand, Debug)]
enum Target {
    /// Run the message broker.
    Broker {
        /// Listen address.
        #[arg(long, default_value = "localhost:8000")]
        addr: String,

        /// Root directory for partition logs and committed offsets.
        #[arg(long, default_value = "data")]
        root: PathBuf,

        /// Size limit of a single log segment in bytes.
        #[arg(long, default_value_t = DEFAULT_SEGMENT_SIZE_LIMIT)]
        segment_size_limit: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.target {
        Target::Broker {
            addr,
            root,
            segment_size_limit,
        } => {
            let broker = Broker::new(BrokerConfig {
                addr,
                root,
                segment_size_limit,
            })
            .context("cannot initialize broker storage")?;

            tokio::select! {
                result = broker.serve() => result.context("broker terminated")?,
                _ = tokio::signal::ctrl_c() => info!("shutting down"),
            }
        }
    }
    Ok(())
}
