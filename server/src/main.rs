use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::file_store::FileStore;
use server::network::WorldServer;
use server::store::{MemoryStore, Store};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::parse();

    let store: Arc<dyn Store> = match &config.data_dir {
        Some(dir) => Arc::new(FileStore::open(dir).await?),
        None => {
            info!("No data directory given, blocks and names live in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    info!(
        "Roster mode {:?}, chunk size {}, cold start {}",
        config.roster_mode, config.chunk_size, config.cold_start
    );

    let server = WorldServer::bind(
        &config.address(),
        store,
        config.invocation_settings(),
        !config.cold_start,
    )
    .await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
