use anyhow::Result;
use ingest_harness::{Application, Error};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let app = Application::from_environment(config_path.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&app.settings().logging.level))
        .map_err(|_| Error::invalid_config("logging.level"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(run = %app.run_id(), "Starting ingest harness");

    let sessions = app.run().await;
    app.write_report(&sessions, &mut std::io::stdout().lock())?;

    Ok(())
}
