use clap::Parser; // for cli
use std::sync::Arc;

use turbo_server::{AppState, Args, Config, logging, server};

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();
    let config = Config::load(&args)?;
    logging::init(&config.log)?;

    // creating shared state
    let state = Arc::new(AppState::from_config(config)?);

    server::serve(state).await
}
