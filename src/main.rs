use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use contract_query_router::{
    query_router::QueryEngine,
    settings::{Args, Settings},
    web,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let settings =
        Settings::from_file(args.config.as_deref()).context("failed to load settings")?;

    let tables = settings
        .engine
        .load_tables()
        .context("failed to load rule tables")?;
    info!(version = tables.version(), "rule tables loaded");

    let engine = Arc::new(QueryEngine::new(tables));
    web::serve(engine, Arc::new(settings.engine), settings.web.address).await;
    Ok(())
}
