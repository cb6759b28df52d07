use anyhow::Context;
use log::info;
use std::sync::Arc;

use smart_study::api::{app_router, ApiState};
use smart_study::config::Config;
use smart_study::db::Db;
use smart_study::scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let db = Db::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;
    if config.seed_database {
        db.seed_database_if_empty().await?;
    }

    let state = ApiState {
        scheduler: Arc::new(Scheduler::new(db)),
        new_item_limit: config.new_item_limit,
    };
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("smart-study listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
