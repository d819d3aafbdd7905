use std::sync::Arc;

use agrimarket_auth::{
    app,
    auth::repo::{AccountStore, PgAccountStore},
    config::AppConfig,
    db,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "agrimarket_auth=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(env = ?config.env, port = config.port, "configuration loaded");

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;

    let accounts: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool.clone()));
    let state = AppState::new(config, accounts)?;
    let config = Arc::clone(&state.config);
    let router = app::build_app(state)?;

    let served = app::serve(router, &config).await;

    pool.close().await;
    tracing::info!("database pool closed");
    served
}
