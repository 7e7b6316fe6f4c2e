use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use cartpulse_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cartpulse=info".parse()?),
        )
        .json()
        .init();

    let cfg = cartpulse_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Ensure the data directory exists before opening DuckDB.
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/cartpulse.db", cfg.data_dir);
    let db = cartpulse_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    let state = Arc::new(AppState::new(db, cfg.clone()));

    // Background stats-refresh task, fed by the write path's shop-touch
    // signals.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_refresh_loop().await;
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = cartpulse_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, "CartPulse listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
