pub mod api;
pub mod compliance;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod pipeline;

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::CoreState;

pub fn run() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("EquiRoute starting v{}", config::APP_VERSION);

    let args: Vec<String> = std::env::args().collect();
    match serve(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "EquiRoute stopped");
            ExitCode::FAILURE
        }
    }
}

fn serve(args: &[String]) -> Result<(), String> {
    let config = AppConfig::load(args).map_err(|e| e.to_string())?;
    let core = Arc::new(CoreState::from_config(&config).map_err(|e| e.to_string())?);

    // Resume interrupted jobs before accepting uploads
    core.start_worker().map_err(|e| e.to_string())?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("Cannot start runtime: {e}"))?;
    let result = runtime.block_on(async {
        let server = api::start_api_server(core.clone(), &config.server.bind).await?;
        tracing::info!(addr = %server.addr, "Listening");

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| format!("Cannot listen for shutdown signal: {e}"))?;
        tracing::info!("Shutdown requested");
        server.stop().await;
        Ok::<(), String>(())
    });

    core.stop_worker();
    result
}
