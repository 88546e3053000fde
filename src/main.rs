use anyhow::Context;
use moxie_gateway::api::{self, app_state::AppState};
use moxie_gateway::config::loader::ConfigLoader;
use moxie_gateway::observability::{HealthCheckResult, init_tracing};
use moxie_gateway::services::executor::{CliExecutor, ModelExecutor};
use moxie_gateway::storage::profile_storage::JsonFileProfileStorage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    ConfigLoader::validate(&config).context("invalid configuration")?;

    let _log_guard = init_tracing(&config.app_name, &config.logging)?;
    info!(
        environment = %config.environment,
        "Starting {}...",
        config.app_name
    );

    let executor = Arc::new(CliExecutor::from_config(&config.executor));
    info!(cli = %config.executor.cli_path.display(), "Model executor configured");

    let verify = config.executor.verify_on_startup;
    let profile_storage = Arc::new(JsonFileProfileStorage::new(&config.identity.profiles_dir));
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::build(config, executor.clone(), profile_storage).await?;
    info!("Application state created");

    if verify {
        let started = Instant::now();
        let healthy = executor.verify().await;
        let latency_ms = started.elapsed().as_millis() as u64;
        if healthy {
            info!(latency_ms, "Model CLI verified");
        } else {
            warn!("Model CLI verification failed; chat requests will fail until it is available");
        }
        state
            .observability
            .add_health_check(HealthCheckResult {
                name: "model_cli".to_string(),
                healthy,
                message: if healthy {
                    "model CLI responded".to_string()
                } else {
                    "model CLI did not respond".to_string()
                },
                latency_ms,
            })
            .await;
    }

    let cleanup = state.sessions.start_cleanup();
    let router = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.stop().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
