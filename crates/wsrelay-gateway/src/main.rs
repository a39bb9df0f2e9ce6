//! wsrelay gateway
//!
//! - Dial the relay endpoint and keep one session alive (heartbeat, dispatch, redial)
//! - Serve model requests arriving over that session from the Ollama backend
//! - Optional local hub: /ws broadcast groups plus /healthz, /readyz, /metrics
//! - Ctrl-C drains: readiness flips, sessions close, the driver stops redialing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use wsrelay_core::error::{RelayError, Result};
use wsrelay_gateway::backend::{CachedBackend, ModelBackend, OllamaBackend};
use wsrelay_gateway::config::{self, RelayConfig};
use wsrelay_gateway::dispatch::HandlerRegistry;
use wsrelay_gateway::obs::RelayMetrics;
use wsrelay_gateway::session::{BackoffPolicy, ReconnectDriver, SessionConfig};
use wsrelay_gateway::transport::WsDialer;
use wsrelay_gateway::{app_state, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = config::config_path();
    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%path, error = %e, "config load failed");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cfg).await {
        error!(error = %e, "wsrelay-gateway stopped");
        std::process::exit(1);
    }
}

async fn run(cfg: RelayConfig) -> Result<()> {
    let metrics = Arc::new(RelayMetrics::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ollama = OllamaBackend::new(
        &cfg.backend.base_url,
        Duration::from_millis(cfg.backend.request_timeout_ms),
    )?;
    let backend: Arc<dyn ModelBackend> = Arc::new(CachedBackend::new(
        ollama,
        Duration::from_millis(cfg.backend.list_cache_ttl_ms),
    ));
    let handlers = Arc::new(HandlerRegistry::with_backend(backend));
    info!(actions = ?handlers.registered_actions(), backend = %cfg.backend.base_url, "handlers registered");

    let driver = ReconnectDriver::new(
        WsDialer::new(cfg.relay.url.clone(), cfg.relay.auth_token.clone()),
        BackoffPolicy::from(&cfg.relay),
        handlers,
        Arc::clone(&metrics),
        SessionConfig::from(&cfg.relay),
        shutdown_rx.clone(),
    );
    let sessions = driver.sessions();
    info!(url = %cfg.relay.url, "wsrelay-gateway starting");
    let driver_task = tokio::spawn(driver.run());

    let hub_task = if cfg.hub.enabled {
        let listen: SocketAddr = cfg
            .hub
            .listen
            .parse()
            .map_err(|e| RelayError::Config(format!("hub.listen: {e}")))?;
        let listener = tokio::net::TcpListener::bind(listen)
            .await
            .map_err(|e| RelayError::Transport(format!("bind {listen} failed: {e}")))?;

        let state = app_state::AppState::new(cfg.clone(), Arc::clone(&metrics), sessions, shutdown_rx.clone());
        let app = router::build_router(state);
        let mut stop = shutdown_rx.clone();
        info!(%listen, "hub listening");

        Some(tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = stop.wait_for(|v| *v).await;
            });
            if let Err(e) = serve.await {
                error!(error = %e, "hub server failed");
            }
        }))
    } else {
        None
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "ctrl-c handler failed; shutting down");
    }
    info!("shutdown requested; draining");
    metrics.set_draining();
    let _ = shutdown_tx.send(true);

    if let Err(e) = driver_task.await {
        error!(error = %e, "reconnect driver task failed");
    }
    if let Some(task) = hub_task {
        if let Err(e) = task.await {
            error!(error = %e, "hub task failed");
        }
    }
    info!("wsrelay-gateway stopped");
    Ok(())
}
