mod api;
mod middleware;
mod slots;

use std::sync::Arc;
use std::time::Duration;

use stylesync_scraper::{ChromeLauncher, JobSettings};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
    slots::BrowserSlots,
};

/// How long running jobs get to close their browsers after shutdown begins.
const JOB_DRAIN_BOUND: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = stylesync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if config.credentials.is_none() {
        tracing::warn!("SPY_USER / SPY_PASS not set; every job will fail authentication");
    }

    let auth = AuthState::new(
        &config.api_keys,
        matches!(config.env, stylesync_core::Environment::Development),
    )?;
    let slots = BrowserSlots::new(config.max_browsers);
    let state = AppState {
        launcher: Arc::new(ChromeLauncher::new(config.browser.clone())),
        settings: Arc::new(JobSettings::from_config(&config)),
        slots: slots.clone(),
    };
    let app = build_app(state, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        base_url = %config.base_url,
        max_browsers = slots.capacity(),
        "stylesync server listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Streamed jobs outlive their connections; let them close their browsers.
    if !slots.drain(JOB_DRAIN_BOUND).await {
        tracing::warn!(in_use = slots.in_use(), "browser jobs still running at exit");
    }
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM. A signal source that cannot be installed
/// is logged and never fires, leaving the other one in charge.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown requested; refusing new jobs");
}
