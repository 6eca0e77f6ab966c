use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

mod app;
mod config;

use app::Application;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = config::env_file_path(std::env::var_os("ENV_FILE_PATH"));
    let env_loaded = config::load_env_file(&env_file);

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "nodescope=info,nodescope_mcp=info,nodescope_core=info,tower_http=info".into()
            }),
        )
        .with_target(false)
        .init();

    match env_loaded {
        Ok(true) => tracing::info!("Loaded environment from {}", env_file.display()),
        Ok(false) => tracing::debug!("No env file at {}", env_file.display()),
        Err(e) => tracing::warn!("Failed to load env file {}: {}", env_file.display(), e),
    }

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;
    tracing::info!(?config, "Starting nodescope");

    let app = Application::new(&config).context("Failed to create application")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    app.run(cancel).await.context("Application failed")?;

    app.stop(config.shutdown_timeout)
        .await
        .context("Application failed while stopping")?;

    tracing::info!("Application finished gracefully");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received SIGINT"),
            Err(e) => {
                tracing::error!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM");
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
