pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, UserCommands};
pub use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use state::SharedState;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(handle)
    } else {
        None
    };

    init_tracing(&config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config, prometheus_handle).await,

        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists; leaving it untouched.");
            }
            Ok(())
        }

        Commands::User { command } => match command {
            UserCommands::Create {
                username,
                email,
                first_name,
                last_name,
                role,
                manager,
                password,
            } => {
                cli::cmd_user_create(
                    &config, username, email, first_name, last_name, &role, manager, password,
                )
                .await
            }
            UserCommands::List => cli::cmd_user_list(&config).await,
            UserCommands::ResetPassword { username, password } => {
                cli::cmd_user_reset_password(&config, &username, password).await
            }
            UserCommands::Deactivate { username } => {
                cli::cmd_user_deactivate(&config, &username).await
            }
            UserCommands::Tree { username } => cli::cmd_user_tree(&config, &username).await,
        },
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "RMS Directory v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let port = config.server.port;
    if !config.server.secure_cookies {
        warn!("Session cookies are not marked Secure; only use this behind HTTPS termination or locally");
    }

    let shared = Arc::new(SharedState::new(config).await?);

    match shared.ensure_bootstrap_admin().await {
        Ok(Some(admin)) => info!(username = %admin.username(), "Bootstrap administrator created"),
        Ok(None) => {}
        Err(e) => error!(error = %e, "Failed to provision bootstrap administrator"),
    }

    let api_state = api::create_app_state(shared, prometheus_handle);
    let app = api::router(api_state).await;

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("🌐 Web Server running at http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}
