//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics
//! - Compile the rule table and start the config watcher
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, an invalid rule table never serves
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::{load_config, ConfigError, ConfigWatcher};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("failed to watch configuration: {0}")]
    Watch(#[from] notify::Error),

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// What to start.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub config_path: PathBuf,
    pub profile: Option<String>,
    /// Reload rules when the config file changes.
    pub watch: bool,
}

/// Run the proxy until a termination signal arrives.
pub async fn serve(options: StartupOptions) -> Result<(), StartupError> {
    let config = load_config(&options.config_path)?;
    logging::init_logging(&config.observability);

    tracing::info!(
        config = %options.config_path.display(),
        bind_address = %config.listener.bind_address,
        rules = config.rules.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation already checked the address.
        if let Ok(addr) = config.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr);
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, options.profile.clone())?;

    let (_watcher, config_updates) = if options.watch {
        let (watcher, updates) = ConfigWatcher::new(&options.config_path);
        (Some(watcher.run()?), updates)
    } else {
        let (_tx, updates) = mpsc::unbounded_channel();
        (None, updates)
    };

    let listener = TcpListener::bind(bind_address.as_str())
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let _signals = signals::spawn_signal_handler(shutdown);

    server
        .run(listener, config_updates, server_shutdown)
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
