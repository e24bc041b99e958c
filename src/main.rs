//! Development reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                  DEV PROXY                    │
//!     Browser request     │  ┌────────┐    ┌──────────┐    ┌──────────┐  │
//!     ────────────────────┼─▶│  http  │───▶│ routing  │───▶│ forward  │──┼──▶ Backend
//!                         │  │ server │    │ resolver │    │ upstream │  │   (per rule)
//!                         │  └────────┘    └────┬─────┘    └──────────┘  │
//!                         │                     │                         │
//!                         │          Redirect ◀─┴─▶ NoMatch               │
//!                         │        (bypass answer)  (static fallback/404) │
//!                         │                                               │
//!                         │  config (TOML + watcher) · observability      │
//!                         │  lifecycle (startup / signals / shutdown)     │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use dev_proxy::config::{load_config, ConfigError};
use dev_proxy::lifecycle::{self, StartupOptions};
use dev_proxy::routing::{Router, RoutingOutcome};

#[derive(Parser)]
#[command(name = "dev-proxy")]
#[command(about = "Development reverse proxy driven by an ordered rule table", long_about = None)]
struct Cli {
    /// Rule table and server settings.
    #[arg(short, long, global = true, default_value = "dev-proxy.toml")]
    config: PathBuf,

    /// Only rules for this profile (plus unrestricted ones) are active.
    #[arg(short, long, global = true, env = "DEV_PROXY_PROFILE")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy
    Serve {
        /// Do not reload rules when the config file changes
        #[arg(long)]
        no_watch: bool,
    },
    /// Validate the config and print the active rule table
    Check,
    /// Print the routing decision for a request path
    Resolve {
        /// Path and query, e.g. `/api/users?page=2`
        path: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result: Result<(), Box<dyn Error>> = match cli.command {
        Commands::Serve { no_watch } => lifecycle::serve(StartupOptions {
            config_path: cli.config,
            profile: cli.profile,
            watch: !no_watch,
        })
        .await
        .map_err(Into::into),
        Commands::Check => check(&cli.config, cli.profile.as_deref()),
        Commands::Resolve { path } => resolve(&cli.config, cli.profile.as_deref(), &path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn active_table(path: &Path, profile: Option<&str>) -> Result<Router, ConfigError> {
    let config = load_config(path)?;
    Router::from_config(config.rules_for(profile)).map_err(ConfigError::Validation)
}

fn check(path: &Path, profile: Option<&str>) -> Result<(), Box<dyn Error>> {
    let table = active_table(path, profile)?;

    println!("{}: OK, {} active rule(s)", path.display(), table.rules().len());
    for (index, rule) in table.rules().iter().enumerate() {
        println!("  {}. {} [{}] -> {}", index + 1, rule.name(), rule.describe_match(), rule.target());
    }
    Ok(())
}

fn resolve(path: &Path, profile: Option<&str>, request_path: &str) -> Result<(), Box<dyn Error>> {
    let table = active_table(path, profile)?;
    let outcome = table.resolve(request_path)?;

    let rendered = serde_json::to_string_pretty(&outcome_json(&outcome))?;
    println!("{rendered}");
    Ok(())
}

fn outcome_json(outcome: &RoutingOutcome) -> Value {
    match outcome {
        RoutingOutcome::Forward(forward) => json!({
            "outcome": "forward",
            "rule": &*forward.rule,
            "target": forward.target.to_string(),
            "path": forward.path,
            "change_origin": forward.change_origin,
            "follow_redirects": forward.follow_redirects,
        }),
        RoutingOutcome::Redirect { rule, response } => {
            let headers: serde_json::Map<String, Value> = response
                .headers
                .iter()
                .map(|(name, value)| {
                    (name.to_string(), Value::from(value.to_str().unwrap_or_default()))
                })
                .collect();
            json!({
                "outcome": "redirect",
                "rule": &**rule,
                "status": response.status.as_u16(),
                "headers": headers,
            })
        }
        RoutingOutcome::NoMatch => json!({ "outcome": "no_match" }),
    }
}
