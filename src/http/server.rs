//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Consult the rule table for every request
//! - Forward, answer a bypass, or fall through to local handling
//! - Swap the rule table when a reloaded config arrives

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigError, ConfigUpdates, ProxyConfig};
use crate::http::forward::{ForwardError, Forwarder};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response::{bad_gateway, payload_too_large, terminal_response};
use crate::observability::metrics;
use crate::routing::{Router as RuleTable, RoutingOutcome, SharedRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<SharedRouter>,
    pub forwarder: Forwarder,
    pub fallback: Option<ServeDir>,
}

/// HTTP server for the development proxy.
pub struct HttpServer {
    router: Router,
    rules: Arc<SharedRouter>,
    profile: Option<String>,
}

impl HttpServer {
    /// Compile the rule table for `profile` and build the server.
    pub fn new(config: ProxyConfig, profile: Option<String>) -> Result<Self, ConfigError> {
        let table = RuleTable::from_config(config.rules_for(profile.as_deref()))
            .map_err(ConfigError::Validation)?;

        tracing::info!(
            profile = profile.as_deref().unwrap_or("default"),
            rules = table.rules().len(),
            "Rule table compiled"
        );

        let rules = Arc::new(SharedRouter::new(table));
        let state = AppState {
            rules: rules.clone(),
            forwarder: Forwarder::new(&config.upstream),
            fallback: config.fallback.static_dir.as_ref().map(|dir| ServeDir::new(PathBuf::from(dir))),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            rules,
            profile,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request.request_id(),
                )
            }))
            .layer(propagate_request_id_layer())
            // Only the upstream can be slow here, so expiry is a gateway timeout.
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                Duration::from_secs(config.upstream.request_timeout_secs),
            ));

        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(middleware)
    }

    /// The live rule table.
    pub fn rules(&self) -> Arc<SharedRouter> {
        self.rules.clone()
    }

    /// Serve until `shutdown` fires, applying config reloads as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: ConfigUpdates,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let rules = self.rules.clone();
        let profile = self.profile.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_reload(&rules, &config, profile.as_deref());
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Recompile and swap the rule table. Listener and upstream settings need a
/// restart; only rules are hot-reloaded.
fn apply_reload(rules: &SharedRouter, config: &ProxyConfig, profile: Option<&str>) {
    match RuleTable::from_config(config.rules_for(profile)) {
        Ok(table) => {
            let count = table.rules().len();
            rules.replace(table);
            tracing::info!(rules = count, "Rule table reloaded");
        }
        Err(errors) => {
            let err = ConfigError::Validation(errors);
            tracing::error!(error = %err, "Rejected reloaded rules, keeping current table");
        }
    }
}

/// Resolve the request against the rule table and act on the outcome.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().to_string();

    let outcome = match state.rules.load().resolve_uri(request.uri()) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected request path");
            metrics::record_outcome("invalid", "none");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match outcome {
        RoutingOutcome::Forward(decision) => {
            metrics::record_outcome("forward", &decision.rule);
            tracing::debug!(
                request_id = %request_id,
                rule = %decision.rule,
                target = %decision.target,
                path = %decision.path,
                change_origin = decision.change_origin,
                follow_redirects = decision.follow_redirects,
                "Forwarding request"
            );

            match state.forwarder.forward(&decision, request).await {
                Ok(response) => {
                    metrics::record_upstream(&decision.rule, response.status().as_u16(), start);
                    response
                }
                Err(e @ ForwardError::BodyTooLarge { .. }) => {
                    tracing::warn!(
                        request_id = %request_id,
                        rule = %decision.rule,
                        error = %e,
                        "Rejected request body"
                    );
                    metrics::record_outcome("body_too_large", &decision.rule);
                    payload_too_large()
                }
                Err(e) => {
                    tracing::error!(
                        request_id = %request_id,
                        rule = %decision.rule,
                        target = %decision.target,
                        error = %e,
                        "Upstream error"
                    );
                    metrics::record_upstream(&decision.rule, StatusCode::BAD_GATEWAY.as_u16(), start);
                    bad_gateway()
                }
            }
        }
        RoutingOutcome::Redirect { rule, response } => {
            metrics::record_outcome("redirect", &rule);
            tracing::debug!(
                request_id = %request_id,
                rule = %rule,
                status = %response.status,
                location = response.location().unwrap_or_default(),
                "Answered by bypass"
            );
            terminal_response(response)
        }
        RoutingOutcome::NoMatch => {
            metrics::record_outcome("no_match", "none");
            serve_fallback(state.fallback, request).await
        }
    }
}

/// Local handling for requests that are not a proxy concern.
async fn serve_fallback(fallback: Option<ServeDir>, request: Request<Body>) -> Response {
    let Some(dir) = fallback else {
        return (StatusCode::NOT_FOUND, "No proxy rule matched").into_response();
    };

    match dir.oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}
