//! Upstream forwarding for `Forward` decisions.
//!
//! # Responsibilities
//! - Build the upstream request (target origin + forwarded path)
//! - Honor `change_origin` by rewriting the Host header
//! - Honor `follow_redirects` by chasing upstream 3xx responses
//! - Relay the upstream response without hop-by-hop headers
//!
//! # Design Decisions
//! - Bodies stream through untouched unless redirects may need a replay,
//!   in which case they are buffered up to a configured limit
//! - Only plain-HTTP redirect targets are followed; anything else is relayed
//! - Credentials never follow a redirect to another origin

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use http_body_util::LengthLimitError;
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::response::strip_hop_by_hop;
use crate::routing::{Forward, Origin};

/// Plain-HTTP client shared by every request.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// Request headers that only the origin they were meant for may see.
static CREDENTIALS: [header::HeaderName; 3] = [
    header::AUTHORIZATION,
    header::COOKIE,
    header::PROXY_AUTHORIZATION,
];

/// Failures forwarding a request. `BodyTooLarge` is the client's fault (413);
/// everything else surfaces as 502.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("request body exceeds the {limit} byte replay buffer")]
    BodyTooLarge { limit: usize },

    #[error("failed to buffer request body: {0}")]
    Body(axum::Error),

    #[error("invalid upstream request: {0}")]
    Request(#[from] axum::http::Error),
}

/// Sends forwarded requests upstream.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    max_redirects: u32,
    max_buffered_body_bytes: usize,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));

        Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            max_redirects: config.max_redirects,
            max_buffered_body_bytes: config.max_buffered_body_bytes,
        }
    }

    /// Forward `request` according to `decision`.
    pub async fn forward(&self, decision: &Forward, request: Request<Body>) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        if decision.change_origin {
            set_host(&mut headers, &decision.target);
        }

        let uri = upstream_uri(&decision.target, &decision.path)?;

        if !decision.follow_redirects {
            let request = build_request(parts.method, uri, headers, body)?;
            let response = self.client.request(request).await?;
            return Ok(relay(response));
        }

        let limit = self.max_buffered_body_bytes;
        if declared_length(&headers).is_some_and(|length| length > limit) {
            return Err(ForwardError::BodyTooLarge { limit });
        }
        let buffered = axum::body::to_bytes(body, limit).await.map_err(|e| {
            if is_length_limit(&e) {
                ForwardError::BodyTooLarge { limit }
            } else {
                ForwardError::Body(e)
            }
        })?;

        let mut method = parts.method;
        let mut uri = uri;
        let mut origin = decision.target.clone();
        let mut payload = Some(buffered);
        let mut hops = 0;

        loop {
            let body = payload.clone().map(Body::from).unwrap_or_else(Body::empty);
            let request = build_request(method.clone(), uri.clone(), headers.clone(), body)?;
            let response = self.client.request(request).await?;

            let status = response.status();
            if hops >= self.max_redirects || !is_followable(status) {
                return Ok(relay(response));
            }
            let Some(next) = redirect_target(&uri, response.headers()) else {
                return Ok(relay(response));
            };

            tracing::debug!(
                rule = %decision.rule,
                status = %status,
                from = %uri,
                to = %next.uri,
                "Following upstream redirect"
            );

            if switches_to_get(status, &method) {
                if method != Method::HEAD {
                    method = Method::GET;
                }
                payload = None;
                headers.remove(header::CONTENT_LENGTH);
                headers.remove(header::CONTENT_TYPE);
            }
            if next.origin != origin {
                for name in &CREDENTIALS {
                    headers.remove(name);
                }
            }
            set_host(&mut headers, &next.origin);
            origin = next.origin;
            uri = next.uri;
            hops += 1;
        }
    }
}

fn set_host(headers: &mut HeaderMap, origin: &Origin) {
    match HeaderValue::from_str(origin.authority.as_str()) {
        Ok(host) => {
            headers.insert(header::HOST, host);
        }
        Err(e) => {
            tracing::warn!(authority = %origin.authority, error = %e, "Invalid Host value, header left unchanged");
        }
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(header::CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

fn is_length_limit(error: &axum::Error) -> bool {
    std::error::Error::source(error).is_some_and(|source| source.is::<LengthLimitError>())
}

/// Absolute URI for the upstream request.
pub fn upstream_uri(target: &Origin, path: &str) -> Result<Uri, axum::http::Error> {
    Uri::builder()
        .scheme(target.scheme.clone())
        .authority(target.authority.clone())
        .path_and_query(path)
        .build()
}

fn build_request(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Request<Body>, axum::http::Error> {
    let mut request = Request::builder().method(method).uri(uri).body(body)?;
    *request.headers_mut() = headers;
    Ok(request)
}

fn relay(response: Response<hyper::body::Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

fn is_followable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// 303 always drops the body; 301/302 do so for anything but GET/HEAD.
fn switches_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => true,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => {
            *method != Method::GET && *method != Method::HEAD
        }
        _ => false,
    }
}

#[derive(Debug)]
struct RedirectTarget {
    origin: Origin,
    uri: Uri,
}

/// Resolve `Location` against the current URI. `None` when it is missing,
/// malformed, or not plain HTTP.
fn redirect_target(current: &Uri, headers: &HeaderMap) -> Option<RedirectTarget> {
    let location = headers.get(header::LOCATION)?.to_str().ok()?;
    let base = Url::parse(&current.to_string()).ok()?;
    let mut next = base.join(location).ok()?;
    if next.scheme() != "http" {
        return None;
    }
    next.set_fragment(None);

    let origin = next.origin().ascii_serialization().parse::<Origin>().ok()?;
    let uri = next.as_str().parse::<Uri>().ok()?;
    Some(RedirectTarget { origin, uri })
}
