//! Response construction and header hygiene.
//!
//! # Responsibilities
//! - Turn a routing-layer terminal response into an HTTP response
//! - Strip hop-by-hop headers in both directions
//! - Map transport failures to client-facing status codes
//!
//! # Design Decisions
//! - Unreachable or broken upstreams are 502, slow ones 504
//! - A body too large to buffer for redirect replay is 413, upstream untouched

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};

use crate::routing::TerminalResponse;

/// Headers meaningful only for a single transport-level connection.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Write a bypass decision as the client-facing response.
pub fn terminal_response(terminal: TerminalResponse) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = terminal.status;
    *response.headers_mut() = terminal.headers;
    response
}

/// Upstream could not be reached or answered garbage.
pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
}

pub fn payload_too_large() -> Response {
    (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
}
