//! HTTP entry point for `/{bucket}/{*key}` and every other non-health path.
//! Converts the axum request into an [`IncomingRequest`] and delegates the
//! decision to the pipeline.

use crate::{models::request::IncomingRequest, state::GatewayState};
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;

/// Response header carrying the serving instance's zone.
pub const ZONE_HEADER: HeaderName = HeaderName::from_static("x-zone");

/// Any method, any path: the pipeline decides.
pub async fn gateway_request(State(state): State<GatewayState>, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();
    // Absent when served without connect info; the forwarded-for header may still name the client.
    let peer_addr = ConnectInfo::<SocketAddr>::from_request_parts(&mut parts, &state)
        .await
        .ok()
        .map(|ConnectInfo(addr)| addr);

    let incoming = IncomingRequest {
        method: parts.method,
        path: decode_path(parts.uri.path()),
        headers: parts.headers,
        peer_addr,
    };

    let mut response = match state.pipeline.handle(&incoming).await {
        Ok(content) => {
            let mut response = (StatusCode::OK, content).into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            response
        }
        Err(rejection) => rejection.into_response(),
    };

    if let Ok(zone) = HeaderValue::from_str(&state.zone) {
        response.headers_mut().insert(ZONE_HEADER, zone);
    }
    response
}

/// Percent-decode the URI path; keep it raw when it is not valid UTF-8.
fn decode_path(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
