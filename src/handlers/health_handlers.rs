//! Health & readiness handlers.
//!
//! - GET /        -> static liveness body
//! - GET /readyz  -> readiness that checks the audit database and the blob root

use crate::state::GatewayState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /`
///
/// Liveness probe. Never touches policy, audit or storage.
pub async fn health_check() -> &'static str {
    "Hello World!"
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Pings the audit database (`SELECT 1`).
/// 2. Checks that the blob store root is reachable.
///
/// HTTP 200 when all checks pass, HTTP 503 when any check fails.
pub async fn readyz(State(state): State<GatewayState>) -> impl IntoResponse {
    let audit_check = match state.pipeline.audit().ping().await {
        Ok(()) => CheckStatus::ok(),
        Err(e) => CheckStatus::failed(e.to_string()),
    };
    let blob_check = match state.pipeline.blob_store().ping().await {
        Ok(()) => CheckStatus::ok(),
        Err(e) => CheckStatus::failed(e),
    };

    let overall_ok = audit_check.ok && blob_check.ok;

    let mut checks = HashMap::new();
    checks.insert("audit_db", audit_check);
    checks.insert("blob_root", blob_check);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" },
        zone: state.zone.to_string(),
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    zone: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
