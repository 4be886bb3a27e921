//! Defines the gateway's routes.
//!
//! ## Structure
//! - `GET /`                        liveness, static body
//! - `GET /readyz`                  readiness (audit DB + blob root)
//! - `ANY /{bucket}/{*key}`         object retrieval through the pipeline
//! - anything else                  also the pipeline, which answers 400/501
//!
//! The wildcard `*key` allows nested keys like `folder/2025/file.html`.
//! Non-GET methods on `/` and `/readyz` fall through to the pipeline too, so
//! they answer 501 rather than 405.

use crate::{
    handlers::{
        gateway_handlers::gateway_request,
        health_handlers::{health_check, readyz},
    },
    state::GatewayState,
};
use axum::{
    Router,
    routing::{any, get},
};

/// Build the router carrying `GatewayState` to all handlers.
pub fn routes() -> Router<GatewayState> {
    Router::new()
        .route("/", get(health_check).fallback(gateway_request))
        .route("/readyz", get(readyz).fallback(gateway_request))
        .route("/{bucket}/{*key}", any(gateway_request))
        .fallback(gateway_request)
}
