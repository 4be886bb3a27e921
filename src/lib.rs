//! Geo-fenced file retrieval gateway.
//!
//! The gateway binary serves `GET /{bucket}/{*key}` through
//! [`services::pipeline::RequestPipeline`]; the `rejection-consumer` binary
//! drains the notifications the pipeline publishes for denied requests.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
