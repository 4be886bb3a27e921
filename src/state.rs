//! Shared application state handed to every handler.

use crate::services::pipeline::RequestPipeline;
use std::sync::Arc;

/// Cheap to clone; everything inside is immutable after startup.
#[derive(Clone)]
pub struct GatewayState {
    pub pipeline: Arc<RequestPipeline>,
    /// Deployment zone reported in the `X-Zone` response header.
    pub zone: Arc<str>,
}

impl GatewayState {
    pub fn new(pipeline: RequestPipeline, zone: impl Into<Arc<str>>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            zone: zone.into(),
        }
    }
}
