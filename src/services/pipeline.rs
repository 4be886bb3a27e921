//! src/services/pipeline.rs
//!
//! RequestPipeline decides one gateway request end to end:
//! method check, path validation, attribute extraction, country policy,
//! retrieval. Every outcome writes exactly one audit record, and denials also
//! publish one rejection notification. Audit and notification failures are
//! logged and never change the response.

use crate::{
    errors::RequestError,
    models::{
        audit::{FailureRecord, SuccessRecord},
        notification::RejectionNotification,
        request::{IncomingRequest, ParsedTarget, RequestAttributes},
    },
    services::{
        audit_store::AuditRecorder,
        blob_store::{BlobStore, RetrievalResult},
        notifier::RejectionPublisher,
        policy::{Denylist, PolicyDecision},
    },
};
use axum::http::Method;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

/// Composes the policy, the retrieval client and the two observability sinks.
///
/// Holds no mutable state; one instance serves all requests concurrently.
pub struct RequestPipeline {
    denylist: Denylist,
    blob_store: Arc<dyn BlobStore>,
    audit: Arc<dyn AuditRecorder>,
    publisher: Arc<dyn RejectionPublisher>,
    rejection_channel: String,
    publish_timeout: Duration,
}

impl RequestPipeline {
    pub fn new(
        denylist: Denylist,
        blob_store: Arc<dyn BlobStore>,
        audit: Arc<dyn AuditRecorder>,
        publisher: Arc<dyn RejectionPublisher>,
        rejection_channel: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            denylist,
            blob_store,
            audit,
            publisher,
            rejection_channel: rejection_channel.into(),
            publish_timeout,
        }
    }

    pub fn blob_store(&self) -> &dyn BlobStore {
        self.blob_store.as_ref()
    }

    pub fn audit(&self) -> &dyn AuditRecorder {
        self.audit.as_ref()
    }

    /// Handle one request. `Ok` carries the object content for a 200.
    pub async fn handle(&self, request: &IncomingRequest) -> Result<String, RequestError> {
        if request.method != Method::GET {
            error!(
                method = %request.method,
                "501 Not Implemented: The server does not support the functionality required to fulfill the request."
            );
            return Err(self.fail(RequestError::NotImplemented, None).await);
        }

        let Some(target) = ParsedTarget::parse(&request.path) else {
            error!(path = %request.path, "400 Bad Request: Invalid path format.");
            return Err(self.fail(RequestError::InvalidPath, None).await);
        };

        let attrs = RequestAttributes::extract(request);
        info!(
            bucket = %target.bucket,
            file = %target.object_path,
            country = attrs.country.as_deref().unwrap_or("<none>"),
            "Received request for file"
        );

        if self.denylist.evaluate(attrs.country.as_deref()) == PolicyDecision::Denied {
            let country = attrs.country.clone().unwrap_or_default();
            warn!(
                country = %country,
                file = %target.object_path,
                "Forbidden request. Sending rejection notification."
            );
            self.notify_rejection(RejectionNotification::new(
                country,
                target.object_path.clone(),
            ))
            .await;
            return Err(self
                .fail(RequestError::Forbidden, Some(target.object_path))
                .await);
        }

        match self
            .blob_store
            .fetch(&target.bucket, &target.object_path)
            .await
        {
            RetrievalResult::Content(content) => {
                self.record_success(attrs, target.object_path).await;
                info!("200 OK: File retrieved successfully.");
                Ok(content)
            }
            RetrievalResult::NotFound => {
                debug!(
                    bucket = %target.bucket,
                    file = %target.object_path,
                    "404 Not Found: object does not exist"
                );
                Err(self
                    .fail(RequestError::NotFound, Some(target.object_path))
                    .await)
            }
            RetrievalResult::TransientError(reason) => {
                // Answered like a missing object; only the log tells them apart.
                warn!(
                    bucket = %target.bucket,
                    file = %target.object_path,
                    reason = %reason,
                    "404 Not Found: blob store unavailable"
                );
                Err(self
                    .fail(RequestError::NotFound, Some(target.object_path))
                    .await)
            }
        }
    }

    /// Write the failure record and hand the outcome back.
    async fn fail(&self, outcome: RequestError, requested_file: Option<String>) -> RequestError {
        let record = FailureRecord {
            time_of_request: Utc::now(),
            requested_file,
            error_code: outcome.code(),
        };
        if let Err(error) = self.audit.record_failure(&record).await {
            error!(
                error = %error,
                code = record.error_code,
                "failed to record failed request"
            );
        }
        outcome
    }

    async fn record_success(&self, attrs: RequestAttributes, requested_file: String) {
        let record = SuccessRecord {
            country: attrs.country,
            client_ip: attrs.client_ip,
            gender: attrs.gender,
            age: attrs.age,
            income: attrs.income,
            is_banned: false,
            time_of_day: Utc::now().time(),
            requested_file,
        };
        if let Err(error) = self.audit.record_success(&record).await {
            error!(
                error = %error,
                file = %record.requested_file,
                "failed to record request details"
            );
        }
    }

    /// Publish on a separate task and wait for it at most `publish_timeout`.
    ///
    /// Past the deadline the task keeps running detached and logs its own
    /// outcome.
    async fn notify_rejection(&self, notification: RejectionNotification) {
        let publisher = Arc::clone(&self.publisher);
        let channel = self.rejection_channel.clone();
        let payload = notification.to_string();

        debug!(channel = %channel, "Publishing rejection notification");
        let task = tokio::spawn(async move {
            match publisher.publish(&channel, &payload).await {
                Ok(message_id) => {
                    info!(channel = %channel, message_id = %message_id, "Published message");
                }
                Err(error) => {
                    error!(
                        channel = %channel,
                        error = %error,
                        "Failed to publish rejection notification"
                    );
                }
            }
        });

        match tokio::time::timeout(self.publish_timeout, task).await {
            Ok(Ok(())) => {}
            Ok(Err(join_error)) => {
                error!(error = %join_error, "rejection publish task aborted");
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.publish_timeout.as_millis() as u64,
                    "rejection publish still pending; continuing without confirmation"
                );
            }
        }
    }
}
