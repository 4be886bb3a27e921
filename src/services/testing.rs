//! In-memory collaborators for pipeline and router tests.

use crate::{
    errors::{AuditError, PublishError},
    models::audit::{AuditRecord, FailureRecord, SuccessRecord},
    services::{
        audit_store::AuditRecorder,
        blob_store::{BlobStore, RetrievalResult},
        notifier::RejectionPublisher,
    },
};
use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: HashMap<(String, String), String>,
    transient: HashSet<(String, String)>,
    fetches: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn with_object(mut self, bucket: &str, key: &str, content: &str) -> Self {
        self.objects
            .insert((bucket.into(), key.into()), content.into());
        self
    }

    /// Make `bucket/key` fail as if the backend were unreachable.
    pub fn with_transient(mut self, bucket: &str, key: &str) -> Self {
        self.transient.insert((bucket.into(), key.into()));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, bucket: &str, key: &str) -> RetrievalResult {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let id = (bucket.to_string(), key.to_string());
        if self.transient.contains(&id) {
            return RetrievalResult::TransientError("connection reset".into());
        }
        match self.objects.get(&id) {
            Some(content) => RetrievalResult::Content(content.clone()),
            None => RetrievalResult::NotFound,
        }
    }

    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    records: Mutex<Vec<AuditRecord>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingAudit {
    /// Every write and ping fails; attempts are still counted.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn failure_codes(&self) -> Vec<(u16, Option<String>)> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                AuditRecord::Failure(f) => Some((f.error_code, f.requested_file)),
                AuditRecord::Success(_) => None,
            })
            .collect()
    }

    fn push(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuditError::Unavailable("database is down".into()));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

#[async_trait]
impl AuditRecorder for RecordingAudit {
    async fn record_success(&self, record: &SuccessRecord) -> Result<(), AuditError> {
        self.push(AuditRecord::Success(record.clone()))
    }

    async fn record_failure(&self, record: &FailureRecord) -> Result<(), AuditError> {
        self.push(AuditRecord::Failure(record.clone()))
    }

    async fn ping(&self) -> Result<(), AuditError> {
        if self.fail {
            Err(AuditError::Unavailable("database is down".into()))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PublishBehavior {
    #[default]
    Accept,
    Fail,
    /// Never completes.
    Hang,
}

#[derive(Default)]
pub struct RecordingPublisher {
    behavior: PublishBehavior,
    messages: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
}

impl RecordingPublisher {
    pub fn with_behavior(behavior: PublishBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Accepted `(channel, payload)` pairs.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RejectionPublisher for RecordingPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<String, PublishError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            PublishBehavior::Accept => {
                self.messages
                    .lock()
                    .unwrap()
                    .push((channel.to_string(), payload.to_string()));
                Ok(format!("1700000000000-{n}"))
            }
            PublishBehavior::Fail => Err(PublishError::Unavailable("broker refused".into())),
            PublishBehavior::Hang => std::future::pending().await,
        }
    }
}
