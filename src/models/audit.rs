//! Audit records written once per completed gateway request.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A request that was allowed and served.
///
/// Maps to the `request_details` table.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct SuccessRecord {
    /// Value of `X-country`, if any.
    pub country: Option<String>,

    /// Left-most `X-Forwarded-For` entry or the direct peer.
    pub client_ip: Option<String>,

    pub gender: Option<String>,

    /// `X-age` as sent, `"0"` when absent.
    pub age: String,

    /// `X-income` as sent, `"0.0"` when absent.
    pub income: String,

    /// Always false for served requests; kept for the table layout.
    pub is_banned: bool,

    pub time_of_day: NaiveTime,

    /// Object path inside the bucket.
    pub requested_file: String,
}

/// A request that ended in 400, 403, 404 or 501.
///
/// Maps to the `failed_requests` table.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct FailureRecord {
    pub time_of_request: DateTime<Utc>,

    /// Object path, unknown for malformed requests.
    pub requested_file: Option<String>,

    pub error_code: u16,
}

/// Either audit shape, as produced by the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum AuditRecord {
    Success(SuccessRecord),
    Failure(FailureRecord),
}
