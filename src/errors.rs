use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

/// The client-visible outcomes of a rejected gateway request.
///
/// Each variant maps to one fixed status code and one fixed plain-text body.
/// Internal error detail never reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Method other than GET on a gateway route.
    NotImplemented,
    /// Path with fewer than a bucket and an object segment.
    InvalidPath,
    /// Country is on the denylist.
    Forbidden,
    /// Object missing or backend unavailable.
    NotFound,
}

impl RequestError {
    pub fn status(self) -> StatusCode {
        match self {
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::InvalidPath => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    pub fn body(self) -> &'static str {
        match self {
            Self::NotImplemented => "Not Implemented",
            Self::InvalidPath => "Invalid path format",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
        }
    }

    /// Numeric code stored in the failure audit table.
    pub fn code(self) -> u16 {
        self.status().as_u16()
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.body())
    }
}

impl std::error::Error for RequestError {}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.body()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// Failure writing to the audit store.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Failure publishing a rejection notification.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("channel name must not be empty")]
    EmptyChannel,
    #[error("publisher unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

/// Failure inside the rejection consumer loop.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("entry `{id}` has no readable `payload` field")]
    MalformedEntry { id: String },
    #[error("receive failed: {0}")]
    Receive(String),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_outcome_has_fixed_status_and_body() {
        let cases = [
            (RequestError::NotImplemented, 501, "Not Implemented"),
            (RequestError::InvalidPath, 400, "Invalid path format"),
            (RequestError::Forbidden, 403, "Forbidden"),
            (RequestError::NotFound, 404, "Not Found"),
        ];
        for (err, code, body) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.body(), body);
        }
    }

    #[test]
    fn response_is_plain_text() {
        let resp = RequestError::Forbidden.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
