//! Inbound request shape and the attributes the policy and audit trail need.

use axum::http::{HeaderMap, Method};
use std::net::SocketAddr;

pub const COUNTRY_HEADER: &str = "x-country";
pub const GENDER_HEADER: &str = "x-gender";
pub const AGE_HEADER: &str = "x-age";
pub const INCOME_HEADER: &str = "x-income";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// One inbound HTTP request, as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    /// Raw URI path, including the leading `/`.
    pub path: String,
    pub headers: HeaderMap,
    /// Direct peer, when the transport knows it.
    pub peer_addr: Option<SocketAddr>,
}

/// Bucket and object path addressed by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    pub bucket: String,
    /// Everything after the bucket segment; never empty.
    pub object_path: String,
}

impl ParsedTarget {
    /// Split `/{bucket}/{object...}` into its parts.
    ///
    /// Returns `None` unless both the bucket and the object path are non-empty.
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_start_matches('/');
        let (bucket, object_path) = trimmed.split_once('/')?;
        if bucket.is_empty() || object_path.is_empty() {
            return None;
        }
        Some(Self {
            bucket: bucket.to_string(),
            object_path: object_path.to_string(),
        })
    }
}

/// Client attributes extracted from headers and the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAttributes {
    pub country: Option<String>,
    pub client_ip: Option<String>,
    pub gender: Option<String>,
    pub age: String,
    pub income: String,
}

impl RequestAttributes {
    pub fn extract(request: &IncomingRequest) -> Self {
        let headers = &request.headers;
        Self {
            country: header_str(headers, COUNTRY_HEADER).map(str::to_string),
            client_ip: client_ip(headers, request.peer_addr),
            gender: header_str(headers, GENDER_HEADER).map(str::to_string),
            age: header_str(headers, AGE_HEADER).unwrap_or("0").to_string(),
            income: header_str(headers, INCOME_HEADER)
                .unwrap_or("0.0")
                .to_string(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Left-most `X-Forwarded-For` entry is the original client; fall back to the peer.
fn client_ip(headers: &HeaderMap, peer_addr: Option<SocketAddr>) -> Option<String> {
    let forwarded = header_str(headers, FORWARDED_FOR_HEADER)
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer_addr.map(|addr| addr.ip().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn request(headers: &[(&'static str, &'static str)], peer: Option<&str>) -> IncomingRequest {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).unwrap();
            map.append(name, HeaderValue::from_static(value));
        }
        IncomingRequest {
            method: Method::GET,
            path: "/b/k".into(),
            headers: map,
            peer_addr: peer.map(|p| p.parse().unwrap()),
        }
    }

    #[test]
    fn nested_object_paths_are_kept_whole() {
        let target = ParsedTarget::parse("/mybucket/folder/file.html").unwrap();
        assert_eq!(target.bucket, "mybucket");
        assert_eq!(target.object_path, "folder/file.html");
    }

    #[test]
    fn single_segment_paths_are_invalid() {
        for path in ["/", "", "/onlybucket", "/onlybucket/", "//file.txt"] {
            assert_eq!(ParsedTarget::parse(path), None, "path {path:?}");
        }
    }

    #[test]
    fn defaults_apply_when_headers_are_absent() {
        let attrs = RequestAttributes::extract(&request(&[], None));
        assert_eq!(attrs.country, None);
        assert_eq!(attrs.client_ip, None);
        assert_eq!(attrs.gender, None);
        assert_eq!(attrs.age, "0");
        assert_eq!(attrs.income, "0.0");
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let attrs = RequestAttributes::extract(&request(
            &[("X-Country", "France"), ("X-GENDER", "f"), ("x-age", "31")],
            None,
        ));
        assert_eq!(attrs.country.as_deref(), Some("France"));
        assert_eq!(attrs.gender.as_deref(), Some("f"));
        assert_eq!(attrs.age, "31");
    }

    #[test]
    fn forwarded_for_wins_over_peer() {
        let attrs = RequestAttributes::extract(&request(
            &[("x-forwarded-for", "203.0.113.7, 10.0.0.2")],
            Some("10.0.0.9:5000"),
        ));
        assert_eq!(attrs.client_ip.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn peer_address_is_the_fallback() {
        let attrs = RequestAttributes::extract(&request(&[], Some("192.0.2.1:4444")));
        assert_eq!(attrs.client_ip.as_deref(), Some("192.0.2.1"));
    }
}
