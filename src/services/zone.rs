//! Deployment zone of the serving instance, read from the metadata server.

use std::time::Duration;
use tracing::{info, warn};

pub const UNKNOWN_ZONE: &str = "Unknown";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Ask the metadata endpoint for the instance zone.
///
/// Never fails: any error, including an empty URL, yields [`UNKNOWN_ZONE`].
pub async fn resolve_zone(metadata_url: &str) -> String {
    if metadata_url.trim().is_empty() {
        return UNKNOWN_ZONE.to_string();
    }
    match lookup(metadata_url).await {
        Ok(zone) => {
            info!(zone = %zone, "resolved deployment zone");
            zone
        }
        Err(error) => {
            warn!(url = metadata_url, error = %error, "zone lookup failed");
            UNKNOWN_ZONE.to_string()
        }
    }
}

async fn lookup(metadata_url: &str) -> Result<String, String> {
    let client = reqwest::Client::builder()
        .timeout(LOOKUP_TIMEOUT)
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))?;

    let response = client
        .get(metadata_url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("metadata server answered {}", response.status()));
    }

    let body = response.text().await.map_err(|e| e.to_string())?;
    zone_from_metadata(&body).ok_or_else(|| format!("unrecognised zone value `{body}`"))
}

/// `projects/123/zones/us-central1-a` → `us-central1-a`.
pub fn zone_from_metadata(body: &str) -> Option<String> {
    body.trim()
        .rsplit('/')
        .next()
        .filter(|zone| !zone.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_path_segment() {
        assert_eq!(
            zone_from_metadata("projects/123/zones/us-central1-a\n").as_deref(),
            Some("us-central1-a")
        );
        assert_eq!(zone_from_metadata("europe-west1-b").as_deref(), Some("europe-west1-b"));
        assert_eq!(zone_from_metadata("projects/123/zones/"), None);
        assert_eq!(zone_from_metadata(""), None);
    }

    #[tokio::test]
    async fn disabled_lookup_is_unknown() {
        assert_eq!(resolve_zone("").await, UNKNOWN_ZONE);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unknown() {
        assert_eq!(resolve_zone("http://127.0.0.1:1/zone").await, UNKNOWN_ZONE);
    }
}
