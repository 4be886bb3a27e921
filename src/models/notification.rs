//! Text message sent to the rejection consumer.

use std::fmt;

const PREFIX: &str = "Forbidden request attempted from ";
const SEPARATOR: &str = " for file ";

/// A denied request, as published on the rejection channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionNotification {
    pub country: String,
    pub requested_file: String,
}

impl RejectionNotification {
    pub fn new(country: impl Into<String>, requested_file: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            requested_file: requested_file.into(),
        }
    }

    /// Recover the fields from the wire text.
    ///
    /// Splits on the first separator, so a country containing " for file "
    /// would be misread. Denylist entries never do.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(PREFIX)?;
        let (country, file) = rest.split_once(SEPARATOR)?;
        Some(Self::new(country, file))
    }
}

impl fmt::Display for RejectionNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}", PREFIX, self.country, SEPARATOR, self.requested_file)
    }
}
