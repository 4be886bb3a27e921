//! Country denylist.

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Denied,
}

/// Fixed, ordered set of denied country names.
///
/// Matching is exact and case-sensitive. Built once at startup and never
/// mutated, so it can be shared freely across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denylist {
    countries: Vec<String>,
}

impl Denylist {
    pub fn new<I, S>(countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            countries: countries.into_iter().map(Into::into).collect(),
        }
    }

    /// Decide a request. A missing country is not grounds for denial.
    pub fn evaluate(&self, country: Option<&str>) -> PolicyDecision {
        match country {
            Some(c) if self.countries.iter().any(|denied| denied == c) => PolicyDecision::Denied,
            _ => PolicyDecision::Allowed,
        }
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }
}
