//! Endpoint filter
//!
//! Decides which events a subscriber acts on. Matching is a literal string
//! prefix test, not a path-segment match: `/gi` accepts `/github`.

/// Prefix filter over event endpoints.
#[derive(Debug, Clone, Default)]
pub struct EndpointFilter {
    prefixes: Vec<String>,
}

impl EndpointFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether an event arriving on `endpoint` should be handled.
    ///
    /// An empty filter accepts everything.
    pub fn accepts(&self, endpoint: &str) -> bool {
        self.prefixes.is_empty()
            || self
                .prefixes
                .iter()
                .any(|prefix| endpoint.starts_with(prefix.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}
