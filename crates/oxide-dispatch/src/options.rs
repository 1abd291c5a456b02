//! Router configuration.

use serde::{Deserialize, Serialize};

/// Options fixed when a [`Router`](crate::Router) is created.
///
/// They apply to every layer the router creates afterwards. Options can be
/// read from any serde source; missing fields fall back to `false`.
///
/// ```
/// use oxide_dispatch::RouterOptions;
///
/// let options: RouterOptions = serde_json::from_str(r#"{"strict": true}"#).unwrap();
/// assert!(options.strict);
/// assert!(!options.case_sensitive);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    /// Treat `/Foo` and `/foo` as different paths.
    pub case_sensitive: bool,
    /// Treat `/foo` and `/foo/` as different paths. Only route layers are
    /// affected; mounted middleware always tolerates a trailing slash.
    pub strict: bool,
    /// Overlay the parent router's params onto this router's params.
    pub merge_params: bool,
}

impl RouterOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets case sensitivity.
    #[must_use]
    pub fn case_sensitive(mut self, on: bool) -> Self {
        self.case_sensitive = on;
        self
    }

    /// Sets strict trailing-slash handling.
    #[must_use]
    pub fn strict(mut self, on: bool) -> Self {
        self.strict = on;
        self
    }

    /// Sets parent param merging.
    #[must_use]
    pub fn merge_params(mut self, on: bool) -> Self {
        self.merge_params = on;
        self
    }
}
