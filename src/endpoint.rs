//! Canonical API path building
//!
//! Every call site goes through [`ApiPath`]; no endpoint string surgery
//! happens anywhere else. A path that already carries the API prefix is
//! collapsed rather than doubled, so a caller holding a server-relative
//! path and a caller holding a client-relative one both end up at the same
//! URL.

/// Builder for absolute endpoint URLs from a base URL and an API prefix.
#[derive(Debug, Clone)]
pub struct ApiPath {
    base: String,
    prefix: String,
}

impl ApiPath {
    pub fn new(base_url: &str, prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let prefix = if prefix.is_empty() || prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{prefix}")
        };
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            prefix,
        }
    }

    /// The base URL with the prefix applied and no trailing slash.
    pub fn root(&self) -> String {
        format!("{}{}", self.base, self.prefix)
    }

    /// Absolute URL for a relative endpoint path (query string allowed).
    pub fn url(&self, path: &str) -> String {
        let mut path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        if !self.prefix.is_empty() {
            if let Some(rest) = path.strip_prefix(&self.prefix) {
                if rest.is_empty() {
                    path = "/".to_string();
                } else if rest.starts_with('/') {
                    path = rest.to_string();
                }
            }
        }

        format!("{}{}{}", self.base, self.prefix, path)
    }
}
