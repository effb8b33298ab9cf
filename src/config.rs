//! Configuration options for the Sproutly client

use chrono::FixedOffset;
use std::time::Duration;

/// Default mobile API prefix all relative paths hang off.
pub const DEFAULT_API_PREFIX: &str = "/api/v1/mobile";

/// Default school timezone (IST). "What day is it" decisions use this, not
/// the device locale.
const DEFAULT_TZ_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Configuration options for the Sproutly client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The API prefix joined between the base URL and every relative path
    pub api_prefix: String,

    /// The timezone used for calendar-date comparisons
    pub timezone: FixedOffset,

    /// Debounce window for concurrent session-expiry handling
    pub expiry_debounce: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timezone: FixedOffset::east_opt(DEFAULT_TZ_OFFSET_SECS).unwrap(),
            expiry_debounce: Duration::from_secs(3),
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the API prefix
    pub fn with_api_prefix(mut self, value: &str) -> Self {
        self.api_prefix = value.to_string();
        self
    }

    /// Set the timezone for calendar-date comparisons
    pub fn with_timezone(mut self, value: FixedOffset) -> Self {
        self.timezone = value;
        self
    }

    /// Set the session-expiry debounce window
    pub fn with_expiry_debounce(mut self, value: Duration) -> Self {
        self.expiry_debounce = value;
        self
    }
}
