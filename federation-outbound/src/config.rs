//! Outbound configuration.

use serde::{Deserialize, Serialize};

use federation_protocols::CONTENT_TYPE_ACTIVITY;

/// Fan-out behaviour of the [`OutboundDispatcher`](crate::OutboundDispatcher).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on deliveries in flight at once.
    pub max_concurrent_deliveries: usize,
    /// Treat every ActivityPub recipient as private, so each gets its own
    /// payload addressed with `"to"`.
    pub activitypub_per_recipient: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_deliveries: 8,
            activitypub_per_recipient: false,
        }
    }
}

/// Settings for the reqwest-backed [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Whole-request timeout, in seconds.
    pub timeout_secs: u64,
    /// `Accept` header used when fetching activity documents.
    pub activity_accept: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("federation/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
            activity_accept: CONTENT_TYPE_ACTIVITY.to_string(),
        }
    }
}
