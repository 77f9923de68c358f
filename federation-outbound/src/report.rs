//! Per-destination delivery results.

use federation_types::ProtocolName;

/// What happened to one destination or skipped recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        url: String,
        protocol: ProtocolName,
    },
    Failed {
        url: String,
        protocol: ProtocolName,
        error: String,
    },
    /// No payload was built for this recipient.
    Skipped { recipient: String, reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// The result of one `send` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    /// URLs that accepted the payload.
    pub fn delivered(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                DeliveryOutcome::Delivered { url, .. } => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    /// URLs whose delivery failed.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                DeliveryOutcome::Failed { url, .. } => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Recipients dropped before delivery.
    pub fn skipped(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                DeliveryOutcome::Skipped { recipient, .. } => Some(recipient.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether every outcome is a delivery.
    pub fn is_complete_success(&self) -> bool {
        self.outcomes.iter().all(DeliveryOutcome::is_delivered)
    }
}
