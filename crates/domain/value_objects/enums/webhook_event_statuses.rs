use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WebhookEventStatus {
    /// A handler ran for the event.
    Processed,
    /// Event type this system does not act on; recorded for forward compatibility.
    Ignored,
}

impl Display for WebhookEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            WebhookEventStatus::Processed => "processed",
            WebhookEventStatus::Ignored => "ignored",
        };
        write!(f, "{}", status)
    }
}
