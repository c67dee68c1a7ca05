use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload handed to a notifier when a record's trigger policy fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliveTransition {
    /// When the verdict was committed
    pub at: DateTime<Utc>,
    /// Zone name
    pub zone: String,
    /// Dynamic group name
    pub group: String,
    /// Record owner name
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content
    pub content: String,
    /// Published alive value before the cycle
    pub previous: bool,
    /// Published alive value after the cycle
    pub current: bool,
}
