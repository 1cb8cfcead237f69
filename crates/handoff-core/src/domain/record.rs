//! Permanent account record written once an artifact reaches durable storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::Descriptor;
use super::ids::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_id: AccountId,
    pub descriptor: Descriptor,
    pub durable_url: String,

    /// When the artifact was originally generated (staging time).
    pub created_at: DateTime<Utc>,
}
