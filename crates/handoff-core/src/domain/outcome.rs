//! Reconciliation outcome: the per-invocation report handed back to the caller.
//!
//! Never persisted. The caller uses it to drive UI and retry decisions, and
//! must be able to tell a quota denial (actionable) from I/O failures.

use serde::Serialize;

use super::errors::TransferError;
use super::ids::ArtifactId;

/// Result for a single staged artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemResult {
    Transferred {
        durable_url: String,
        record_id: String,
    },
    Failed {
        error: TransferError,
    },
    /// Found expired while enumerating; evicted, never attempted.
    SkippedExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub artifact_id: ArtifactId,
    #[serde(flatten)]
    pub result: ItemResult,
}

/// Why the quota gate refused the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum GateDenial {
    /// Not a fault: the account needs more units (upgrade or wait).
    InsufficientQuota { needed: usize, available: u32 },

    /// The account record could not be read; the gate failed closed.
    QuotaUnavailable { needed: usize, error: String },
}

/// Aggregate result of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationOutcome {
    pub transferred_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,

    /// Human readable reasons, in processing order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemOutcome>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<GateDenial>,
}

impl ReconciliationOutcome {
    /// Nothing was staged: success with no side effects.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn denied(denial: GateDenial) -> Self {
        let mut outcome = Self::default();
        outcome.deny(denial);
        outcome
    }

    /// Mark the whole batch as refused by the quota gate.
    pub fn deny(&mut self, denial: GateDenial) {
        if let GateDenial::QuotaUnavailable { error, .. } = &denial {
            self.errors.push(error.clone());
        }
        self.denial = Some(denial);
    }

    pub fn record_transferred(
        &mut self,
        artifact_id: ArtifactId,
        durable_url: String,
        record_id: String,
    ) {
        self.transferred_count += 1;
        self.items.push(ItemOutcome {
            artifact_id,
            result: ItemResult::Transferred {
                durable_url,
                record_id,
            },
        });
    }

    pub fn record_failed(&mut self, artifact_id: ArtifactId, error: TransferError) {
        self.failed_count += 1;
        self.errors.push(format!("{artifact_id}: {error}"));
        self.items.push(ItemOutcome {
            artifact_id,
            result: ItemResult::Failed { error },
        });
    }

    pub fn record_skipped(&mut self, artifact_id: ArtifactId) {
        self.skipped_count += 1;
        self.items.push(ItemOutcome {
            artifact_id,
            result: ItemResult::SkippedExpired,
        });
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// `transferred > 0 || failed == 0`, and the gate did not deny.
    pub fn is_success(&self) -> bool {
        self.denial.is_none() && (self.transferred_count > 0 || self.failed_count == 0)
    }

    pub fn is_insufficient_quota(&self) -> bool {
        matches!(self.denial, Some(GateDenial::InsufficientQuota { .. }))
    }

    /// Nothing was attempted and nothing was denied.
    pub fn is_empty(&self) -> bool {
        self.denial.is_none() && self.transferred_count == 0 && self.failed_count == 0
    }

    /// One-line message suitable for showing to the user.
    pub fn summary(&self) -> String {
        match &self.denial {
            Some(GateDenial::InsufficientQuota { needed, available }) => {
                format!("insufficient quota: need {needed}, have {available}")
            }
            Some(GateDenial::QuotaUnavailable { error, .. }) => {
                format!("quota could not be checked: {error}")
            }
            None if self.is_empty() => "nothing to transfer".to_string(),
            None => format!(
                "transferred {}, failed {}",
                self.transferred_count, self.failed_count
            ),
        }
    }
}
