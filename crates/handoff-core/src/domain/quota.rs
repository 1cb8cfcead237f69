//! Quota model: tiered allowance owned by the account backend.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Account tier.
///
/// - `Free`: a fixed number of reconciliations per calendar day.
/// - `Metered`: a remaining balance of units that only goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Metered,
}

/// Quota record as stored by the account backend.
///
/// The free-tier counter is never reset by a timer: `consumed_on(today)`
/// derives the effective value from `last_usage_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub tier: Tier,

    /// Remaining units (metered tier only).
    #[serde(default)]
    pub allowance: u32,

    /// Units consumed on `last_usage_date` (free tier only).
    #[serde(default)]
    pub daily_counter: u32,

    /// Period anchor: the last day a deduction happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_usage_date: Option<NaiveDate>,
}

impl QuotaState {
    pub fn free() -> Self {
        Self {
            tier: Tier::Free,
            allowance: 0,
            daily_counter: 0,
            last_usage_date: None,
        }
    }

    pub fn metered(allowance: u32) -> Self {
        Self {
            tier: Tier::Metered,
            allowance,
            daily_counter: 0,
            last_usage_date: None,
        }
    }

    pub fn with_usage(mut self, daily_counter: u32, last_usage_date: NaiveDate) -> Self {
        self.daily_counter = daily_counter;
        self.last_usage_date = Some(last_usage_date);
        self
    }

    pub fn is_metered(&self) -> bool {
        self.tier == Tier::Metered
    }

    /// Units consumed today; zero when the anchor is from an earlier day.
    pub fn consumed_on(&self, today: NaiveDate) -> u32 {
        if self.last_usage_date == Some(today) {
            self.daily_counter
        } else {
            0
        }
    }
}

/// Result of a quota evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaEvaluation {
    pub available_units: u32,
    pub tier_is_metered: bool,
    pub can_proceed: bool,

    /// Set when the account record could not be read (fail closed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
}

impl QuotaEvaluation {
    pub fn granted(available_units: u32, tier_is_metered: bool) -> Self {
        Self {
            available_units,
            tier_is_metered,
            can_proceed: available_units > 0,
            read_error: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available_units: 0,
            tier_is_metered: false,
            can_proceed: false,
            read_error: Some(reason.into()),
        }
    }

    /// Whether a batch of `needed` items fits entirely.
    pub fn covers(&self, needed: usize) -> bool {
        self.can_proceed && self.available_units as usize >= needed
    }
}
