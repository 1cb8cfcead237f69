// Single source of truth for all default values.

// --- Staging ---
pub const DEFAULT_ARTIFACT_TTL_SECS: u64 = 2 * 60 * 60;
pub const DEFAULT_CATEGORY: &str = "generated";

// --- Session ---
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

// --- Quota ---
pub const DEFAULT_FREE_DAILY_CAP: u32 = 3;
