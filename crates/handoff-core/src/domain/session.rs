//! Anonymous sessions issued to visitors before they authenticate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SessionId;

/// A locally persisted anonymous identity.
///
/// Owned by the local staging environment only; it is never sent to the
/// durable backend and staged artifacts do not depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousSession {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AnonymousSession {
    pub fn new(session_id: SessionId, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            session_id,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
