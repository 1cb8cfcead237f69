//! Identity as observed from the identity provider.

use serde::{Deserialize, Serialize};

use super::ids::AccountId;

/// The caller's identity at one observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "account_id", rename_all = "snake_case")]
pub enum Identity {
    Anonymous,
    Authenticated(AccountId),
}

impl Identity {
    pub fn account_id(&self) -> Option<&AccountId> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(account_id) => Some(account_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}

impl From<Option<AccountId>> for Identity {
    fn from(value: Option<AccountId>) -> Self {
        match value {
            Some(account_id) => Identity::Authenticated(account_id),
            None => Identity::Anonymous,
        }
    }
}
