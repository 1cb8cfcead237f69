//! Domain model (ids, artifacts, sessions, quota, identity, records, outcomes, errors).

pub mod artifact;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod outcome;
pub mod quota;
pub mod record;
pub mod session;

pub use artifact::{Descriptor, StagedArtifact};
pub use errors::{
    HandoffError, MetadataError, ObjectStoreError, QuotaBackendError, StorageError, TransferError,
};
pub use identity::Identity;
pub use ids::{AccountId, ArtifactId, SessionId};
pub use outcome::{GateDenial, ItemOutcome, ItemResult, ReconciliationOutcome};
pub use quota::{QuotaEvaluation, QuotaState, Tier};
pub use record::AccountRecord;
pub use session::AnonymousSession;
