//! Errors - エラー型と分類
//!
//! # 分類
//! - **StorageError**: ローカル staging / session の I/O エラー
//! - **ObjectStoreError / MetadataError / QuotaBackendError**: 外部 collaborator のエラー
//! - **TransferError**: 1 件の artifact 転送の失敗（outcome に記録され、バッチは継続）
//! - **HandoffError**: 呼び出し側に返すエラー
//!
//! quota 不足はエラーではありません（`ReconciliationOutcome` の通常の結果です）。

use serde::Serialize;
use thiserror::Error;

use super::ids::{AccountId, ArtifactId};

/// Local staging / session storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("staging io: {0}")]
    Io(#[from] std::io::Error),

    #[error("staging record is not valid json: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("artifact id {0} is already staged")]
    DuplicateId(ArtifactId),

    #[error("staging storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable object store failure.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ObjectStoreError {
    #[error("object store rejected {path}: {reason}")]
    Rejected { path: String, reason: String },

    #[error("object store unreachable: {0}")]
    Unreachable(String),
}

/// Account metadata store failure.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MetadataError {
    #[error("metadata insert rejected: {0}")]
    Rejected(String),

    #[error("metadata store unreachable: {0}")]
    Unreachable(String),
}

/// Account / quota backend failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuotaBackendError {
    #[error("no quota record for account {0}")]
    NotFound(AccountId),

    #[error("quota backend unreachable: {0}")]
    Unreachable(String),
}

/// Per-item transfer failure. Recorded in the outcome, never raised past `run()`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransferError {
    #[error("upload failed: {0}")]
    Upload(#[source] ObjectStoreError),

    #[error("metadata write failed: {0}")]
    MetadataWrite(#[source] MetadataError),
}

/// Errors surfaced to callers of the core.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error(transparent)]
    StagingIo(#[from] StorageError),

    #[error("quota read failed: {0}")]
    QuotaRead(#[source] QuotaBackendError),

    #[error("quota write failed: {0}")]
    QuotaWrite(#[source] QuotaBackendError),

    #[error("reconciliation requires an authenticated identity")]
    NotAuthenticated,

    #[error("account id '{0}' cannot be used as a storage path segment")]
    InvalidAccountId(AccountId),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("reconciliation run aborted: {0}")]
    RunAborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_error_messages_are_readable() {
        let err = TransferError::Upload(ObjectStoreError::Unreachable("timeout".to_string()));
        assert_eq!(err.to_string(), "upload failed: object store unreachable: timeout");

        let err = TransferError::MetadataWrite(MetadataError::Rejected("quota".to_string()));
        assert_eq!(
            err.to_string(),
            "metadata write failed: metadata insert rejected: quota"
        );
    }

    #[test]
    fn storage_errors_convert_into_staging_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: HandoffError = StorageError::from(io).into();
        assert!(matches!(err, HandoffError::StagingIo(StorageError::Io(_))));
        assert!(err.to_string().contains("read-only"));
    }
}
