//! StagingBackend port - staging 中の artifact を保持するローカルストレージ
//!
//! backend は単純なキー付きレコード置き場です。TTL の判定や lazy eviction は
//! `app::staging::StagingStore` 側で行い、backend は時刻を知りません。
//!
//! # 実装
//! - **InMemoryStagingBackend**: プロセス内（開発・テスト用）
//! - **FsStagingBackend**: ディレクトリに保存（プロセス再起動後も残る）

use async_trait::async_trait;

use crate::domain::errors::StorageError;
use crate::domain::ids::ArtifactId;
use crate::domain::StagedArtifact;

/// StagingBackend は StagedArtifact をキー（ArtifactId）で保持
///
/// # 設計原則
/// - `insert` は既存の id を上書きしない（`StorageError::DuplicateId`）
/// - `scan` は staging 順（created_at 昇順）で全件を返す
/// - `delete` は存在しない id でもエラーにしない
#[async_trait]
pub trait StagingBackend: Send + Sync {
    async fn insert(&self, artifact: StagedArtifact) -> Result<(), StorageError>;

    async fn scan(&self) -> Result<Vec<StagedArtifact>, StorageError>;

    async fn get(&self, id: ArtifactId) -> Result<Option<StagedArtifact>, StorageError>;

    /// 削除した場合は true
    async fn delete(&self, id: ArtifactId) -> Result<bool, StorageError>;

    /// 削除した件数を返す
    async fn delete_all(&self) -> Result<usize, StorageError>;
}
