//! StagingStore - 期限付きのローカル staging
//!
//! # 期限の扱い
//! - 期限切れの判定は読み出し時にだけ行う（lazy eviction）
//! - バックグラウンドのタイマーは持たないので、スケジューラが止まっていても正しさは変わらない
//! - 読み出し中に見つけた期限切れ artifact はその場で削除し、結果から除外する

use std::sync::Arc;

use chrono::Duration;

use crate::domain::errors::StorageError;
use crate::domain::{ArtifactId, Descriptor, HandoffError, StagedArtifact};
use crate::ports::{Clock, IdGenerator, StagingBackend};

/// id 衝突時に新しい id で取り直す回数
const PUT_ATTEMPTS: usize = 3;

/// Live artifacts found by one `list_live` call.
///
/// Finite and consumed by iteration; a new enumeration needs a new call.
#[derive(Debug)]
pub struct LiveArtifacts {
    live: std::vec::IntoIter<StagedArtifact>,
    evicted: Vec<ArtifactId>,
}

impl LiveArtifacts {
    /// Ids found expired (and deleted) during the scan.
    pub fn evicted(&self) -> &[ArtifactId] {
        &self.evicted
    }
}

impl Iterator for LiveArtifacts {
    type Item = StagedArtifact;

    fn next(&mut self) -> Option<Self::Item> {
        self.live.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.live.size_hint()
    }
}

impl ExactSizeIterator for LiveArtifacts {}

/// StagingStore は backend に TTL の規則を与える
///
/// # 使用例
/// ```ignore
/// let id = store.put(bytes, Descriptor::new("a cat", "images")).await?;
/// for artifact in store.list_live().await? { ... }
/// ```
pub struct StagingStore {
    backend: Arc<dyn StagingBackend>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    ttl: Duration,
}

impl StagingStore {
    pub fn new(
        backend: Arc<dyn StagingBackend>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        ttl: Duration,
    ) -> Self {
        Self {
            backend,
            clock,
            ids,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// payload を staging し、新しい id を返す
    ///
    /// 既存の id を上書きすることはない。衝突した場合は id を取り直す。
    pub async fn put(
        &self,
        payload: Vec<u8>,
        descriptor: Descriptor,
    ) -> Result<ArtifactId, HandoffError> {
        let created_at = self.clock.now();
        let mut artifact = StagedArtifact::new(
            self.ids.generate_artifact_id(),
            payload,
            descriptor,
            created_at,
            self.ttl,
        );

        let mut attempt = 1;
        loop {
            let id = artifact.id;
            match self.backend.insert(artifact.clone()).await {
                Ok(()) => {
                    tracing::debug!(artifact_id = %id, expires_at = %artifact.expires_at, "staged artifact");
                    return Ok(id);
                }
                Err(StorageError::DuplicateId(_)) if attempt < PUT_ATTEMPTS => {
                    tracing::debug!(artifact_id = %id, "artifact id already staged, drawing a new one");
                    attempt += 1;
                    artifact.id = self.ids.generate_artifact_id();
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// 現時点で live な artifact を staging 順に返す
    ///
    /// 期限切れ（`expires_at <= now`）のものは削除して除外する。
    pub async fn list_live(&self) -> Result<LiveArtifacts, HandoffError> {
        let now = self.clock.now();
        let (live, expired): (Vec<_>, Vec<_>) = self
            .backend
            .scan()
            .await?
            .into_iter()
            .partition(|artifact| artifact.is_live_at(now));

        let mut evicted = Vec::with_capacity(expired.len());
        for artifact in expired {
            self.evict(artifact.id).await;
            evicted.push(artifact.id);
        }

        Ok(LiveArtifacts {
            live: live.into_iter(),
            evicted,
        })
    }

    /// preview 用の単発読み出し。期限切れなら削除して None
    pub async fn get(&self, id: ArtifactId) -> Result<Option<StagedArtifact>, HandoffError> {
        match self.backend.get(id).await? {
            Some(artifact) if artifact.is_live_at(self.clock.now()) => Ok(Some(artifact)),
            Some(_) => {
                self.evict(id).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// id で削除。存在しなくてもエラーにしない
    pub async fn remove(&self, id: ArtifactId) -> Result<(), HandoffError> {
        self.backend.delete(id).await?;
        Ok(())
    }

    /// 期限に関係なく全削除（明示的なセッション破棄用）
    pub async fn clear(&self) -> Result<usize, HandoffError> {
        let removed = self.backend.delete_all().await?;
        tracing::debug!(removed, "cleared staging store");
        Ok(removed)
    }

    async fn evict(&self, id: ArtifactId) {
        match self.backend.delete(id).await {
            Ok(_) => tracing::debug!(artifact_id = %id, "evicted expired artifact"),
            Err(e) => {
                tracing::warn!(artifact_id = %id, error = %e, "failed to evict expired artifact")
            }
        }
    }
}
