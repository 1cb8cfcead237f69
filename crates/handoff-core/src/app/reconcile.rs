//! Reconciler - staging から永続アカウントへの移送
//!
//! # フロー（1 回の run）
//! 1. `StagingStore::list_live()` で列挙。空なら何もせず成功
//! 2. `QuotaGate::evaluate()`。バッチ全体が収まらなければ何も触らずに返す（all-or-nothing）
//! 3. 列挙順に 1 件ずつ（並行にはしない）:
//!    a. オブジェクトストアへ upload。失敗したら記録して次へ
//!    b. メタデータを insert。失敗したら upload 済みのオブジェクトを削除して（best-effort）次へ
//!    c. staging から削除して transferred を記録
//! 4. transferred > 0 なら `QuotaGate::deduct()` をバッチで 1 回だけ呼ぶ
//!
//! 列挙後に期限が切れた artifact も処理する。期限は列挙時にだけ判定する。

use std::sync::Arc;

use crate::app::quota::QuotaGate;
use crate::app::staging::StagingStore;
use crate::domain::errors::{ObjectStoreError, TransferError};
use crate::domain::{
    AccountId, AccountRecord, GateDenial, HandoffError, ReconciliationOutcome, StagedArtifact,
};
use crate::ports::{MetadataStore, ObjectStore};

/// 1 件の移送に成功したときの結果
struct Transferred {
    durable_url: String,
    record_id: String,
}

#[derive(Clone)]
pub struct Reconciler {
    staging: Arc<StagingStore>,
    quota: Arc<QuotaGate>,
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    default_category: String,
}

impl Reconciler {
    pub fn new(
        staging: Arc<StagingStore>,
        quota: Arc<QuotaGate>,
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        default_category: impl Into<String>,
    ) -> Self {
        Self {
            staging,
            quota,
            objects,
            metadata,
            default_category: default_category.into(),
        }
    }

    /// staging 中の live な artifact をすべて `account_id` に移す
    ///
    /// 1 件ごとの失敗は outcome に記録され、ここからは返らない。
    /// `Err` になるのは account id がパスに使えない場合と、staging を列挙できなかった場合だけ。
    pub async fn run(&self, account_id: &AccountId) -> Result<ReconciliationOutcome, HandoffError> {
        if !account_id.is_path_segment() {
            return Err(HandoffError::InvalidAccountId(account_id.clone()));
        }
        let live = self.staging.list_live().await?;
        let mut outcome = ReconciliationOutcome::empty();
        for id in live.evicted() {
            outcome.record_skipped(*id);
        }

        let needed = live.len();
        if needed == 0 {
            tracing::debug!(account_id = %account_id, "nothing staged");
            return Ok(outcome);
        }

        let evaluation = self.quota.evaluate(account_id).await;
        if let Some(error) = &evaluation.read_error {
            outcome.deny(GateDenial::QuotaUnavailable {
                needed,
                error: error.clone(),
            });
            return Ok(outcome);
        }
        if !evaluation.covers(needed) {
            tracing::info!(
                account_id = %account_id,
                needed,
                available = evaluation.available_units,
                "insufficient quota, nothing transferred"
            );
            outcome.deny(GateDenial::InsufficientQuota {
                needed,
                available: evaluation.available_units,
            });
            return Ok(outcome);
        }

        tracing::info!(account_id = %account_id, items = needed, "reconciliation started");
        for artifact in live {
            let artifact_id = artifact.id;
            match self.transfer(account_id, &artifact).await {
                Ok(done) => {
                    if let Err(e) = self.staging.remove(artifact_id).await {
                        tracing::error!(artifact_id = %artifact_id, error = %e, "transferred artifact is still staged");
                        outcome.push_error(format!(
                            "{artifact_id}: transferred but not removed from staging: {e}"
                        ));
                    }
                    outcome.record_transferred(artifact_id, done.durable_url, done.record_id);
                }
                Err(e) => {
                    tracing::warn!(artifact_id = %artifact_id, error = %e, "artifact transfer failed");
                    outcome.record_failed(artifact_id, e);
                }
            }
        }

        if outcome.transferred_count > 0 {
            let count = u32::try_from(outcome.transferred_count).unwrap_or(u32::MAX);
            if let Err(e) = self
                .quota
                .deduct(account_id, count, evaluation.tier_is_metered)
                .await
            {
                tracing::error!(account_id = %account_id, count, error = %e, "quota deduction failed after transfer");
                outcome.push_error(e.to_string());
            }
        }

        tracing::info!(
            account_id = %account_id,
            transferred = outcome.transferred_count,
            failed = outcome.failed_count,
            "reconciliation finished"
        );
        Ok(outcome)
    }

    async fn transfer(
        &self,
        account_id: &AccountId,
        artifact: &StagedArtifact,
    ) -> Result<Transferred, TransferError> {
        let path = self.durable_path(account_id, artifact);
        self.objects
            .put(&path, &artifact.payload, &artifact.descriptor.content_type)
            .await
            .map_err(TransferError::Upload)?;
        let durable_url = self.objects.public_url_for(&path);
        tracing::debug!(artifact_id = %artifact.id, path = %path, "uploaded");

        let record = AccountRecord {
            account_id: account_id.clone(),
            descriptor: artifact.descriptor.clone(),
            durable_url: durable_url.clone(),
            created_at: artifact.created_at,
        };
        match self.metadata.insert(record).await {
            Ok(record_id) => Ok(Transferred {
                durable_url,
                record_id,
            }),
            Err(e) => {
                if let Err(cleanup) = self.compensate(&path).await {
                    tracing::warn!(path = %path, error = %cleanup, "orphaned upload left in object store");
                }
                Err(TransferError::MetadataWrite(e))
            }
        }
    }

    /// metadata を書けなかった upload を消す。失敗しても呼び出し側はログに残すだけ
    async fn compensate(&self, path: &str) -> Result<(), ObjectStoreError> {
        self.objects.delete(path).await?;
        tracing::debug!(path = %path, "removed upload without metadata");
        Ok(())
    }

    /// `{category}/{accountId}/{createdAtMillis}-{ulid}.{ext}`
    pub fn durable_path(&self, account_id: &AccountId, artifact: &StagedArtifact) -> String {
        let category = artifact.descriptor.category.trim().trim_matches('/');
        let category = if category.is_empty() {
            self.default_category.as_str()
        } else {
            category
        };
        format!(
            "{category}/{account_id}/{}-{}.{}",
            artifact.created_at.timestamp_millis(),
            artifact.id.as_ulid(),
            artifact.descriptor.file_extension()
        )
    }
}
