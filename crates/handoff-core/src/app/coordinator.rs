//! HandoffCoordinator - identity の観測から reconciliation の起動まで
//!
//! # 役割
//! - IdentityProvider を観測し、Anonymous -> Authenticated の edge で run を起動する
//! - RunGuard で同時実行を 1 つに制限する（実行中の発火は捨てる）
//! - run が drain まで進んだら匿名セッションを破棄する。quota に拒否された場合は残す
//!
//! # キャンセル
//! run は tokio の task として spawn され、RunPermit もその task に移る。
//! 呼び出し側が future を drop しても run は最後まで進み、ガードは run の終了時に解放される。
//!
//! # 使用例
//! ```ignore
//! let coordinator = HandoffBuilder::new(config)
//!     .object_store(objects)
//!     .metadata_store(metadata)
//!     .quota_backend(quota)
//!     .identity_provider(identity)
//!     .build()?;
//!
//! coordinator.stage(bytes, Descriptor::new("a cat", "images")).await?;
//! // ... ログイン後
//! if let TriggerOutcome::Completed(outcome) = coordinator.poll().await? {
//!     println!("{}", outcome.summary());
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::app::identity::{IdentityTransitionDetector, RunGuard, RunPermit};
use crate::app::quota::QuotaGate;
use crate::app::reconcile::Reconciler;
use crate::app::session::SessionRegistry;
use crate::app::staging::StagingStore;
use crate::domain::{
    AccountId, ArtifactId, Descriptor, HandoffError, Identity, ReconciliationOutcome,
};
use crate::ports::IdentityProvider;

/// 1 回の観測・起動要求の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// edge が無かった
    Idle,
    /// 別の run が実行中だったので捨てた
    AlreadyRunning,
    Completed(ReconciliationOutcome),
}

impl TriggerOutcome {
    pub fn outcome(&self) -> Option<&ReconciliationOutcome> {
        match self {
            Self::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }
}

pub struct HandoffCoordinator {
    identity: Arc<dyn IdentityProvider>,
    detector: Mutex<IdentityTransitionDetector>,
    guard: RunGuard,
    reconciler: Reconciler,
    sessions: SessionRegistry,
    staging: Arc<StagingStore>,
    quota: Arc<QuotaGate>,
}

impl HandoffCoordinator {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        reconciler: Reconciler,
        sessions: SessionRegistry,
        staging: Arc<StagingStore>,
        quota: Arc<QuotaGate>,
    ) -> Self {
        Self {
            identity,
            detector: Mutex::new(IdentityTransitionDetector::new()),
            guard: RunGuard::new(),
            reconciler,
            sessions,
            staging,
            quota,
        }
    }

    /// 匿名の生成物を staging に置く。セッションが無ければ発行する
    ///
    /// セッションの保存失敗は warn に留める（staging を止めない）
    pub async fn stage(
        &self,
        payload: Vec<u8>,
        descriptor: Descriptor,
    ) -> Result<ArtifactId, HandoffError> {
        let id = self.staging.put(payload, descriptor).await?;
        match self.sessions.get_or_create().await {
            Ok(session) => {
                tracing::debug!(session_id = %session.session_id, artifact_id = %id, "staged for handoff");
            }
            Err(e) => {
                tracing::warn!(artifact_id = %id, error = %e, "anonymous session not saved, artifact staged anyway");
            }
        }
        Ok(id)
    }

    /// IdentityProvider から現在の identity を読んで observe する
    pub async fn poll(&self) -> Result<TriggerOutcome, HandoffError> {
        let identity = self.identity.current();
        self.observe(&identity).await
    }

    /// identity を 1 回観測し、edge なら run を起動して完了を待つ
    pub async fn observe(&self, identity: &Identity) -> Result<TriggerOutcome, HandoffError> {
        let transition = self
            .detector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(identity);

        match transition {
            Some(transition) => self.launch(transition.account_id).await,
            None => Ok(TriggerOutcome::Idle),
        }
    }

    /// edge を待たずに run を起動する（リトライ用）
    ///
    /// detector の状態は変えない。Anonymous なら `NotAuthenticated`。
    pub async fn reconcile(&self, identity: &Identity) -> Result<TriggerOutcome, HandoffError> {
        match identity.account_id() {
            Some(account_id) => self.launch(account_id.clone()).await,
            None => Err(HandoffError::NotAuthenticated),
        }
    }

    /// staging とセッションをすべて破棄する（明示的なサインアウト・破棄用）
    pub async fn teardown(&self) -> Result<usize, HandoffError> {
        let removed = self.staging.clear().await?;
        self.sessions.destroy().await?;
        tracing::info!(removed, "handoff state torn down");
        Ok(removed)
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn quota(&self) -> &QuotaGate {
        &self.quota
    }

    async fn launch(&self, account_id: AccountId) -> Result<TriggerOutcome, HandoffError> {
        let Some(permit) = self.guard.try_acquire() else {
            tracing::info!(account_id = %account_id, "reconciliation already in flight, trigger dropped");
            return Ok(TriggerOutcome::AlreadyRunning);
        };

        let task = tokio::spawn(guarded_run(
            permit,
            self.reconciler.clone(),
            self.sessions.clone(),
            account_id,
        ));
        match task.await {
            Ok(result) => result.map(TriggerOutcome::Completed),
            Err(e) => {
                tracing::error!(error = %e, "reconciliation task did not complete");
                Err(HandoffError::RunAborted(e.to_string()))
            }
        }
    }
}

async fn guarded_run(
    _permit: RunPermit,
    reconciler: Reconciler,
    sessions: SessionRegistry,
    account_id: AccountId,
) -> Result<ReconciliationOutcome, HandoffError> {
    let outcome = reconciler.run(&account_id).await?;

    if outcome.denial.is_none() {
        if let Err(e) = sessions.destroy().await {
            tracing::warn!(account_id = %account_id, error = %e, "anonymous session not destroyed");
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ObjectStoreError;
    use crate::domain::QuotaState;
    use crate::impls::{
        InMemoryMetadataStore, InMemoryObjectStore, InMemoryQuotaBackend, InMemorySessionSlot,
        InMemoryStagingBackend, StaticIdentityProvider,
    };
    use crate::ports::{Clock, FixedClock, ObjectStore, UlidGenerator};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use tokio::sync::Notify;

    /// put の途中で止まるオブジェクトストア
    struct GatedObjectStore {
        inner: InMemoryObjectStore,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ObjectStore for GatedObjectStore {
        async fn put(
            &self,
            path: &str,
            payload: &[u8],
            content_type: &str,
        ) -> Result<(), ObjectStoreError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.put(path, payload, content_type).await
        }

        fn public_url_for(&self, path: &str) -> String {
            self.inner.public_url_for(path)
        }

        async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
            self.inner.delete(path).await
        }
    }

    struct Fixture {
        identity: Arc<StaticIdentityProvider>,
        slot: Arc<InMemorySessionSlot>,
        staging_backend: Arc<InMemoryStagingBackend>,
        quota_backend: Arc<InMemoryQuotaBackend>,
        metadata: Arc<InMemoryMetadataStore>,
        coordinator: Arc<HandoffCoordinator>,
    }

    fn account() -> AccountId {
        AccountId::from("acct-42")
    }

    fn authed() -> Identity {
        Identity::Authenticated(account())
    }

    fn fixture(objects: Arc<dyn ObjectStore>, state: QuotaState) -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 11, 20, 8, 30, 0).unwrap(),
        ));
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        let identity = Arc::new(StaticIdentityProvider::anonymous());
        let slot = Arc::new(InMemorySessionSlot::new());
        let staging_backend = Arc::new(InMemoryStagingBackend::new());
        let quota_backend = Arc::new(InMemoryQuotaBackend::new().with_account(account(), state));
        let metadata = Arc::new(InMemoryMetadataStore::new());

        let staging = Arc::new(StagingStore::new(
            staging_backend.clone(),
            clock.clone(),
            ids.clone(),
            Duration::hours(2),
        ));
        let sessions = SessionRegistry::new(slot.clone(), clock.clone(), ids, Duration::hours(24));
        let quota = Arc::new(QuotaGate::new(quota_backend.clone(), clock, 3));
        let reconciler = Reconciler::new(
            staging.clone(),
            quota.clone(),
            objects,
            metadata.clone(),
            "generated",
        );
        let coordinator = Arc::new(HandoffCoordinator::new(
            identity.clone(),
            reconciler,
            sessions,
            staging,
            quota,
        ));
        Fixture {
            identity,
            slot,
            staging_backend,
            quota_backend,
            metadata,
            coordinator,
        }
    }

    fn plain(state: QuotaState) -> Fixture {
        fixture(Arc::new(InMemoryObjectStore::default()), state)
    }

    fn descriptor() -> Descriptor {
        Descriptor::new("sunset over a harbor", "images").with_content_type("image/webp")
    }

    #[tokio::test]
    async fn stage_issues_session() {
        let f = plain(QuotaState::free());
        f.coordinator.stage(b"x".to_vec(), descriptor()).await.unwrap();

        assert!(f.slot.raw().await.is_some());
        assert_eq!(f.staging_backend.len().await, 1);
    }

    #[tokio::test]
    async fn login_edge_runs_once() {
        let f = plain(QuotaState::free());
        f.coordinator.stage(b"x".to_vec(), descriptor()).await.unwrap();

        assert_eq!(f.coordinator.poll().await.unwrap(), TriggerOutcome::Idle);

        f.identity.set(authed());
        let first = f.coordinator.poll().await.unwrap();
        assert_eq!(first.outcome().map(|o| o.transferred_count), Some(1));

        // re-observing the same identity does not fire
        assert_eq!(f.coordinator.poll().await.unwrap(), TriggerOutcome::Idle);
        assert_eq!(f.metadata.len().await, 1);
        assert!(!f.coordinator.is_running());
    }

    #[tokio::test]
    async fn session_destroyed_after_drain() {
        let f = plain(QuotaState::free());
        f.coordinator.stage(b"x".to_vec(), descriptor()).await.unwrap();

        f.coordinator.observe(&authed()).await.unwrap();
        assert!(f.slot.raw().await.is_none());
        assert!(f.staging_backend.is_empty().await);
    }

    #[tokio::test]
    async fn denied_run_keeps_session_and_staging() {
        let today = chrono::NaiveDate::from_ymd_opt(2024, 11, 20).unwrap();
        let f = plain(QuotaState::free().with_usage(3, today));
        f.coordinator.stage(b"x".to_vec(), descriptor()).await.unwrap();

        let result = f.coordinator.observe(&authed()).await.unwrap();
        assert!(result.outcome().is_some_and(|o| o.is_insufficient_quota()));
        assert!(f.slot.raw().await.is_some());
        assert_eq!(f.staging_backend.len().await, 1);
    }

    #[tokio::test]
    async fn explicit_reconcile_requires_identity() {
        let f = plain(QuotaState::free());
        assert!(matches!(
            f.coordinator.reconcile(&Identity::Anonymous).await,
            Err(HandoffError::NotAuthenticated)
        ));

        // retry after upgrading the account
        f.coordinator.stage(b"x".to_vec(), descriptor()).await.unwrap();
        f.quota_backend.set(account(), QuotaState::metered(10)).await;
        let result = f.coordinator.reconcile(&authed()).await.unwrap();
        assert_eq!(result.outcome().map(|o| o.transferred_count), Some(1));
        assert_eq!(f.quota_backend.get(&account()).await.unwrap().allowance, 9);
    }

    #[tokio::test]
    async fn overlapping_trigger_is_dropped() {
        let objects = Arc::new(GatedObjectStore {
            inner: InMemoryObjectStore::default(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let f = fixture(objects.clone(), QuotaState::metered(10));
        f.coordinator.stage(b"x".to_vec(), descriptor()).await.unwrap();

        let first = tokio::spawn({
            let coordinator = f.coordinator.clone();
            async move { coordinator.observe(&authed()).await }
        });
        objects.entered.notified().await;
        assert!(f.coordinator.is_running());

        // logout then login again while the first run is still uploading
        assert_eq!(
            f.coordinator.observe(&Identity::Anonymous).await.unwrap(),
            TriggerOutcome::Idle
        );
        assert_eq!(
            f.coordinator.observe(&authed()).await.unwrap(),
            TriggerOutcome::AlreadyRunning
        );

        objects.release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.outcome().map(|o| o.transferred_count), Some(1));
        assert_eq!(objects.inner.paths().await.len(), 1);
        assert!(!f.coordinator.is_running());
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_cancel_run() {
        let objects = Arc::new(GatedObjectStore {
            inner: InMemoryObjectStore::default(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let f = fixture(objects.clone(), QuotaState::metered(10));
        f.coordinator.stage(b"x".to_vec(), descriptor()).await.unwrap();

        let caller = tokio::spawn({
            let coordinator = f.coordinator.clone();
            async move { coordinator.observe(&authed()).await }
        });
        objects.entered.notified().await;
        caller.abort();
        objects.release.notify_one();

        for _ in 0..100 {
            if !f.coordinator.is_running() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!f.coordinator.is_running());
        assert!(f.staging_backend.is_empty().await);
        assert_eq!(f.quota_backend.get(&account()).await.unwrap().allowance, 9);
    }

    #[tokio::test]
    async fn teardown_clears_everything() {
        let f = plain(QuotaState::free());
        f.coordinator.stage(b"a".to_vec(), descriptor()).await.unwrap();
        f.coordinator.stage(b"b".to_vec(), descriptor()).await.unwrap();

        assert_eq!(f.coordinator.teardown().await.unwrap(), 2);
        assert!(f.slot.raw().await.is_none());
        assert!(f.staging_backend.is_empty().await);
    }
}
