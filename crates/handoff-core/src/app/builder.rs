//! HandoffBuilder - coordinator の構築とワイヤリング
//!
//! # 方針
//! - 外部 collaborator（object store, metadata store, quota backend, identity provider）は必須
//! - ローカルの保存先は設定から選ぶ（パスがあればファイル、無ければメモリ）
//! - 不足は build() でまとめて報告する（Fail-fast）

use std::sync::Arc;

use crate::app::coordinator::HandoffCoordinator;
use crate::app::quota::QuotaGate;
use crate::app::reconcile::Reconciler;
use crate::app::session::SessionRegistry;
use crate::app::staging::StagingStore;
use crate::config::HandoffConfig;
use crate::domain::HandoffError;
use crate::impls::{FsSessionSlot, FsStagingBackend, InMemorySessionSlot, InMemoryStagingBackend};
use crate::ports::{
    Clock, IdGenerator, IdentityProvider, MetadataStore, ObjectStore, QuotaBackend, SessionSlot,
    StagingBackend, SystemClock, UlidGenerator,
};

/// HandoffBuilder は HandoffCoordinator を構築
///
/// # 使用例
/// ```ignore
/// let coordinator = HandoffBuilder::new(HandoffConfig::default())
///     .object_store(Arc::new(S3Store::new(bucket)))
///     .metadata_store(Arc::new(PgRecords::new(pool)))
///     .quota_backend(Arc::new(BillingQuota::new(client)))
///     .identity_provider(Arc::new(auth))
///     .build()?;
/// ```
pub struct HandoffBuilder {
    config: HandoffConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    staging_backend: Option<Arc<dyn StagingBackend>>,
    session_slot: Option<Arc<dyn SessionSlot>>,
    object_store: Option<Arc<dyn ObjectStore>>,
    metadata_store: Option<Arc<dyn MetadataStore>>,
    quota_backend: Option<Arc<dyn QuotaBackend>>,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing collaborators: {0:?}. These ports must be provided before build().")]
    MissingCollaborators(Vec<&'static str>),

    #[error(transparent)]
    InvalidConfig(#[from] HandoffError),
}

impl HandoffBuilder {
    pub fn new(config: HandoffConfig) -> Self {
        Self {
            config,
            clock: None,
            ids: None,
            staging_backend: None,
            session_slot: None,
            object_store: None,
            metadata_store: None,
            quota_backend: None,
            identity_provider: None,
        }
    }

    /// 省略時は SystemClock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 省略時は clock を使う UlidGenerator
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// 設定の `staging.dir` より優先される
    pub fn staging_backend(mut self, backend: Arc<dyn StagingBackend>) -> Self {
        self.staging_backend = Some(backend);
        self
    }

    /// 設定の `session.path` より優先される
    pub fn session_slot(mut self, slot: Arc<dyn SessionSlot>) -> Self {
        self.session_slot = Some(slot);
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata_store = Some(store);
        self
    }

    pub fn quota_backend(mut self, backend: Arc<dyn QuotaBackend>) -> Self {
        self.quota_backend = Some(backend);
        self
    }

    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    /// # 検証
    /// - 設定が不正なら BuildError::InvalidConfig
    /// - 必須の collaborator が欠けていれば、欠けているものをすべて挙げて BuildError::MissingCollaborators
    pub fn build(self) -> Result<HandoffCoordinator, BuildError> {
        self.config.validate()?;

        let mut missing = Vec::new();
        if self.object_store.is_none() {
            missing.push("object_store");
        }
        if self.metadata_store.is_none() {
            missing.push("metadata_store");
        }
        if self.quota_backend.is_none() {
            missing.push("quota_backend");
        }
        if self.identity_provider.is_none() {
            missing.push("identity_provider");
        }
        let (Some(objects), Some(metadata), Some(quota_backend), Some(identity)) = (
            self.object_store,
            self.metadata_store,
            self.quota_backend,
            self.identity_provider,
        ) else {
            return Err(BuildError::MissingCollaborators(missing));
        };

        let config = self.config;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())) as Arc<dyn IdGenerator>);

        let staging_backend = self.staging_backend.unwrap_or_else(|| match &config.staging.dir {
            Some(dir) => Arc::new(FsStagingBackend::new(dir.clone())) as Arc<dyn StagingBackend>,
            None => Arc::new(InMemoryStagingBackend::new()),
        });
        let session_slot = self.session_slot.unwrap_or_else(|| match &config.session.path {
            Some(path) => Arc::new(FsSessionSlot::new(path.clone())) as Arc<dyn SessionSlot>,
            None => Arc::new(InMemorySessionSlot::new()),
        });

        let staging = Arc::new(StagingStore::new(
            staging_backend,
            clock.clone(),
            ids.clone(),
            config.staging.artifact_ttl(),
        ));
        let sessions = SessionRegistry::new(session_slot, clock.clone(), ids, config.session.ttl());
        let quota = Arc::new(QuotaGate::new(
            quota_backend,
            clock,
            config.quota.free_daily_cap,
        ));
        let reconciler = Reconciler::new(
            staging.clone(),
            quota.clone(),
            objects,
            metadata,
            config.staging.default_category,
        );

        tracing::debug!(
            artifact_ttl_secs = config.staging.artifact_ttl_secs,
            session_ttl_secs = config.session.ttl_secs,
            free_daily_cap = config.quota.free_daily_cap,
            "handoff coordinator built"
        );
        Ok(HandoffCoordinator::new(
            identity, reconciler, sessions, staging, quota,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Descriptor, Identity, QuotaState};
    use crate::impls::{
        InMemoryMetadataStore, InMemoryObjectStore, InMemoryQuotaBackend, StaticIdentityProvider,
    };

    fn complete(config: HandoffConfig) -> HandoffBuilder {
        HandoffBuilder::new(config)
            .object_store(Arc::new(InMemoryObjectStore::default()))
            .metadata_store(Arc::new(InMemoryMetadataStore::new()))
            .quota_backend(Arc::new(
                InMemoryQuotaBackend::new().with_account(AccountId::from("u1"), QuotaState::free()),
            ))
            .identity_provider(Arc::new(StaticIdentityProvider::anonymous()))
    }

    #[test]
    fn test_build_success() {
        let coordinator = complete(HandoffConfig::default()).build();
        assert!(coordinator.is_ok());
    }

    #[test]
    fn test_build_reports_all_missing() {
        let result = HandoffBuilder::new(HandoffConfig::default())
            .metadata_store(Arc::new(InMemoryMetadataStore::new()))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingCollaborators(missing))
                if missing == vec!["object_store", "quota_backend", "identity_provider"]
        ));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = HandoffConfig::default();
        config.staging.artifact_ttl_secs = 0;
        assert!(matches!(
            complete(config).build(),
            Err(BuildError::InvalidConfig(HandoffError::Config(_)))
        ));
    }

    #[tokio::test]
    async fn test_config_selects_filesystem_backends() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HandoffConfig::default();
        config.staging.dir = Some(dir.path().join("staging"));
        config.session.path = Some(dir.path().join("session.json"));
        config.quota.free_daily_cap = 5;

        let coordinator = complete(config).build().unwrap();
        coordinator
            .stage(b"png".to_vec(), Descriptor::new("p", "images"))
            .await
            .unwrap();

        assert!(dir.path().join("session.json").exists());
        assert_eq!(std::fs::read_dir(dir.path().join("staging")).unwrap().count(), 2);
        assert_eq!(coordinator.quota().free_daily_cap(), 5);

        let result = coordinator
            .observe(&Identity::Authenticated(AccountId::from("u1")))
            .await
            .unwrap();
        assert_eq!(result.outcome().map(|o| o.transferred_count), Some(1));
    }

    #[tokio::test]
    async fn test_unwritable_session_does_not_block_staging() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"regular file").unwrap();
        let mut config = HandoffConfig::default();
        config.session.path = Some(blocker.join("session.json"));

        let coordinator = complete(config).build().unwrap();
        let id = coordinator
            .stage(b"png".to_vec(), Descriptor::new("p", "images"))
            .await
            .unwrap();

        let live: Vec<_> = coordinator.staging().list_live().await.unwrap().map(|a| a.id).collect();
        assert_eq!(live, vec![id]);
        assert!(coordinator.sessions().peek().await.is_none());
    }
}
