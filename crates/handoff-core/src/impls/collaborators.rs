//! 外部 collaborator の in-memory 実装（開発・テスト用）
//!
//! - **InMemoryObjectStore**: path → object
//! - **InMemoryMetadataStore**: 挿入された AccountRecord の一覧
//! - **InMemoryQuotaBackend**: account → QuotaState
//! - **StaticIdentityProvider**: 外から差し替える identity
//!
//! どれも呼び出し回数を数え、FaultPlan で失敗を注入できます。

use std::collections::HashMap;
use std::sync::{Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::{MetadataError, ObjectStoreError, QuotaBackendError};
use crate::domain::{AccountId, AccountRecord, Identity, QuotaState};
use crate::impls::faults::FaultPlan;
use crate::ports::{IdentityProvider, MetadataStore, ObjectStore, QuotaBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub payload: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug)]
pub struct InMemoryObjectStore {
    base_url: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    put_faults: FaultPlan,
    delete_faults: FaultPlan,
}

impl InMemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            put_faults: FaultPlan::new(),
            delete_faults: FaultPlan::new(),
        }
    }

    pub fn put_faults(&self) -> &FaultPlan {
        &self.put_faults
    }

    pub fn delete_faults(&self) -> &FaultPlan {
        &self.delete_faults
    }

    pub async fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        path: &str,
        payload: &[u8],
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        if self.put_faults.next_call_fails() {
            return Err(ObjectStoreError::Unreachable(format!("injected put fault for {path}")));
        }
        self.objects.lock().await.insert(
            path.to_string(),
            StoredObject {
                payload: payload.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
        if self.delete_faults.next_call_fails() {
            return Err(ObjectStoreError::Unreachable(format!(
                "injected delete fault for {path}"
            )));
        }
        self.objects.lock().await.remove(path);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: Mutex<Vec<(String, AccountRecord)>>,
    insert_faults: FaultPlan,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_faults(&self) -> &FaultPlan {
        &self.insert_faults
    }

    pub async fn records_for(&self, account_id: &AccountId) -> Vec<AccountRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|(_, r)| &r.account_id == account_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert(&self, record: AccountRecord) -> Result<String, MetadataError> {
        if self.insert_faults.next_call_fails() {
            return Err(MetadataError::Unreachable("injected insert fault".to_string()));
        }
        let mut records = self.records.lock().await;
        let id = format!("rec-{}", records.len() + 1);
        records.push((id.clone(), record));
        Ok(id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryQuotaBackend {
    accounts: Mutex<HashMap<AccountId, QuotaState>>,
    read_faults: FaultPlan,
    write_faults: FaultPlan,
}

impl InMemoryQuotaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account_id: AccountId, state: QuotaState) -> Self {
        self.accounts.get_mut().insert(account_id, state);
        self
    }

    pub async fn set(&self, account_id: AccountId, state: QuotaState) {
        self.accounts.lock().await.insert(account_id, state);
    }

    pub async fn get(&self, account_id: &AccountId) -> Option<QuotaState> {
        self.accounts.lock().await.get(account_id).cloned()
    }

    pub fn read_faults(&self) -> &FaultPlan {
        &self.read_faults
    }

    pub fn write_faults(&self) -> &FaultPlan {
        &self.write_faults
    }
}

#[async_trait]
impl QuotaBackend for InMemoryQuotaBackend {
    async fn read(&self, account_id: &AccountId) -> Result<QuotaState, QuotaBackendError> {
        if self.read_faults.next_call_fails() {
            return Err(QuotaBackendError::Unreachable("injected read fault".to_string()));
        }
        self.accounts
            .lock()
            .await
            .get(account_id)
            .cloned()
            .ok_or_else(|| QuotaBackendError::NotFound(account_id.clone()))
    }

    async fn write(
        &self,
        account_id: &AccountId,
        state: QuotaState,
    ) -> Result<(), QuotaBackendError> {
        if self.write_faults.next_call_fails() {
            return Err(QuotaBackendError::Unreachable("injected write fault".to_string()));
        }
        self.accounts.lock().await.insert(account_id.clone(), state);
        Ok(())
    }
}

/// テストやデモで identity を切り替えるための provider
#[derive(Debug)]
pub struct StaticIdentityProvider {
    identity: StdMutex<Identity>,
}

impl StaticIdentityProvider {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: StdMutex::new(identity),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(Identity::Anonymous)
    }

    pub fn set(&self, identity: Identity) {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = identity;
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn current(&self) -> Identity {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
