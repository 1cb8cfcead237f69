//! InMemoryStagingBackend - 開発・テスト用の staging 置き場
//!
//! 挿入順の Vec で保持します（挿入順 = staging 順）。

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::StorageError;
use crate::domain::ids::ArtifactId;
use crate::domain::StagedArtifact;
use crate::impls::faults::FaultPlan;
use crate::ports::StagingBackend;

#[derive(Debug, Default)]
pub struct InMemoryStagingBackend {
    artifacts: Mutex<Vec<StagedArtifact>>,
    faults: FaultPlan,
}

impl InMemoryStagingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全操作に適用される失敗注入
    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// 期限に関係なく保持している件数
    pub async fn len(&self) -> usize {
        self.artifacts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.lock().await.is_empty()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.faults.next_call_fails() {
            return Err(StorageError::Unavailable("injected staging fault".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StagingBackend for InMemoryStagingBackend {
    async fn insert(&self, artifact: StagedArtifact) -> Result<(), StorageError> {
        self.check()?;
        let mut artifacts = self.artifacts.lock().await;
        if artifacts.iter().any(|a| a.id == artifact.id) {
            return Err(StorageError::DuplicateId(artifact.id));
        }
        artifacts.push(artifact);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<StagedArtifact>, StorageError> {
        self.check()?;
        Ok(self.artifacts.lock().await.clone())
    }

    async fn get(&self, id: ArtifactId) -> Result<Option<StagedArtifact>, StorageError> {
        self.check()?;
        let artifacts = self.artifacts.lock().await;
        Ok(artifacts.iter().find(|a| a.id == id).cloned())
    }

    async fn delete(&self, id: ArtifactId) -> Result<bool, StorageError> {
        self.check()?;
        let mut artifacts = self.artifacts.lock().await;
        let before = artifacts.len();
        artifacts.retain(|a| a.id != id);
        Ok(artifacts.len() != before)
    }

    async fn delete_all(&self) -> Result<usize, StorageError> {
        self.check()?;
        let mut artifacts = self.artifacts.lock().await;
        let removed = artifacts.len();
        artifacts.clear();
        Ok(removed)
    }
}
