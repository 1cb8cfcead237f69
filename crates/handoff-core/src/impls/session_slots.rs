//! SessionSlot の実装
//!
//! - **InMemorySessionSlot**: プロセス内（テストでは壊れたデータも直接書ける）
//! - **FsSessionSlot**: 1 ファイルに保存

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use crate::domain::errors::StorageError;
use crate::impls::faults::FaultPlan;
use crate::ports::SessionSlot;

#[derive(Debug, Default)]
pub struct InMemorySessionSlot {
    raw: Mutex<Option<String>>,
    load_faults: FaultPlan,
}

impl InMemorySessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 任意の文字列を直接書き込む（壊れたデータの再現用）
    pub async fn put_raw(&self, raw: impl Into<String>) {
        *self.raw.lock().await = Some(raw.into());
    }

    pub async fn raw(&self) -> Option<String> {
        self.raw.lock().await.clone()
    }

    pub fn load_faults(&self) -> &FaultPlan {
        &self.load_faults
    }
}

#[async_trait]
impl SessionSlot for InMemorySessionSlot {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        if self.load_faults.next_call_fails() {
            return Err(StorageError::Unavailable("injected session fault".to_string()));
        }
        Ok(self.raw.lock().await.clone())
    }

    async fn save(&self, raw: String) -> Result<(), StorageError> {
        *self.raw.lock().await = Some(raw);
        Ok(())
    }

    async fn erase(&self) -> Result<(), StorageError> {
        *self.raw.lock().await = None;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FsSessionSlot {
    path: PathBuf,
}

impl FsSessionSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionSlot for FsSessionSlot {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, raw: String) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, raw).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    async fn erase(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
