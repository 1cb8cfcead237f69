//! FsStagingBackend - ディレクトリに staging する実装
//!
//! # レイアウト
//! - `<dir>/<ulid>.json`: メタデータ（StagedArtifact の payload 以外）
//! - `<dir>/<ulid>.bin`: payload
//!
//! json は一時ファイルに書いてから rename するので、読み手が書きかけの json を見ることはありません。
//! payload を先に書き、json の存在を「staging 済み」の印にします。
//!
//! # 掃除
//! - 壊れた json と、bin を失った json は scan で消す（ペアの bin も一緒に）
//! - json の無い bin は書き込み途中と区別できないので scan では触らない。
//!   insert の失敗時はその場で消し、プロセスが落ちて残ったものは delete_all で回収する

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::errors::StorageError;
use crate::domain::ids::ArtifactId;
use crate::domain::StagedArtifact;
use crate::ports::StagingBackend;

const META_EXT: &str = "json";
const PAYLOAD_EXT: &str = "bin";

#[derive(Debug, Clone)]
pub struct FsStagingBackend {
    dir: PathBuf,
}

impl FsStagingBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn meta_path(&self, id: ArtifactId) -> PathBuf {
        self.dir.join(format!("{}.{META_EXT}", id.as_ulid()))
    }

    fn payload_path(&self, id: ArtifactId) -> PathBuf {
        self.dir.join(format!("{}.{PAYLOAD_EXT}", id.as_ulid()))
    }

    /// json + bin を読み戻す。どちらかが無ければ None
    async fn read_record(&self, meta_path: &Path) -> Result<Option<StagedArtifact>, StorageError> {
        let raw = match fs::read(meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut artifact: StagedArtifact = serde_json::from_slice(&raw)?;
        artifact.payload = match fs::read(self.payload_path(artifact.id)).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(artifact))
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn write_meta(
    artifact: &StagedArtifact,
    tmp_path: &Path,
    meta_path: &Path,
) -> Result<(), StorageError> {
    let meta = serde_json::to_vec_pretty(artifact)?;
    fs::write(tmp_path, meta).await?;
    fs::rename(tmp_path, meta_path).await?;
    Ok(())
}

/// json とペアの bin を消す。失敗しても scan は続ける
async fn discard(meta_path: &Path, reason: &'static str) {
    for path in [meta_path.to_path_buf(), meta_path.with_extension(PAYLOAD_EXT)] {
        match remove_if_exists(&path).await {
            Ok(true) => tracing::info!(path = %path.display(), reason, "removed stale staging file"),
            Ok(false) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove stale staging file"),
        }
    }
}

#[async_trait]
impl StagingBackend for FsStagingBackend {
    async fn insert(&self, artifact: StagedArtifact) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;

        let meta_path = self.meta_path(artifact.id);
        if fs::try_exists(&meta_path).await? {
            return Err(StorageError::DuplicateId(artifact.id));
        }

        let payload_path = self.payload_path(artifact.id);
        fs::write(&payload_path, &artifact.payload).await?;

        let tmp_path = meta_path.with_extension("json.tmp");
        if let Err(e) = write_meta(&artifact, &tmp_path, &meta_path).await {
            let _ = remove_if_exists(&tmp_path).await;
            let _ = remove_if_exists(&payload_path).await;
            return Err(e);
        }
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<StagedArtifact>, StorageError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(META_EXT) {
                continue;
            }
            match self.read_record(&path).await {
                Ok(Some(artifact)) => artifacts.push(artifact),
                // json は bin の後に現れるので、ここで bin が無いのは残骸
                Ok(None) => discard(&path, "staging record without payload").await,
                Err(StorageError::Serialization(e)) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable staging record");
                    discard(&path, "unreadable staging record").await;
                }
                Err(e) => return Err(e),
            }
        }

        artifacts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(artifacts)
    }

    async fn get(&self, id: ArtifactId) -> Result<Option<StagedArtifact>, StorageError> {
        self.read_record(&self.meta_path(id)).await
    }

    async fn delete(&self, id: ArtifactId) -> Result<bool, StorageError> {
        let existed = remove_if_exists(&self.meta_path(id)).await?;
        remove_if_exists(&self.payload_path(id)).await?;
        Ok(existed)
    }

    async fn delete_all(&self) -> Result<usize, StorageError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_meta = path.extension().and_then(|ext| ext.to_str()) == Some(META_EXT);
            if remove_if_exists(&path).await? && is_meta {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
