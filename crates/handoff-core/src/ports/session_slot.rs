//! SessionSlot port - 匿名セッションを 1 件だけ保存する場所
//!
//! 中身は不透明な文字列です。パースは `app::session::SessionRegistry` が行うので、
//! 壊れたデータもそのまま返してかまいません。

use async_trait::async_trait;

use crate::domain::errors::StorageError;

#[async_trait]
pub trait SessionSlot: Send + Sync {
    async fn load(&self) -> Result<Option<String>, StorageError>;

    /// 既存の値は置き換える
    async fn save(&self, raw: String) -> Result<(), StorageError>;

    async fn erase(&self) -> Result<(), StorageError>;
}
