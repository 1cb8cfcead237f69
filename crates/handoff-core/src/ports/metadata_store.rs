//! MetadataStore port - アカウントの永続コレクション（リレーショナル DB など）

use async_trait::async_trait;

use crate::domain::errors::MetadataError;
use crate::domain::AccountRecord;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// 挿入したレコードの id を返す
    async fn insert(&self, record: AccountRecord) -> Result<String, MetadataError>;
}
