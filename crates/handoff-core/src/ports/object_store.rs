//! ObjectStore port - 永続オブジェクトストア（S3 / GCS など）
//!
//! パスは `{category}/{accountId}/{fileName}` の形で名前空間化されます。
//! アクセス制御は外部の責務です。

use async_trait::async_trait;

use crate::domain::errors::ObjectStoreError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        path: &str,
        payload: &[u8],
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    fn public_url_for(&self, path: &str) -> String;

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError>;
}
