//! QuotaBackend port - アカウントの quota レコード（正本は外部）

use async_trait::async_trait;

use crate::domain::errors::QuotaBackendError;
use crate::domain::{AccountId, QuotaState};

#[async_trait]
pub trait QuotaBackend: Send + Sync {
    async fn read(&self, account_id: &AccountId) -> Result<QuotaState, QuotaBackendError>;

    async fn write(
        &self,
        account_id: &AccountId,
        state: QuotaState,
    ) -> Result<(), QuotaBackendError>;
}
