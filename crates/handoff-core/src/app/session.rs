//! SessionRegistry - 匿名セッションの発行と保存
//!
//! 保存先（SessionSlot）は注入されるので、グローバルな状態は持ちません。
//! 保存データが読めない・壊れている場合は「無い」として扱い、新しいセッションを発行します。
//! パースエラーを呼び出し側に返すことはありません。

use std::sync::Arc;

use chrono::Duration;

use crate::domain::{AnonymousSession, HandoffError};
use crate::ports::{Clock, IdGenerator, SessionSlot};

#[derive(Clone)]
pub struct SessionRegistry {
    slot: Arc<dyn SessionSlot>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(
        slot: Arc<dyn SessionSlot>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        ttl: Duration,
    ) -> Self {
        Self {
            slot,
            clock,
            ids,
            ttl,
        }
    }

    /// live なセッションを返す。無ければ発行して保存する
    ///
    /// 保存に失敗した場合だけ `StagingIo` を返す。
    pub async fn get_or_create(&self) -> Result<AnonymousSession, HandoffError> {
        if let Some(session) = self.peek().await {
            return Ok(session);
        }

        let session = AnonymousSession::new(
            self.ids.generate_session_id(),
            self.clock.now(),
            self.ttl,
        );
        let raw = serde_json::to_string(&session).map_err(crate::domain::StorageError::from)?;
        self.slot.save(raw).await?;
        tracing::info!(session_id = %session.session_id, expires_at = %session.expires_at, "issued anonymous session");
        Ok(session)
    }

    /// 発行はせずに live なセッションを返す
    pub async fn peek(&self) -> Option<AnonymousSession> {
        let raw = match self.slot.load().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "session slot unreadable, treating as absent");
                return None;
            }
        };

        match serde_json::from_str::<AnonymousSession>(&raw) {
            Ok(session) if session.is_live_at(self.clock.now()) => Some(session),
            Ok(session) => {
                tracing::debug!(session_id = %session.session_id, "anonymous session expired");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "corrupt anonymous session, treating as absent");
                None
            }
        }
    }

    pub async fn destroy(&self) -> Result<(), HandoffError> {
        self.slot.erase().await?;
        tracing::debug!("destroyed anonymous session");
        Ok(())
    }
}
