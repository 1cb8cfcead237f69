//! IdentityTransitionDetector と RunGuard
//!
//! # 状態遷移
//! - Anonymous -> Authenticated(a): 発火（reconciliation を開始する）
//! - Authenticated(a) -> Authenticated(a): 発火しない（同じ identity の再観測）
//! - Authenticated(a) -> Authenticated(b): 発火しない（匿名を経由していない）
//! - Authenticated(_) -> Anonymous: 発火しない。記憶をリセットし、次のログインで再び発火できる
//!
//! 直前に観測した identity とだけ比較する（edge-triggered）。累積フラグは持たない。
//!
//! # RunGuard
//! 実行中の reconciliation は同時に 1 つだけ。実行中に発火した場合はキューに積まず捨てる。
//! RunPermit が drop されたとき（成功・失敗・panic のいずれでも）に解放される。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::{AccountId, Identity};

/// Anonymous -> Authenticated の edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub account_id: AccountId,
}

/// 2 状態のステートマシン
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorState {
    Anonymous,
    Authenticated(AccountId),
}

#[derive(Debug)]
pub struct IdentityTransitionDetector {
    state: DetectorState,
}

impl IdentityTransitionDetector {
    pub fn new() -> Self {
        Self {
            state: DetectorState::Anonymous,
        }
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// identity を 1 回観測する。Anonymous -> Authenticated のときだけ Transition を返す
    pub fn observe(&mut self, identity: &Identity) -> Option<Transition> {
        let next = match identity {
            Identity::Anonymous => DetectorState::Anonymous,
            Identity::Authenticated(account_id) => DetectorState::Authenticated(account_id.clone()),
        };
        let previous = std::mem::replace(&mut self.state, next);

        match (&previous, &self.state) {
            (DetectorState::Anonymous, DetectorState::Authenticated(account_id)) => {
                tracing::info!(account_id = %account_id, "identity transition: anonymous -> authenticated");
                Some(Transition {
                    account_id: account_id.clone(),
                })
            }
            (DetectorState::Authenticated(account_id), DetectorState::Anonymous) => {
                tracing::debug!(account_id = %account_id, "identity returned to anonymous");
                None
            }
            _ => None,
        }
    }
}

impl Default for IdentityTransitionDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// 実行中の reconciliation を 1 つに制限するガード
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 空いていれば permit を返す。実行中なら None
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// drop でガードを解放する
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authed(id: &str) -> Identity {
        Identity::Authenticated(AccountId::from(id))
    }

    #[test]
    fn fires_once_per_login() {
        let mut detector = IdentityTransitionDetector::new();

        assert_eq!(detector.observe(&Identity::Anonymous), None);
        assert_eq!(
            detector.observe(&authed("u1")),
            Some(Transition {
                account_id: AccountId::from("u1")
            })
        );
        // tab refocus etc.
        assert_eq!(detector.observe(&authed("u1")), None);
        assert_eq!(detector.observe(&authed("u1")), None);
    }

    #[test]
    fn logout_resets_memory() {
        let mut detector = IdentityTransitionDetector::new();
        assert!(detector.observe(&authed("u1")).is_some());
        assert!(detector.observe(&Identity::Anonymous).is_none());
        assert_eq!(detector.state(), &DetectorState::Anonymous);
        assert!(detector.observe(&authed("u1")).is_some());
    }

    #[test]
    fn account_switch_without_logout_does_not_fire() {
        let mut detector = IdentityTransitionDetector::new();
        assert!(detector.observe(&authed("u1")).is_some());
        assert!(detector.observe(&authed("u2")).is_none());
        assert_eq!(
            detector.state(),
            &DetectorState::Authenticated(AccountId::from("u2"))
        );
    }

    #[test]
    fn guard_admits_one_holder() {
        let guard = RunGuard::new();
        let permit = guard.try_acquire().unwrap();
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());
        assert!(guard.clone().try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn guard_is_released_on_unwind() {
        let guard = RunGuard::new();
        let inner = guard.clone();
        let result = std::panic::catch_unwind(move || {
            let _permit = inner.try_acquire().unwrap();
            panic!("run blew up");
        });
        assert!(result.is_err());
        assert!(!guard.is_running());
    }
}
