//! FaultPlan - in-memory 実装の失敗注入
//!
//! 呼び出しを 1 から数え、指定した回の呼び出し（または全呼び出し）を失敗させます。

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct FaultPlan {
    calls: AtomicUsize,
    failing_calls: Mutex<HashSet<usize>>,
    fail_all: AtomicBool,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// n 回目（1 始まり）の呼び出しを失敗させる
    pub fn fail_call(&self, n: usize) {
        self.failing_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(n);
    }

    pub fn fail_all(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    /// これまでの呼び出し回数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 呼び出しを 1 回数え、この呼び出しを失敗させるべきかを返す
    pub fn next_call_fails(&self) -> bool {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.fail_all.load(Ordering::SeqCst)
            || self
                .failing_calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fails_only_the_planned_call() {
        let plan = FaultPlan::new();
        plan.fail_call(2);

        assert!(!plan.next_call_fails());
        assert!(plan.next_call_fails());
        assert!(!plan.next_call_fails());
        assert_eq!(plan.calls(), 3);
    }

    #[test]
    fn fail_all_can_be_toggled() {
        let plan = FaultPlan::new();
        plan.fail_all(true);
        assert!(plan.next_call_fails());
        plan.fail_all(false);
        assert!(!plan.next_call_fails());
    }
}
