//! QuotaGate - reconciliation できる件数の判定と消費
//!
//! # 判定（evaluate）
//! - metered: `available = allowance`
//! - free: `available = max(0, daily_cap - consumed_today)`。
//!   `consumed_today` は `last_usage_date` と今日の比較から求める（タイマーでリセットしない）
//! - 読み出しに失敗したら available = 0, can_proceed = false（fail closed）
//!
//! # 消費（deduct）
//! 直前の evaluate を信頼し、再検証はしない。read-modify-write は
//! プロセス内で直列化する（1 回の run につき 1 回だけ呼ばれる）。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{AccountId, HandoffError, QuotaEvaluation, Tier};
use crate::ports::{Clock, QuotaBackend};

pub struct QuotaGate {
    backend: Arc<dyn QuotaBackend>,
    clock: Arc<dyn Clock>,
    free_daily_cap: u32,
    write_lock: Mutex<()>,
}

impl QuotaGate {
    pub fn new(backend: Arc<dyn QuotaBackend>, clock: Arc<dyn Clock>, free_daily_cap: u32) -> Self {
        Self {
            backend,
            clock,
            free_daily_cap,
            write_lock: Mutex::new(()),
        }
    }

    pub fn free_daily_cap(&self) -> u32 {
        self.free_daily_cap
    }

    pub async fn evaluate(&self, account_id: &AccountId) -> QuotaEvaluation {
        let state = match self.backend.read(account_id).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(account_id = %account_id, error = %e, "quota read failed, denying");
                return QuotaEvaluation::unavailable(HandoffError::QuotaRead(e).to_string());
            }
        };

        let evaluation = match state.tier {
            Tier::Metered => QuotaEvaluation::granted(state.allowance, true),
            Tier::Free => {
                let consumed = state.consumed_on(self.clock.today());
                QuotaEvaluation::granted(self.free_daily_cap.saturating_sub(consumed), false)
            }
        };
        tracing::debug!(
            account_id = %account_id,
            available = evaluation.available_units,
            metered = evaluation.tier_is_metered,
            "quota evaluated"
        );
        evaluation
    }

    pub async fn deduct(
        &self,
        account_id: &AccountId,
        count: u32,
        tier_is_metered: bool,
    ) -> Result<(), HandoffError> {
        let _serialized = self.write_lock.lock().await;

        let mut state = self
            .backend
            .read(account_id)
            .await
            .map_err(HandoffError::QuotaRead)?;
        let today = self.clock.today();

        if tier_is_metered {
            state.allowance = state.allowance.saturating_sub(count);
        } else if state.last_usage_date == Some(today) {
            state.daily_counter = state.daily_counter.saturating_add(count);
        } else {
            state.daily_counter = count;
        }
        state.last_usage_date = Some(today);

        self.backend
            .write(account_id, state)
            .await
            .map_err(HandoffError::QuotaWrite)?;
        tracing::info!(account_id = %account_id, count, metered = tier_is_metered, "quota deducted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuotaState;
    use crate::impls::InMemoryQuotaBackend;
    use crate::ports::FixedClock;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rstest::rstest;

    fn account() -> AccountId {
        AccountId::from("acct-1")
    }

    fn gate_with(state: QuotaState) -> (Arc<FixedClock>, Arc<InMemoryQuotaBackend>, QuotaGate) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 2, 10, 15, 0, 0).unwrap(),
        ));
        let backend = Arc::new(InMemoryQuotaBackend::new().with_account(account(), state));
        let gate = QuotaGate::new(backend.clone(), clock.clone(), 3);
        (clock, backend, gate)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    #[rstest]
    #[case::fresh_account(QuotaState::free(), 3, true)]
    #[case::used_today(QuotaState::free().with_usage(2, day(10)), 1, true)]
    #[case::exhausted_today(QuotaState::free().with_usage(3, day(10)), 0, false)]
    #[case::over_cap_today(QuotaState::free().with_usage(7, day(10)), 0, false)]
    #[case::used_yesterday(QuotaState::free().with_usage(3, day(9)), 3, true)]
    #[case::metered(QuotaState::metered(12), 12, true)]
    #[case::metered_empty(QuotaState::metered(0), 0, false)]
    #[tokio::test]
    async fn evaluate_by_tier(
        #[case] state: QuotaState,
        #[case] available: u32,
        #[case] can_proceed: bool,
    ) {
        let metered = state.is_metered();
        let (_clock, _backend, gate) = gate_with(state);
        let evaluation = gate.evaluate(&account()).await;

        assert_eq!(evaluation.available_units, available);
        assert_eq!(evaluation.can_proceed, can_proceed);
        assert_eq!(evaluation.tier_is_metered, metered);
        assert!(evaluation.read_error.is_none());
    }

    #[tokio::test]
    async fn evaluate_fails_closed() {
        let (_clock, backend, gate) = gate_with(QuotaState::metered(100));
        backend.read_faults().fail_all(true);

        let evaluation = gate.evaluate(&account()).await;
        assert_eq!(evaluation.available_units, 0);
        assert!(!evaluation.can_proceed);
        assert!(evaluation.read_error.is_some());

        let evaluation = gate.evaluate(&AccountId::from("unknown")).await;
        assert!(!evaluation.can_proceed);
    }

    #[tokio::test]
    async fn free_deduct_accumulates_within_a_day() {
        let (_clock, backend, gate) = gate_with(QuotaState::free().with_usage(1, day(10)));
        gate.deduct(&account(), 2, false).await.unwrap();

        let state = backend.get(&account()).await.unwrap();
        assert_eq!(state.daily_counter, 3);
        assert_eq!(state.last_usage_date, Some(day(10)));
    }

    #[tokio::test]
    async fn free_deduct_resets_on_new_day() {
        let (clock, backend, gate) = gate_with(QuotaState::free().with_usage(3, day(10)));
        clock.advance(Duration::hours(10));
        gate.deduct(&account(), 1, false).await.unwrap();

        let state = backend.get(&account()).await.unwrap();
        assert_eq!(state.daily_counter, 1);
        assert_eq!(state.last_usage_date, Some(day(11)));
        assert_eq!(gate.evaluate(&account()).await.available_units, 2);
    }

    #[tokio::test]
    async fn metered_deduct_never_goes_negative() {
        let (_clock, backend, gate) = gate_with(QuotaState::metered(2));
        gate.deduct(&account(), 5, true).await.unwrap();

        let state = backend.get(&account()).await.unwrap();
        assert_eq!(state.allowance, 0);
        assert_eq!(state.last_usage_date, Some(day(10)));
    }

    #[tokio::test]
    async fn concurrent_deducts_do_not_lose_updates() {
        let (_clock, backend, gate) = gate_with(QuotaState::metered(10));
        let gate = Arc::new(gate);

        let a = tokio::spawn({
            let gate = gate.clone();
            async move { gate.deduct(&account(), 2, true).await }
        });
        let b = tokio::spawn({
            let gate = gate.clone();
            async move { gate.deduct(&account(), 3, true).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(backend.get(&account()).await.unwrap().allowance, 5);
    }

    #[tokio::test]
    async fn deduct_surfaces_backend_errors() {
        let (_clock, backend, gate) = gate_with(QuotaState::metered(3));
        backend.write_faults().fail_all(true);
        assert!(matches!(
            gate.deduct(&account(), 1, true).await,
            Err(HandoffError::QuotaWrite(_))
        ));

        backend.read_faults().fail_all(true);
        assert!(matches!(
            gate.deduct(&account(), 1, true).await,
            Err(HandoffError::QuotaRead(_))
        ));
    }
}
