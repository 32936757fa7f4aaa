//! Concurrent reservations for one user.
//!
//! With the atomic primitive the store serialises the bound check, so two
//! reservations whose sum exceeds the balance cannot both commit. Without it
//! the fallback path's read-then-write lets both through; that overcommit is
//! the accepted cost of the degraded mode and is asserted here as such.

use std::sync::Arc;

use async_trait::async_trait;
use credit_ledger::{
    config::OverrunPolicy,
    models::credits::{AccountBalance, BalanceUpdate},
    services::{
        store::{AccountStore, MemoryAccountStore, ReserveOutcome, StoreResult},
        CreditsService,
    },
    CreditError,
};
use tokio::{sync::Barrier, task::JoinSet};
use uuid::Uuid;

use super::test_config;

/// Holds every reservation at the store boundary until all callers have read
/// the account, so each one decides against the same availability snapshot.
struct GatedStore {
    inner: Arc<MemoryAccountStore>,
    gate: Barrier,
}

#[async_trait]
impl AccountStore for GatedStore {
    async fn read_account(&self, user_id: Uuid) -> StoreResult<Option<AccountBalance>> {
        self.inner.read_account(user_id).await
    }

    async fn atomic_reserve(&self, user_id: Uuid, amount: i64) -> StoreResult<ReserveOutcome> {
        self.gate.wait().await;
        self.inner.atomic_reserve(user_id, amount).await
    }

    async fn atomic_finalize(
        &self,
        user_id: Uuid,
        reserved_amount: i64,
        actual_amount: i64,
    ) -> StoreResult<()> {
        self.inner
            .atomic_finalize(user_id, reserved_amount, actual_amount)
            .await
    }

    async fn atomic_release(&self, user_id: Uuid, amount: i64) -> StoreResult<()> {
        self.inner.atomic_release(user_id, amount).await
    }

    async fn unconditional_update(&self, user_id: Uuid, update: BalanceUpdate) -> StoreResult<()> {
        self.inner.unconditional_update(user_id, update).await
    }
}

async fn race_two_reservations(
    inner: MemoryAccountStore,
) -> (Vec<Result<i64, CreditError>>, AccountBalance) {
    let inner = Arc::new(inner);
    let user_id = Uuid::new_v4();
    inner.insert_account(user_id, 100, 0);

    let store = Arc::new(GatedStore {
        inner: inner.clone(),
        gate: Barrier::new(2),
    });
    let config = test_config(OverrunPolicy::Charge);
    let service = Arc::new(CreditsService::new(store, &config.ledger));

    let mut tasks = JoinSet::new();
    for _ in 0..2 {
        let service = service.clone();
        tasks.spawn(async move { service.reserve(user_id, 60, 60).await });
    }

    let mut results = Vec::new();
    while let Some(result) = tasks.join_next().await {
        results.push(result.expect("reservation task panicked"));
    }

    let balance = inner.balance(user_id).expect("account exists");
    (results, balance)
}

#[tokio::test]
async fn test_atomic_primitive_prevents_overcommit() {
    let (results, balance) = race_two_reservations(MemoryAccountStore::new()).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "exactly one reservation may commit");
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(CreditError::ReservationFailed(_)))));
    assert_eq!(balance, AccountBalance::new(100, 60));
}

#[tokio::test]
async fn test_fallback_overcommits_as_documented() {
    let (results, balance) =
        race_two_reservations(MemoryAccountStore::without_atomic_primitives()).await;

    assert!(results.iter().all(|r| matches!(r, Ok(60))));
    assert_eq!(balance.reserved_credits, 120);
    assert!(balance.reserved_credits > balance.total_credits);
}

#[tokio::test]
async fn test_many_concurrent_reservations_never_exceed_total() {
    let inner = Arc::new(MemoryAccountStore::new());
    let user_id = Uuid::new_v4();
    inner.insert_account(user_id, 100, 0);

    let config = test_config(OverrunPolicy::Charge);
    let service = Arc::new(CreditsService::new(inner.clone(), &config.ledger));

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let service = service.clone();
        tasks.spawn(async move { service.reserve(user_id, 30, 30).await });
    }

    let mut reserved_total = 0;
    while let Some(result) = tasks.join_next().await {
        if let Ok(amount) = result.expect("reservation task panicked") {
            reserved_total += amount;
        }
    }

    let balance = inner.balance(user_id).unwrap();
    assert_eq!(balance.reserved_credits, reserved_total);
    assert_eq!(reserved_total, 90);
}
