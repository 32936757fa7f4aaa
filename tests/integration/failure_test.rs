//! Store failures other than a missing primitive.
//!
//! These never reach the fallback path. Reads degrade to "no account",
//! reservation errors surface as `ReservationFailed`, and a settlement that
//! fails after billed work has run is logged but does not withhold the output.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use credit_ledger::{
    config::OverrunPolicy,
    models::credits::{AccountBalance, BalanceUpdate},
    routes::create_router,
    services::{
        store::{AccountStore, MemoryAccountStore, ReserveOutcome, StoreResult},
        BillingService, CreditsService, Metered, ReservationRecovery,
    },
    AppState, CreditError, StoreError,
};
use sea_orm::DbErr;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use super::test_config;

/// Memory store whose operations can be switched to fail with a database error.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryAccountStore,
    fail_read: AtomicBool,
    fail_reserve: AtomicBool,
    fail_finalize: AtomicBool,
    fail_release: AtomicBool,
    unconditional_writes: AtomicUsize,
}

impl FaultyStore {
    fn with_account(total: i64, reserved: i64) -> (Arc<Self>, Uuid) {
        let store = Arc::new(Self::default());
        let user_id = Uuid::new_v4();
        store.inner.insert_account(user_id, total, reserved);
        (store, user_id)
    }

    fn check(flag: &AtomicBool, operation: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Database(DbErr::Custom(format!(
                "{}: connection reset by peer",
                operation
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FaultyStore {
    async fn read_account(&self, user_id: Uuid) -> StoreResult<Option<AccountBalance>> {
        Self::check(&self.fail_read, "read_account")?;
        self.inner.read_account(user_id).await
    }

    async fn atomic_reserve(&self, user_id: Uuid, amount: i64) -> StoreResult<ReserveOutcome> {
        Self::check(&self.fail_reserve, "reserve_credits")?;
        self.inner.atomic_reserve(user_id, amount).await
    }

    async fn atomic_finalize(
        &self,
        user_id: Uuid,
        reserved_amount: i64,
        actual_amount: i64,
    ) -> StoreResult<()> {
        Self::check(&self.fail_finalize, "finalize_credit_usage")?;
        self.inner
            .atomic_finalize(user_id, reserved_amount, actual_amount)
            .await
    }

    async fn atomic_release(&self, user_id: Uuid, amount: i64) -> StoreResult<()> {
        Self::check(&self.fail_release, "release_reserved_credits")?;
        self.inner.atomic_release(user_id, amount).await
    }

    async fn unconditional_update(&self, user_id: Uuid, update: BalanceUpdate) -> StoreResult<()> {
        self.unconditional_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.unconditional_update(user_id, update).await
    }
}

fn services(store: Arc<FaultyStore>) -> (Arc<CreditsService>, Arc<ReservationRecovery>) {
    let config = test_config(OverrunPolicy::default());
    let credits = Arc::new(CreditsService::new(store, &config.ledger));
    let recovery = Arc::new(ReservationRecovery::new(credits.clone(), &config.ledger));
    (credits, recovery)
}

#[tokio::test]
async fn test_reserve_store_error_skips_fallback() {
    let (store, user_id) = FaultyStore::with_account(100, 0);
    store.fail_reserve.store(true, Ordering::SeqCst);
    let (credits, _) = services(store.clone());

    let err = credits.reserve(user_id, 30, 1).await.unwrap_err();
    assert!(matches!(err, CreditError::ReservationFailed(_)));

    assert_eq!(store.unconditional_writes.load(Ordering::SeqCst), 0);
    assert_eq!(
        store.inner.balance(user_id),
        Some(AccountBalance::new(100, 0))
    );
}

#[tokio::test]
async fn test_read_error_is_reported_as_missing_account() {
    let (store, user_id) = FaultyStore::with_account(100, 0);
    store.fail_read.store(true, Ordering::SeqCst);
    let (credits, _) = services(store.clone());

    assert!(credits.get_info(user_id).await.is_none());
    assert!(matches!(
        credits.try_get_info(user_id).await,
        Err(StoreError::Database(_))
    ));

    let err = credits.reserve(user_id, 30, 1).await.unwrap_err();
    assert!(matches!(err, CreditError::AccountNotFound));
    assert_eq!(
        store.inner.balance(user_id),
        Some(AccountBalance::new(100, 0))
    );
}

#[tokio::test]
async fn test_failed_stale_release_returns_original_error() {
    let (store, user_id) = FaultyStore::with_account(100, 100);
    store.fail_release.store(true, Ordering::SeqCst);
    let (_, recovery) = services(store.clone());

    let err = recovery.get_reservation(user_id, 10).await.unwrap_err();
    assert!(matches!(
        err,
        CreditError::InsufficientCredits {
            required: 1,
            available: 0
        }
    ));
    assert_eq!(
        store.inner.balance(user_id),
        Some(AccountBalance::new(100, 100))
    );
}

#[tokio::test]
async fn test_failed_settlement_still_returns_output() {
    let (store, user_id) = FaultyStore::with_account(100, 0);
    store.fail_finalize.store(true, Ordering::SeqCst);
    let (_, recovery) = services(store.clone());
    let billing = BillingService::new(recovery);

    let outcome = billing
        .run_billed(user_id, 30, |budget| async move {
            Ok(Metered {
                output: format!("answer within {}", budget),
                actual_cost: 12,
            })
        })
        .await
        .unwrap();

    assert_eq!(outcome.output, "answer within 30");
    assert_eq!(outcome.charged, 12);
    assert!(!outcome.settled);

    // Left for reconciliation rather than silently released
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(
        store.inner.balance(user_id),
        Some(AccountBalance::new(100, 30))
    );
}

#[tokio::test]
async fn test_info_route_reports_store_outage() {
    let (store, user_id) = FaultyStore::with_account(100, 0);
    store.fail_read.store(true, Ordering::SeqCst);
    let app = create_router(AppState::with_store(
        store,
        test_config(OverrunPolicy::default()),
    ));

    let request = Request::builder()
        .uri(format!("/api/v1/accounts/{}/credits", user_id))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
}
