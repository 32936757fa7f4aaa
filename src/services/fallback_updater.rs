use std::sync::Arc;

use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::credits::{AccountBalance, BalanceUpdate},
    services::store::{AccountStore, StoreResult},
};

/// Non-atomic read-modify-write path for stores without the atomic primitives.
///
/// Each operation reads the account and then writes the recomputed fields
/// unconditionally. Two concurrent callers can interleave between the read and
/// the write, so reservations taken here can push `reserved_credits` past
/// `total_credits`. It is only entered after the store has answered
/// [`StoreError::Unsupported`].
pub struct FallbackUpdater {
    store: Arc<dyn AccountStore>,
}

impl FallbackUpdater {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn reserve(&self, user_id: Uuid, amount: i64) -> StoreResult<()> {
        let current = self.current(user_id).await?;
        warn!(
            "Atomic reservation unavailable, applying non-atomic reserve: user={}, amount={}",
            user_id, amount
        );

        self.store
            .unconditional_update(
                user_id,
                BalanceUpdate {
                    total_credits: None,
                    reserved_credits: Some(current.reserved_credits + amount),
                },
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn finalize(
        &self,
        user_id: Uuid,
        reserved_amount: i64,
        actual_amount: i64,
    ) -> StoreResult<()> {
        let current = self.current(user_id).await?;
        warn!(
            "Atomic finalize unavailable, applying non-atomic finalize: user={}, reserved={}, actual={}",
            user_id, reserved_amount, actual_amount
        );

        self.store
            .unconditional_update(
                user_id,
                BalanceUpdate {
                    total_credits: Some((current.total_credits - actual_amount).max(0)),
                    reserved_credits: Some((current.reserved_credits - reserved_amount).max(0)),
                },
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn release(&self, user_id: Uuid, amount: i64) -> StoreResult<()> {
        let current = self.current(user_id).await?;
        warn!(
            "Atomic release unavailable, applying non-atomic release: user={}, amount={}",
            user_id, amount
        );

        self.store
            .unconditional_update(
                user_id,
                BalanceUpdate {
                    total_credits: None,
                    reserved_credits: Some((current.reserved_credits - amount).max(0)),
                },
            )
            .await
    }

    async fn current(&self, user_id: Uuid) -> StoreResult<AccountBalance> {
        self.store
            .read_account(user_id)
            .await?
            .ok_or(StoreError::AccountMissing(user_id))
    }
}
