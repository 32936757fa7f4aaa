//! Account store boundary.
//!
//! The reservation service only talks to persistence through [`AccountStore`].
//! The `atomic_*` methods must each commit as one indivisible step at the
//! store; when a store cannot provide them it answers
//! [`StoreError::Unsupported`] and the service switches to the non-atomic
//! [`FallbackUpdater`](crate::services::FallbackUpdater) for that call.

mod memory;
mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::credits::{AccountBalance, BalanceUpdate},
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Answer of the atomic reservation primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    /// `reserved + amount` would have exceeded `total` at commit time.
    Insufficient,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Point read by primary key. `Ok(None)` when no account row exists.
    async fn read_account(&self, user_id: Uuid) -> StoreResult<Option<AccountBalance>>;

    /// Adds `amount` to `reserved_credits` iff the result stays within `total_credits`.
    async fn atomic_reserve(&self, user_id: Uuid, amount: i64) -> StoreResult<ReserveOutcome>;

    /// Subtracts `reserved_amount` from reserved and `actual_amount` from total, both clamped at zero.
    async fn atomic_finalize(
        &self,
        user_id: Uuid,
        reserved_amount: i64,
        actual_amount: i64,
    ) -> StoreResult<()>;

    /// Subtracts `amount` from `reserved_credits`, clamped at zero.
    async fn atomic_release(&self, user_id: Uuid, amount: i64) -> StoreResult<()>;

    /// Blind overwrite used only by the fallback path.
    async fn unconditional_update(&self, user_id: Uuid, update: BalanceUpdate) -> StoreResult<()>;
}
