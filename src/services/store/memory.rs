use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use uuid::Uuid;

use super::{AccountStore, ReserveOutcome, StoreResult};
use crate::{
    error::StoreError,
    models::credits::{AccountBalance, BalanceUpdate},
};

/// Process-local account store.
///
/// Every `atomic_*` call runs under a single mutex, so it has the same
/// check-and-commit semantics as the database functions. Built with
/// [`MemoryAccountStore::without_atomic_primitives`] it answers
/// [`StoreError::Unsupported`] instead, reproducing a database that is missing
/// the reservation functions.
#[derive(Debug)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, AccountBalance>>,
    atomic: bool,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            atomic: true,
        }
    }

    pub fn without_atomic_primitives() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            atomic: false,
        }
    }

    /// Creates or replaces an account.
    pub fn insert_account(&self, user_id: Uuid, total_credits: i64, reserved_credits: i64) {
        self.accounts()
            .insert(user_id, AccountBalance::new(total_credits, reserved_credits));
    }

    pub fn balance(&self, user_id: Uuid) -> Option<AccountBalance> {
        self.accounts().get(&user_id).copied()
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<Uuid, AccountBalance>> {
        // A panic while holding the lock cannot leave a half-written balance
        self.accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_atomic(&self, primitive: &'static str) -> StoreResult<()> {
        if self.atomic {
            Ok(())
        } else {
            Err(StoreError::Unsupported(primitive))
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn read_account(&self, user_id: Uuid) -> StoreResult<Option<AccountBalance>> {
        Ok(self.balance(user_id))
    }

    async fn atomic_reserve(&self, user_id: Uuid, amount: i64) -> StoreResult<ReserveOutcome> {
        self.require_atomic("reserve_credits")?;

        let mut accounts = self.accounts();
        let account = accounts
            .get_mut(&user_id)
            .ok_or(StoreError::AccountMissing(user_id))?;

        if account.reserved_credits + amount > account.total_credits {
            return Ok(ReserveOutcome::Insufficient);
        }

        account.reserved_credits += amount;
        Ok(ReserveOutcome::Reserved)
    }

    async fn atomic_finalize(
        &self,
        user_id: Uuid,
        reserved_amount: i64,
        actual_amount: i64,
    ) -> StoreResult<()> {
        self.require_atomic("finalize_credit_usage")?;

        let mut accounts = self.accounts();
        let account = accounts
            .get_mut(&user_id)
            .ok_or(StoreError::AccountMissing(user_id))?;

        account.reserved_credits = (account.reserved_credits - reserved_amount).max(0);
        account.total_credits = (account.total_credits - actual_amount).max(0);
        Ok(())
    }

    async fn atomic_release(&self, user_id: Uuid, amount: i64) -> StoreResult<()> {
        self.require_atomic("release_reserved_credits")?;

        let mut accounts = self.accounts();
        let account = accounts
            .get_mut(&user_id)
            .ok_or(StoreError::AccountMissing(user_id))?;

        account.reserved_credits = (account.reserved_credits - amount).max(0);
        Ok(())
    }

    async fn unconditional_update(&self, user_id: Uuid, update: BalanceUpdate) -> StoreResult<()> {
        let mut accounts = self.accounts();
        let account = accounts
            .get_mut(&user_id)
            .ok_or(StoreError::AccountMissing(user_id))?;

        if let Some(total) = update.total_credits {
            account.total_credits = total;
        }
        if let Some(reserved) = update.reserved_credits {
            account.reserved_credits = reserved;
        }
        Ok(())
    }
}
