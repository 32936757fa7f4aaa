use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::{LedgerConfig, OverrunPolicy},
    error::{CreditError, StoreError},
    models::credits::CreditsInfo,
    services::{
        fallback_updater::FallbackUpdater,
        store::{AccountStore, ReserveOutcome},
    },
};

/// Reserve / finalize / release over a single per-user balance.
///
/// Every mutation first goes to the store's atomic primitive. Only an explicit
/// [`StoreError::Unsupported`] answer routes the call through the
/// [`FallbackUpdater`]; any other store failure is surfaced as-is.
pub struct CreditsService {
    store: Arc<dyn AccountStore>,
    fallback: FallbackUpdater,
    overrun_policy: OverrunPolicy,
}

impl CreditsService {
    pub fn new(store: Arc<dyn AccountStore>, config: &LedgerConfig) -> Self {
        Self {
            fallback: FallbackUpdater::new(store.clone()),
            store,
            overrun_policy: config.overrun_policy,
        }
    }

    /// Reads the account and keeps "no row" and "store failed" apart.
    #[instrument(skip(self))]
    pub async fn try_get_info(&self, user_id: Uuid) -> Result<Option<CreditsInfo>, StoreError> {
        let account = self.store.read_account(user_id).await?;
        Ok(account.map(|balance| balance.info()))
    }

    /// Credit info for reservation decisions. Store failures are logged and
    /// reported as `None`, the same as a missing account.
    pub async fn get_info(&self, user_id: Uuid) -> Option<CreditsInfo> {
        match self.try_get_info(user_id).await {
            Ok(info) => info,
            Err(e) => {
                error!("Failed to get user credits info: user={}, error={}", user_id, e);
                None
            }
        }
    }

    /// Locks up to `max_amount` of the available balance, failing if less than
    /// `min_amount` can be locked. Returns the amount actually reserved.
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        user_id: Uuid,
        max_amount: i64,
        min_amount: i64,
    ) -> Result<i64, CreditError> {
        // max < min is a shortfall, not a malformed request
        if min_amount < 0 || max_amount < 0 {
            return Err(CreditError::InvalidAmount(format!(
                "amounts must be non-negative, got max_amount={}, min_amount={}",
                max_amount, min_amount
            )));
        }

        let info = self
            .get_info(user_id)
            .await
            .ok_or(CreditError::AccountNotFound)?;

        let amount_to_reserve = max_amount.min(info.available_credits);
        if amount_to_reserve < min_amount {
            return Err(CreditError::InsufficientCredits {
                required: min_amount,
                available: info.available_credits,
            });
        }

        match self.store.atomic_reserve(user_id, amount_to_reserve).await {
            Ok(ReserveOutcome::Reserved) => {}
            Ok(ReserveOutcome::Insufficient) => {
                warn!(
                    "Atomic reservation rejected: user={}, amount={}",
                    user_id, amount_to_reserve
                );
                return Err(CreditError::ReservationFailed(
                    "available credits changed before the reservation committed".to_string(),
                ));
            }
            Err(StoreError::Unsupported(primitive)) => {
                warn!("Primitive {} missing, reserving through fallback", primitive);
                self.fallback
                    .reserve(user_id, amount_to_reserve)
                    .await
                    .map_err(|e| {
                        error!("Fallback reservation failed: user={}, error={}", user_id, e);
                        CreditError::ReservationFailed(e.to_string())
                    })?;
            }
            Err(e) => {
                error!("Failed to reserve credits: user={}, error={}", user_id, e);
                return Err(CreditError::ReservationFailed(e.to_string()));
            }
        }

        info!(
            "Reserved credits: user={}, amount={}, requested_max={}, available_before={}",
            user_id, amount_to_reserve, max_amount, info.available_credits
        );

        Ok(amount_to_reserve)
    }

    /// Settles a reservation against the true cost: `reserved_amount` leaves
    /// the reserved balance and `actual_amount` leaves the total.
    ///
    /// The billed work has already happened when this runs, so a failure is a
    /// reconciliation problem. It is logged here and never retried.
    #[instrument(skip(self))]
    pub async fn finalize(
        &self,
        user_id: Uuid,
        reserved_amount: i64,
        actual_amount: i64,
    ) -> Result<(), CreditError> {
        if reserved_amount < 0 || actual_amount < 0 {
            return Err(CreditError::InvalidAmount(format!(
                "amounts must be non-negative, got reserved_amount={}, actual_amount={}",
                reserved_amount, actual_amount
            )));
        }

        let charge = self.charge_for(user_id, reserved_amount, actual_amount)?;

        let result = match self
            .store
            .atomic_finalize(user_id, reserved_amount, charge)
            .await
        {
            Err(StoreError::Unsupported(primitive)) => {
                warn!("Primitive {} missing, finalizing through fallback", primitive);
                self.fallback
                    .finalize(user_id, reserved_amount, charge)
                    .await
            }
            other => other,
        };

        if let Err(e) = result {
            error!(
                user_id = %user_id,
                reserved_amount,
                actual_amount = charge,
                "Credit finalization failed, account needs reconciliation: {}",
                e
            );
            return Err(CreditError::FinalizationFailed(e.to_string()));
        }

        info!(
            "Finalized credit usage: user={}, reserved={}, charged={}",
            user_id, reserved_amount, charge
        );

        Ok(())
    }

    /// Returns `amount` to availability without charging it. Clamped at zero,
    /// so releasing the same amount twice cannot push the reserved balance negative.
    #[instrument(skip(self))]
    pub async fn release(&self, user_id: Uuid, amount: i64) -> Result<(), CreditError> {
        if amount < 0 {
            return Err(CreditError::InvalidAmount(format!(
                "release amount must be non-negative, got {}",
                amount
            )));
        }

        let result = match self.store.atomic_release(user_id, amount).await {
            Err(StoreError::Unsupported(primitive)) => {
                warn!("Primitive {} missing, releasing through fallback", primitive);
                self.fallback.release(user_id, amount).await
            }
            other => other,
        };

        if let Err(e) = result {
            error!(
                user_id = %user_id,
                amount,
                "Failed to release reserved credits: {}",
                e
            );
            return Err(CreditError::ReleaseFailed(e.to_string()));
        }

        info!("Released reserved credits: user={}, amount={}", user_id, amount);

        Ok(())
    }

    fn charge_for(
        &self,
        user_id: Uuid,
        reserved_amount: i64,
        actual_amount: i64,
    ) -> Result<i64, CreditError> {
        if actual_amount <= reserved_amount {
            return Ok(actual_amount);
        }

        match self.overrun_policy {
            OverrunPolicy::Charge => {
                warn!(
                    "Charging beyond reservation: user={}, reserved={}, actual={}",
                    user_id, reserved_amount, actual_amount
                );
                Ok(actual_amount)
            }
            OverrunPolicy::Cap => {
                warn!(
                    "Capping charge at reservation: user={}, reserved={}, actual={}",
                    user_id, reserved_amount, actual_amount
                );
                Ok(reserved_amount)
            }
            OverrunPolicy::Reject => Err(CreditError::ChargeExceedsReservation {
                reserved: reserved_amount,
                actual: actual_amount,
            }),
        }
    }
}
