use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{config::LedgerConfig, error::CreditError, services::CreditsService};

/// Reservation entry point for billed work.
///
/// A failed reservation is retried once after force-releasing everything the
/// account currently has reserved. Reservations carry no owner or expiry, so
/// an account with nothing reservable is assumed to hold only stale
/// reservations from callers that died before settling. This is only sound
/// while each user has at most one reservation in flight.
pub struct ReservationRecovery {
    credits: Arc<CreditsService>,
    min_reservation: i64,
}

impl ReservationRecovery {
    pub fn new(credits: Arc<CreditsService>, config: &LedgerConfig) -> Self {
        Self {
            credits,
            min_reservation: config.min_reservation,
        }
    }

    /// Reserves up to `base_cost` (at least the configured minimum) for `user_id`.
    #[instrument(skip(self))]
    pub async fn get_reservation(
        &self,
        user_id: Uuid,
        base_cost: i64,
    ) -> Result<CreditReservation, CreditError> {
        let amount = match self
            .credits
            .reserve(user_id, base_cost, self.min_reservation)
            .await
        {
            Ok(amount) => amount,
            Err(err @ CreditError::InvalidAmount(_)) => return Err(err),
            Err(err) => self.retry_after_release(user_id, base_cost, err).await?,
        };

        Ok(CreditReservation::new(self.credits.clone(), user_id, amount))
    }

    async fn retry_after_release(
        &self,
        user_id: Uuid,
        base_cost: i64,
        original: CreditError,
    ) -> Result<i64, CreditError> {
        let reserved = match self.credits.get_info(user_id).await {
            Some(info) if info.reserved_credits > 0 => info.reserved_credits,
            _ => return Err(original),
        };

        warn!(
            "Reservation failed with outstanding reservations, releasing them as stale: user={}, reserved={}, error={}",
            user_id, reserved, original
        );

        if let Err(e) = self.credits.release(user_id, reserved).await {
            warn!(
                "Stale reservation release failed, keeping original error: user={}, error={}",
                user_id, e
            );
            return Err(original);
        }

        let retried = self
            .credits
            .reserve(user_id, base_cost, self.min_reservation)
            .await;

        match &retried {
            Ok(amount) => info!(
                "Recovered reservation after releasing stale credits: user={}, released={}, reserved={}",
                user_id, reserved, amount
            ),
            Err(e) => warn!("Reservation still failing after recovery: user={}, error={}", user_id, e),
        }

        retried
    }
}

/// Credits locked for one unit of billed work.
///
/// Settle it with exactly one of [`finalize`](Self::finalize) or
/// [`release`](Self::release). A reservation dropped unsettled is released
/// in the background on the current Tokio runtime.
#[must_use = "a credit reservation must be finalized or released"]
pub struct CreditReservation {
    credits: Arc<CreditsService>,
    user_id: Uuid,
    amount: i64,
    settled: bool,
}

impl std::fmt::Debug for CreditReservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditReservation")
            .field("user_id", &self.user_id)
            .field("amount", &self.amount)
            .field("settled", &self.settled)
            .finish()
    }
}

impl CreditReservation {
    fn new(credits: Arc<CreditsService>, user_id: Uuid, amount: i64) -> Self {
        Self {
            credits,
            user_id,
            amount,
            settled: false,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Charges `actual_amount` and clears the reservation.
    ///
    /// If the charge is refused before reaching the store (invalid amount,
    /// rejected overrun) the reservation stays open and is released on drop.
    pub async fn finalize(mut self, actual_amount: i64) -> Result<(), CreditError> {
        let result = self
            .credits
            .finalize(self.user_id, self.amount, actual_amount)
            .await;

        if !matches!(
            result,
            Err(CreditError::InvalidAmount(_)) | Err(CreditError::ChargeExceedsReservation { .. })
        ) {
            self.settled = true;
        }

        result
    }

    pub async fn release(mut self) -> Result<(), CreditError> {
        self.settled = true;
        self.credits.release(self.user_id, self.amount).await
    }

    /// Hands settlement over to the caller (e.g. a remote client) and returns the amount.
    pub fn into_amount(mut self) -> i64 {
        self.settled = true;
        self.amount
    }
}

impl Drop for CreditReservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let (user_id, amount) = (self.user_id, self.amount);
        warn!(
            "Credit reservation dropped without settlement, releasing: user={}, amount={}",
            user_id, amount
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let credits = self.credits.clone();
                handle.spawn(async move {
                    if let Err(e) = credits.release(user_id, amount).await {
                        error!(
                            "Background release of dropped reservation failed: user={}, amount={}, error={}",
                            user_id, amount, e
                        );
                    }
                });
            }
            Err(_) => error!(
                "No runtime to release dropped reservation, left stale: user={}, amount={}",
                user_id, amount
            ),
        }
    }
}
