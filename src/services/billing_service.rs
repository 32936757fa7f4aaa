use std::{future::Future, sync::Arc};

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, Result},
    services::ReservationRecovery,
};

/// What a billed unit of work reports back: its output and what it really cost.
#[derive(Debug)]
pub struct Metered<T> {
    pub output: T,
    pub actual_cost: i64,
}

#[derive(Debug)]
pub struct BilledOutcome<T> {
    pub output: T,
    pub reserved_amount: i64,
    pub charged: i64,
    /// `false` when finalization failed; the incident has already been logged.
    pub settled: bool,
}

/// Runs variable-cost work against a credit reservation.
///
/// The work only starts once credits are reserved. Its budget is the reserved
/// amount. A successful run is finalized with the reported cost and a failed
/// run releases the reservation. A finalize failure does not withhold the
/// work's output from the caller.
pub struct BillingService {
    recovery: Arc<ReservationRecovery>,
}

impl BillingService {
    pub fn new(recovery: Arc<ReservationRecovery>) -> Self {
        Self { recovery }
    }

    #[instrument(skip(self, work))]
    pub async fn run_billed<T, F, Fut>(
        &self,
        user_id: Uuid,
        base_cost: i64,
        work: F,
    ) -> Result<BilledOutcome<T>>
    where
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = anyhow::Result<Metered<T>>>,
    {
        let reservation = self.recovery.get_reservation(user_id, base_cost).await?;
        let reserved_amount = reservation.amount();

        let metered = match work(reserved_amount).await {
            Ok(metered) => metered,
            Err(e) => {
                warn!(
                    "Billed operation failed, releasing reservation: user={}, reserved={}, error={:?}",
                    user_id, reserved_amount, e
                );
                if let Err(release_err) = reservation.release().await {
                    error!(
                        "Release after failed operation did not complete: user={}, reserved={}, error={}",
                        user_id, reserved_amount, release_err
                    );
                }
                return Err(ApiError::Internal(e));
            }
        };

        let charged = metered.actual_cost;
        let settled = match reservation.finalize(charged).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    user_id = %user_id,
                    reserved_amount,
                    actual_amount = charged,
                    "Reconciliation incident: billed operation completed but credits were not settled: {}",
                    e
                );
                false
            }
        };

        info!(
            "Billed operation completed: user={}, reserved={}, charged={}, settled={}",
            user_id, reserved_amount, charged, settled
        );

        Ok(BilledOutcome {
            output: metered.output,
            reserved_amount,
            charged,
            settled,
        })
    }
}
