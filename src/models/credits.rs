use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::{MessageResponse, SuccessResponse};

/// Snapshot of an account's balance as seen by the credit info reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsInfo {
    pub total_credits: i64,
    pub available_credits: i64,
    pub reserved_credits: i64,
}

/// Raw persisted balance fields of a credit account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountBalance {
    pub total_credits: i64,
    pub reserved_credits: i64,
}

impl AccountBalance {
    pub fn new(total_credits: i64, reserved_credits: i64) -> Self {
        Self {
            total_credits,
            reserved_credits,
        }
    }

    /// Available credits never go below zero, even for an overcommitted account.
    pub fn info(&self) -> CreditsInfo {
        CreditsInfo {
            total_credits: self.total_credits,
            available_credits: (self.total_credits - self.reserved_credits).max(0),
            reserved_credits: self.reserved_credits,
        }
    }
}

impl From<entity::credit_accounts::Model> for AccountBalance {
    fn from(model: entity::credit_accounts::Model) -> Self {
        Self::new(model.total_credits, model.reserved_credits)
    }
}

/// Field overwrite applied by the non-atomic fallback path. `None` leaves a column untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub total_credits: Option<i64>,
    pub reserved_credits: Option<i64>,
}

/// POST /api/v1/accounts/{user_id}/reservations
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReserveCreditsRequest {
    #[validate(range(min = 0))]
    pub max_amount: i64,

    #[validate(range(min = 0))]
    pub min_amount: i64,
}

/// POST /api/v1/accounts/{user_id}/reservations/recover
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecoverReservationRequest {
    #[validate(range(min = 0))]
    pub base_cost: i64,
}

/// POST /api/v1/accounts/{user_id}/reservations/finalize
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeCreditsRequest {
    #[validate(range(min = 0))]
    pub reserved_amount: i64,

    #[validate(range(min = 0))]
    pub actual_amount: i64,
}

/// POST /api/v1/accounts/{user_id}/reservations/release
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseCreditsRequest {
    #[validate(range(min = 0))]
    pub amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationData {
    pub reserved_amount: i64,
}

pub type CreditsInfoResponse = SuccessResponse<CreditsInfo>;
pub type ReservationResponse = SuccessResponse<ReservationData>;
pub type SettlementResponse = SuccessResponse<MessageResponse>;
