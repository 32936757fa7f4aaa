use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::{
        common::{MessageResponse, SuccessResponse},
        credits::{
            CreditsInfoResponse, FinalizeCreditsRequest, RecoverReservationRequest,
            ReleaseCreditsRequest, ReservationData, ReservationResponse, ReserveCreditsRequest,
            SettlementResponse,
        },
    },
};

fn validate(request: &impl Validate) -> Result<()> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))
}

/// GET /api/v1/accounts/{user_id}/credits
#[instrument(skip(state))]
pub async fn get_credits_info(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CreditsInfoResponse>> {
    let info = state
        .credits_service
        .try_get_info(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Credit account {} not found", user_id)))?;

    Ok(Json(SuccessResponse::new(info)))
}

/// POST /api/v1/accounts/{user_id}/reservations
#[instrument(skip(state, request))]
pub async fn reserve_credits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<ReserveCreditsRequest>,
) -> Result<Json<ReservationResponse>> {
    validate(&request)?;

    let reserved_amount = state
        .credits_service
        .reserve(user_id, request.max_amount, request.min_amount)
        .await?;

    Ok(Json(SuccessResponse::new(ReservationData { reserved_amount })))
}

/// POST /api/v1/accounts/{user_id}/reservations/recover
///
/// Reserve with stale-reservation recovery. The client settles the returned
/// amount through the finalize or release endpoint.
#[instrument(skip(state, request))]
pub async fn recover_reservation(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<RecoverReservationRequest>,
) -> Result<Json<ReservationResponse>> {
    validate(&request)?;

    let reservation = state
        .recovery
        .get_reservation(user_id, request.base_cost)
        .await?;

    Ok(Json(SuccessResponse::new(ReservationData {
        reserved_amount: reservation.into_amount(),
    })))
}

/// POST /api/v1/accounts/{user_id}/reservations/finalize
#[instrument(skip(state, request))]
pub async fn finalize_credits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<FinalizeCreditsRequest>,
) -> Result<Json<SettlementResponse>> {
    validate(&request)?;

    state
        .credits_service
        .finalize(user_id, request.reserved_amount, request.actual_amount)
        .await?;

    Ok(Json(SuccessResponse::new(MessageResponse::new(
        "Credit usage finalized",
    ))))
}

/// POST /api/v1/accounts/{user_id}/reservations/release
#[instrument(skip(state, request))]
pub async fn release_credits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<ReleaseCreditsRequest>,
) -> Result<Json<SettlementResponse>> {
    validate(&request)?;

    state
        .credits_service
        .release(user_id, request.amount)
        .await?;

    Ok(Json(SuccessResponse::new(MessageResponse::new(
        "Reserved credits released",
    ))))
}
