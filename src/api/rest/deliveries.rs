use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::assignment;
use crate::engine::lifecycle::{self, OtpVerification};
use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus, DeliveryView, NewDelivery};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(list_deliveries))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/status", patch(update_status))
        .route("/deliveries/:id/verify-otp", post(verify_otp))
        .route("/deliveries/:id/assign/:agent_id", patch(assign_direct))
}

#[derive(Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewDelivery>,
) -> Result<(StatusCode, Json<DeliveryView>), AppError> {
    let delivery = lifecycle::create_delivery(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> Json<Vec<Delivery>> {
    Json(lifecycle::list_deliveries(&state, page.skip, page.limit))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryView>, AppError> {
    lifecycle::get_delivery(&state, id).map(Json)
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Delivery>, AppError> {
    lifecycle::update_status(&state, id, payload.status)
        .await
        .map(Json)
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<OtpVerification>, AppError> {
    lifecycle::verify_otp(&state, id, &payload.otp)
        .await
        .map(Json)
}

async fn assign_direct(
    State(state): State<Arc<AppState>>,
    Path((id, agent_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Delivery>, AppError> {
    assignment::assign_direct(&state, id, agent_id)
        .await
        .map(Json)
}
