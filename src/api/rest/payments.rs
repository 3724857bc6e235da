use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use uuid::Uuid;

use crate::engine::ledger::{self, DebtSettlement, WithdrawalRequest};
use crate::engine::payments::{self, NewPayment};
use crate::error::AppError;
use crate::models::ledger::{AccountBalance, DebtRecord, WithdrawalReceipt};
use crate::models::payment::{PaymentReceipt, PaymentSplit};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments/collect", post(collect_payment))
        .route("/payments/:id/splits", get(list_splits))
        .route("/payments/splits/:id/settle", post(settle_split))
        .route("/payments/balances/:user_id", get(get_balance))
        .route("/payments/withdraw", post(request_withdrawal))
        .route("/payments/debts/:id", get(list_debts))
        .route("/payments/debts/:id/settle", post(settle_debt))
}

async fn collect_payment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewPayment>,
) -> Result<(StatusCode, Json<PaymentReceipt>), AppError> {
    let receipt = payments::collect_payment(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list_splits(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PaymentSplit>>, AppError> {
    payments::list_splits(&state, id).map(Json)
}

async fn settle_split(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentSplit>, AppError> {
    payments::settle_split(&state, id).await.map(Json)
}

async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AccountBalance>, AppError> {
    ledger::get_balance(&state, user_id).map(Json)
}

async fn request_withdrawal(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalReceipt>), AppError> {
    let receipt = ledger::request_withdrawal(&state, payload).await?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

async fn list_debts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<DebtRecord>>, AppError> {
    ledger::list_debts(&state, user_id).map(Json)
}

async fn settle_debt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DebtSettlement>, AppError> {
    ledger::settle_debt(&state, id).await.map(Json)
}
