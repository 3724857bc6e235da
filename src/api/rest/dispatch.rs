use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::engine::{assignment, batching};
use crate::error::AppError;
use crate::models::batch::{Batch, BatchView, RouteStep};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dispatch/auto-batch/:area_name", post(form_batch))
        .route("/dispatch/batches/available", get(list_available_batches))
        .route("/dispatch/batches/:id", get(get_batch))
        .route("/dispatch/batches/:id/route", get(get_route))
        .route("/dispatch/batches/:id/assign/:agent_id", patch(assign_batch))
}

#[derive(Deserialize)]
pub struct FormBatchQuery {
    pub max_orders: Option<u32>,
}

async fn form_batch(
    State(state): State<Arc<AppState>>,
    Path(area_name): Path<String>,
    Query(query): Query<FormBatchQuery>,
) -> Result<Response, AppError> {
    let formed = batching::form_batch(&state, &area_name, query.max_orders).await?;

    Ok(match formed {
        Some(view) => (StatusCode::CREATED, Json(view)).into_response(),
        None => Json(json!({
            "status": "none_formed",
            "message": format!("no deliveries waiting for a batch in {area_name}"),
        }))
        .into_response(),
    })
}

async fn list_available_batches(State(state): State<Arc<AppState>>) -> Json<Vec<Batch>> {
    Json(batching::list_available_batches(&state))
}

async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchView>, AppError> {
    batching::get_batch(&state, id).map(Json)
}

async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RouteStep>>, AppError> {
    batching::get_route(&state, id).map(Json)
}

async fn assign_batch(
    State(state): State<Arc<AppState>>,
    Path((id, agent_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BatchView>, AppError> {
    assignment::assign_batch(&state, id, agent_id)
        .await
        .map(Json)
}
