//! Groups waiting GROUPAGE deliveries of one area into capacity-bounded batches.

use std::time::Instant;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::engine::observe;
use crate::error::AppError;
use crate::geo::{haversine_km, nearest_neighbor_order};
use crate::models::batch::{Batch, BatchStatus, BatchView, RouteStep};
use crate::models::delivery::{Delivery, DeliveryStatus, DeliveryType};
use crate::models::event::DispatchEvent;
use crate::models::geo::GeoPoint;
use crate::state::AppState;
use crate::store::Tx;

/// Parameters of one formation run.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub area_name: String,
    pub max_orders: u32,
    pub delivery_fee: Decimal,
    pub average_speed_kmh: f64,
}

/// Returns `None` when no delivery in the area is eligible.
pub async fn form_batch(
    state: &AppState,
    area_name: &str,
    max_orders: Option<u32>,
) -> Result<Option<BatchView>, AppError> {
    let started = Instant::now();
    let result = form(state, area_name, max_orders).await;
    observe(state, "form_batch", started, &result);
    result
}

async fn form(
    state: &AppState,
    area_name: &str,
    max_orders: Option<u32>,
) -> Result<Option<BatchView>, AppError> {
    let dispatch = &state.config.dispatch;
    let max_orders = max_orders.unwrap_or(dispatch.default_batch_capacity);
    if max_orders == 0 {
        return Err(AppError::Validation("max_orders must be >= 1".to_string()));
    }
    if area_name.trim().is_empty() {
        return Err(AppError::Validation("area name cannot be empty".to_string()));
    }

    let plan = BatchPlan {
        area_name: area_name.to_string(),
        max_orders,
        delivery_fee: dispatch.delivery_fee_for(area_name),
        average_speed_kmh: dispatch.average_speed_kmh,
    };

    let mut tx = state.store.begin().await?;
    let Some(view) = form_batch_in(&mut tx, &plan)? else {
        info!(area = %area_name, "no eligible deliveries; no batch formed");
        return Ok(None);
    };
    tx.commit()?;

    let delivery_ids: Vec<Uuid> = view.deliveries.iter().map(|d| d.id).collect();
    state.metrics.batches_formed_total.inc();
    state
        .metrics
        .deliveries_batched_total
        .inc_by(delivery_ids.len() as u64);

    info!(
        batch_id = %view.batch.id,
        area = %area_name,
        deliveries = delivery_ids.len(),
        total_distance_meters = view.batch.total_distance_meters.unwrap_or_default(),
        "batch formed"
    );
    state.publish(DispatchEvent::BatchFormed {
        batch_id: view.batch.id,
        area_name: view.batch.area_name.clone(),
        delivery_ids,
        at: view.batch.created_at,
    });

    Ok(Some(view))
}

/// Eligible: WAITING_FOR_BATCH, unbatched, GROUPAGE, dropping off in the
/// area. Oldest first, ties broken by id.
pub fn eligible_in(tx: &Tx<'_>, area_name: &str) -> Vec<Delivery> {
    let mut eligible: Vec<Delivery> = tx
        .deliveries
        .scan(|d| {
            d.status == DeliveryStatus::WaitingForBatch
                && d.batch_id.is_none()
                && d.delivery_type == DeliveryType::Groupage
        })
        .into_iter()
        .filter(|d| {
            tx.locations
                .get(&d.delivery_location_id)
                .is_some_and(|loc| loc.area == area_name)
        })
        .collect();

    eligible.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    eligible
}

pub fn form_batch_in(tx: &mut Tx<'_>, plan: &BatchPlan) -> Result<Option<BatchView>, AppError> {
    let selected: Vec<Delivery> = eligible_in(tx, &plan.area_name)
        .into_iter()
        .take(plan.max_orders as usize)
        .collect();
    if selected.is_empty() {
        return Ok(None);
    }

    let now = Utc::now();
    let mut batch = Batch {
        id: Uuid::new_v4(),
        area_name: plan.area_name.clone(),
        status: BatchStatus::Created,
        delivery_agent_id: None,
        max_orders: plan.max_orders,
        delivery_fee: plan.delivery_fee,
        total_distance_meters: None,
        route: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    tx.batches.put(batch.clone());

    let mut members = Vec::with_capacity(selected.len());
    for delivery in &selected {
        members.push(tx.claim_for_batch(delivery.id, batch.id)?);
    }

    let members = plan_route_in(tx, &mut batch, members, plan.average_speed_kmh)?;
    tx.batches.put(batch.clone());

    Ok(Some(BatchView {
        batch,
        deliveries: members,
    }))
}

/// Orders the members with the nearest-neighbour heuristic, records the tour
/// on the batch and stamps each member with its ETA from the first stop.
/// Returns the members in visiting order.
fn plan_route_in(
    tx: &mut Tx<'_>,
    batch: &mut Batch,
    members: Vec<Delivery>,
    average_speed_kmh: f64,
) -> Result<Vec<Delivery>, AppError> {
    let mut points: Vec<GeoPoint> = Vec::with_capacity(members.len());
    for delivery in &members {
        let location = tx.locations.get(&delivery.delivery_location_id).ok_or_else(|| {
            AppError::Persistence(format!(
                "delivery {} references missing location {}",
                delivery.id, delivery.delivery_location_id
            ))
        })?;
        points.push(location.point());
    }

    let now = Utc::now();
    let mut route = Vec::with_capacity(members.len());
    let mut ordered = Vec::with_capacity(members.len());
    let mut cumulative_km = 0.0;
    let mut previous: Option<GeoPoint> = None;

    for (sequence, idx) in nearest_neighbor_order(&points).into_iter().enumerate() {
        let leg_km = previous.map_or(0.0, |prev| haversine_km(&prev, &points[idx]));
        cumulative_km += leg_km;
        previous = Some(points[idx]);

        let mut delivery = members[idx].clone();
        let eta_minutes = (cumulative_km / average_speed_kmh * 60.0).ceil() as u32;
        delivery.eta_minutes = Some(eta_minutes);
        delivery.estimated_delivery_time = Some(now + Duration::minutes(i64::from(eta_minutes)));
        tx.deliveries.put(delivery.clone());

        route.push(RouteStep {
            sequence: sequence as u32,
            delivery_id: delivery.id,
            distance_meters: leg_km * 1000.0,
        });
        ordered.push(delivery);
    }

    batch.total_distance_meters = Some(cumulative_km * 1000.0);
    batch.route = route;
    Ok(ordered)
}

/// Created batches still waiting for an agent.
pub fn list_available_batches(state: &AppState) -> Vec<Batch> {
    let mut batches = state
        .store
        .snapshot()
        .batches
        .scan(|b| b.status == BatchStatus::Created && b.delivery_agent_id.is_none());
    batches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    batches
}

/// Batch and members read from one snapshot.
pub fn get_batch(state: &AppState, batch_id: Uuid) -> Result<BatchView, AppError> {
    let snapshot = state.store.snapshot();
    let batch = snapshot
        .batches
        .get(&batch_id)
        .ok_or(AppError::BatchNotFound(batch_id))?;
    let deliveries = snapshot.deliveries.scan(|d| d.batch_id == Some(batch_id));
    Ok(view_of(batch, deliveries))
}

pub(crate) fn load_view_in(tx: &Tx<'_>, batch_id: Uuid) -> Result<BatchView, AppError> {
    let batch = tx
        .batches
        .get(&batch_id)
        .ok_or(AppError::BatchNotFound(batch_id))?;
    let deliveries = tx.deliveries.scan(|d| d.batch_id == Some(batch_id));
    Ok(view_of(batch, deliveries))
}

/// Members in route order.
fn view_of(batch: Batch, mut deliveries: Vec<Delivery>) -> BatchView {
    let position = |id: Uuid| {
        batch
            .route
            .iter()
            .position(|step| step.delivery_id == id)
            .unwrap_or(usize::MAX)
    };
    deliveries.sort_by_key(|d| position(d.id));

    BatchView { batch, deliveries }
}

pub fn get_route(state: &AppState, batch_id: Uuid) -> Result<Vec<RouteStep>, AppError> {
    state
        .store
        .snapshot()
        .batches
        .get(&batch_id)
        .map(|batch| batch.route)
        .ok_or(AppError::BatchNotFound(batch_id))
}
