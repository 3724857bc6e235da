use std::time::Instant;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::batching::load_view_in;
use crate::engine::lifecycle::transition_in;
use crate::engine::observe;
use crate::engine::users::require_role;
use crate::error::AppError;
use crate::models::batch::{BatchStatus, BatchView};
use crate::models::delivery::{Delivery, DeliveryStatus, DeliveryType};
use crate::models::event::DispatchEvent;
use crate::models::user::Role;
use crate::state::AppState;
use crate::store::Tx;

/// Binds a batch and every member delivery to one agent.
pub async fn assign_batch(
    state: &AppState,
    batch_id: Uuid,
    agent_id: Uuid,
) -> Result<BatchView, AppError> {
    let started = Instant::now();
    let result = assign(state, batch_id, agent_id).await;
    observe(state, "assign_batch", started, &result);
    result
}

async fn assign(state: &AppState, batch_id: Uuid, agent_id: Uuid) -> Result<BatchView, AppError> {
    let mut tx = state.store.begin().await?;
    let view = assign_batch_in(&mut tx, batch_id, agent_id)?;
    tx.commit()?;

    let delivery_ids: Vec<Uuid> = view.deliveries.iter().map(|d| d.id).collect();
    info!(
        batch_id = %batch_id,
        agent_id = %agent_id,
        deliveries = delivery_ids.len(),
        "batch assigned"
    );
    state.publish(DispatchEvent::BatchAssigned {
        batch_id,
        agent_id,
        delivery_ids,
        at: view.batch.updated_at,
    });

    Ok(view)
}

/// A batch is assigned once. Any later attempt fails with `AlreadyAssigned`
/// so the agent on record is never silently overwritten.
pub fn assign_batch_in(
    tx: &mut Tx<'_>,
    batch_id: Uuid,
    agent_id: Uuid,
) -> Result<BatchView, AppError> {
    let mut batch = tx
        .batches
        .get(&batch_id)
        .ok_or(AppError::BatchNotFound(batch_id))?;
    require_role(tx, agent_id, Role::DeliveryAgent)?;

    if batch.status != BatchStatus::Created || batch.delivery_agent_id.is_some() {
        return Err(AppError::AlreadyAssigned(batch_id));
    }

    for member in tx.deliveries.scan(|d| d.batch_id == Some(batch_id)) {
        let mut assigned = transition_in(tx, member, DeliveryStatus::AssignedToDeliveryAgent)?;
        assigned.delivery_agent_id = Some(agent_id);
        tx.deliveries.put(assigned);
    }

    batch.delivery_agent_id = Some(agent_id);
    batch.status = BatchStatus::Assigned;
    batch.updated_at = Utc::now();
    tx.batches.put(batch);

    load_view_in(tx, batch_id)
}

/// EXPRESS and STANDARD deliveries skip batching and go straight to an agent.
/// GROUPAGE deliveries are only ever assigned through their batch.
pub async fn assign_direct(
    state: &AppState,
    delivery_id: Uuid,
    agent_id: Uuid,
) -> Result<Delivery, AppError> {
    let started = Instant::now();
    let result = assign_one(state, delivery_id, agent_id).await;
    observe(state, "assign_direct", started, &result);
    result
}

async fn assign_one(
    state: &AppState,
    delivery_id: Uuid,
    agent_id: Uuid,
) -> Result<Delivery, AppError> {
    let mut tx = state.store.begin().await?;
    let delivery = tx
        .deliveries
        .get(&delivery_id)
        .ok_or(AppError::DeliveryNotFound(delivery_id))?;
    require_role(&tx, agent_id, Role::DeliveryAgent)?;

    let from = delivery.status;
    if delivery.delivery_type == DeliveryType::Groupage || delivery.batch_id.is_some() {
        return Err(AppError::InvalidTransition {
            from,
            to: DeliveryStatus::AssignedToDeliveryAgent,
        });
    }

    let mut assigned = transition_in(&mut tx, delivery, DeliveryStatus::AssignedToDeliveryAgent)?;
    assigned.delivery_agent_id = Some(agent_id);
    tx.deliveries.put(assigned.clone());
    tx.commit()?;

    info!(
        delivery_id = %delivery_id,
        agent_id = %agent_id,
        delivery_type = ?assigned.delivery_type,
        "delivery assigned directly"
    );
    state.publish(DispatchEvent::DeliveryStatusChanged {
        delivery_id,
        from,
        to: assigned.status,
        at: assigned.updated_at,
    });

    Ok(assigned)
}
