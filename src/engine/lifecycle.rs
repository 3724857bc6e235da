//! Delivery state machine and OTP-based completion.

use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use rand::rngs::OsRng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::observe;
use crate::engine::users::require_role;
use crate::error::AppError;
use crate::models::batch::BatchStatus;
use crate::models::delivery::{Delivery, DeliveryStatus, DeliveryView, NewDelivery};
use crate::models::event::DispatchEvent;
use crate::models::ledger::checked_add;
use crate::models::payment::{PaymentPurpose, PaymentStatus};
use crate::models::user::Role;
use crate::state::AppState;
use crate::store::Tx;

const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct OtpVerification {
    pub delivery_id: Uuid,
    pub status: DeliveryStatus,
    /// Delivery-fee shares credited to the agent by this confirmation.
    pub settled_delivery_fees: Decimal,
}

pub async fn create_delivery(
    state: &AppState,
    new_delivery: NewDelivery,
) -> Result<DeliveryView, AppError> {
    let started = Instant::now();
    let result = create(state, new_delivery).await;
    observe(state, "create_delivery", started, &result);
    result
}

async fn create(state: &AppState, new_delivery: NewDelivery) -> Result<DeliveryView, AppError> {
    validate_new_delivery(&new_delivery)?;

    let mut tx = state.store.begin().await?;
    require_role(&tx, new_delivery.seller_id, Role::Seller)?;

    let location = new_delivery.delivery_location.into_location();
    tx.locations.put(location.clone());

    let now = Utc::now();
    let client = new_delivery.client;
    let package = new_delivery.package;
    let delivery = Delivery {
        id: Uuid::new_v4(),
        seller_id: new_delivery.seller_id,
        client_id: client.client_id,
        delivery_agent_id: None,
        client_name: client.client_name,
        client_phone: client.client_phone,
        preferred_languages: client.preferred_languages,
        delivery_type: package.delivery_type,
        content_nature: package.content_nature,
        package_description: package.package_description,
        package_weight_kg: package.package_weight_kg,
        volume_category: package.volume_category,
        declared_value_fcfa: package.declared_value_fcfa,
        delivery_location_id: location.id,
        otp: generate_otp(),
        tracking_link: tracking_link(&state.config.dispatch.tracking_base_url),
        status: DeliveryStatus::Created,
        batch_id: None,
        estimated_delivery_time: None,
        eta_minutes: None,
        created_at: now,
        updated_at: now,
    };
    tx.deliveries.put(delivery.clone());
    tx.commit()?;

    info!(
        delivery_id = %delivery.id,
        seller_id = %delivery.seller_id,
        area = %location.area,
        delivery_type = ?delivery.delivery_type,
        "delivery created"
    );

    Ok(DeliveryView {
        delivery,
        delivery_location: location,
    })
}

fn validate_new_delivery(new_delivery: &NewDelivery) -> Result<(), AppError> {
    if new_delivery.client.client_name.trim().is_empty() {
        return Err(AppError::Validation("client_name cannot be empty".to_string()));
    }
    if new_delivery.client.client_phone.trim().is_empty() {
        return Err(AppError::Validation("client_phone cannot be empty".to_string()));
    }
    let weight = new_delivery.package.package_weight_kg;
    if !weight.is_finite() || weight <= 0.0 {
        return Err(AppError::Validation(
            "package_weight_kg must be > 0".to_string(),
        ));
    }
    new_delivery.delivery_location.validate()
}

/// Zero-padded six digit code drawn from the OS RNG.
pub fn generate_otp() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

fn tracking_link(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), Uuid::new_v4())
}

pub fn get_delivery(state: &AppState, delivery_id: Uuid) -> Result<DeliveryView, AppError> {
    let snapshot = state.store.snapshot();
    let delivery = snapshot
        .deliveries
        .get(&delivery_id)
        .ok_or(AppError::DeliveryNotFound(delivery_id))?;
    let delivery_location = snapshot
        .locations
        .get(&delivery.delivery_location_id)
        .ok_or_else(|| {
            AppError::Persistence(format!(
                "delivery {delivery_id} references missing location {}",
                delivery.delivery_location_id
            ))
        })?;

    Ok(DeliveryView {
        delivery,
        delivery_location,
    })
}

/// Newest first.
pub fn list_deliveries(state: &AppState, skip: usize, limit: usize) -> Vec<Delivery> {
    let mut deliveries = state.store.snapshot().deliveries.scan(|_| true);
    deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    deliveries
        .into_iter()
        .skip(skip)
        .take(limit.min(MAX_PAGE_SIZE))
        .collect()
}

/// Transitions a caller may request directly. Batching, assignment and OTP
/// confirmation have their own entry points.
pub async fn update_status(
    state: &AppState,
    delivery_id: Uuid,
    requested: DeliveryStatus,
) -> Result<Delivery, AppError> {
    let started = Instant::now();
    let result = update(state, delivery_id, requested).await;
    observe(state, "update_delivery_status", started, &result);
    result
}

async fn update(
    state: &AppState,
    delivery_id: Uuid,
    requested: DeliveryStatus,
) -> Result<Delivery, AppError> {
    let mut tx = state.store.begin().await?;
    let delivery = tx
        .deliveries
        .get(&delivery_id)
        .ok_or(AppError::DeliveryNotFound(delivery_id))?;
    let from = delivery.status;

    let externally_driven = matches!(
        requested,
        DeliveryStatus::WaitingForBatch | DeliveryStatus::InDelivery | DeliveryStatus::Canceled
    );
    if !externally_driven {
        return Err(AppError::InvalidTransition {
            from,
            to: requested,
        });
    }

    let updated = transition_in(&mut tx, delivery, requested)?;
    tx.commit()?;

    info!(delivery_id = %delivery_id, from = %from, to = %requested, "delivery status changed");
    state.publish(DispatchEvent::DeliveryStatusChanged {
        delivery_id,
        from,
        to: requested,
        at: updated.updated_at,
    });

    Ok(updated)
}

/// Applies one edge of the lifecycle graph and keeps the owning batch in step.
pub fn transition_in(
    tx: &mut Tx<'_>,
    mut delivery: Delivery,
    next: DeliveryStatus,
) -> Result<Delivery, AppError> {
    let from = delivery.status;
    if !from.can_transition_to(next) {
        return Err(AppError::InvalidTransition { from, to: next });
    }

    let batch_id = delivery.batch_id;
    delivery.status = next;
    delivery.updated_at = Utc::now();
    if next == DeliveryStatus::Canceled {
        delivery.batch_id = None;
    }
    tx.deliveries.put(delivery.clone());

    if let Some(batch_id) = batch_id {
        match next {
            DeliveryStatus::InDelivery => start_batch_in(tx, batch_id),
            DeliveryStatus::Delivered | DeliveryStatus::Canceled => resolve_batch_in(tx, batch_id),
            _ => {}
        }
    }

    Ok(delivery)
}

fn start_batch_in(tx: &mut Tx<'_>, batch_id: Uuid) {
    if let Some(mut batch) = tx.batches.get(&batch_id) {
        if batch.status == BatchStatus::Assigned {
            batch.status = BatchStatus::InProgress;
            batch.updated_at = Utc::now();
            tx.batches.put(batch);
        }
    }
}

/// Closes the batch once none of its members is still moving: COMPLETED if
/// anything was delivered, CANCELED if every member dropped out.
fn resolve_batch_in(tx: &mut Tx<'_>, batch_id: Uuid) {
    let Some(mut batch) = tx.batches.get(&batch_id) else {
        return;
    };
    if batch.status.is_terminal() {
        return;
    }

    let members = tx.deliveries.scan(|d| d.batch_id == Some(batch_id));
    if members.iter().any(|d| !d.status.is_terminal()) {
        return;
    }

    batch.status = if members.is_empty() {
        BatchStatus::Canceled
    } else {
        BatchStatus::Completed
    };
    batch.updated_at = Utc::now();
    tx.batches.put(batch);
}

/// Proof of delivery. Succeeds exactly once per delivery.
pub async fn verify_otp(
    state: &AppState,
    delivery_id: Uuid,
    code: &str,
) -> Result<OtpVerification, AppError> {
    let started = Instant::now();
    let result = verify(state, delivery_id, code).await;
    observe(state, "verify_otp", started, &result);
    result
}

async fn verify(
    state: &AppState,
    delivery_id: Uuid,
    code: &str,
) -> Result<OtpVerification, AppError> {
    let mut tx = state.store.begin().await?;
    let delivery = tx
        .deliveries
        .get(&delivery_id)
        .ok_or(AppError::DeliveryNotFound(delivery_id))?;

    if delivery.status == DeliveryStatus::Delivered {
        return Err(AppError::AlreadyDelivered(delivery_id));
    }
    if delivery.otp != code {
        return Err(AppError::InvalidOtp);
    }

    let from = delivery.status;
    let agent_id = delivery.delivery_agent_id;
    let delivered = transition_in(&mut tx, delivery, DeliveryStatus::Delivered)?;
    let settled_delivery_fees = match agent_id {
        Some(agent_id) => settle_delivery_fees_in(&mut tx, delivery_id, agent_id)?,
        None => Decimal::ZERO,
    };
    tx.commit()?;

    info!(
        delivery_id = %delivery_id,
        settled_delivery_fees = %settled_delivery_fees,
        "delivery confirmed by otp"
    );
    state.publish(DispatchEvent::DeliveryStatusChanged {
        delivery_id,
        from,
        to: DeliveryStatus::Delivered,
        at: delivered.updated_at,
    });

    Ok(OtpVerification {
        delivery_id,
        status: delivered.status,
        settled_delivery_fees,
    })
}

/// Credits the agent with every open delivery-fee share of the delivery's
/// paid payments.
fn settle_delivery_fees_in(
    tx: &mut Tx<'_>,
    delivery_id: Uuid,
    agent_id: Uuid,
) -> Result<Decimal, AppError> {
    let payment_ids: Vec<Uuid> = tx
        .payments
        .scan(|p| p.delivery_id == delivery_id && p.status == PaymentStatus::Paid)
        .into_iter()
        .map(|p| p.id)
        .collect();

    let open_fees = tx.splits.scan(|s| {
        payment_ids.contains(&s.payment_id)
            && s.purpose == PaymentPurpose::DeliveryFee
            && !s.settled
    });
    if open_fees.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let now = Utc::now();
    let mut total = Decimal::ZERO;
    for mut split in open_fees {
        total = checked_add(total, split.amount, "delivery fee payout")?;
        split.settled = true;
        split.settled_at = Some(now);
        split.beneficiary_id = Some(agent_id);
        tx.splits.put(split);
    }

    let mut balance = tx.balance(agent_id)?;
    balance.credit(total)?;
    balance.updated_at = now;
    tx.balances.put(balance);

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::generate_otp;

    #[test]
    fn otp_is_six_ascii_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
