use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;

/// Published after the transaction that caused it has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    BatchFormed {
        batch_id: Uuid,
        area_name: String,
        delivery_ids: Vec<Uuid>,
        at: DateTime<Utc>,
    },
    BatchAssigned {
        batch_id: Uuid,
        agent_id: Uuid,
        delivery_ids: Vec<Uuid>,
        at: DateTime<Utc>,
    },
    DeliveryStatusChanged {
        delivery_id: Uuid,
        from: DeliveryStatus,
        to: DeliveryStatus,
        at: DateTime<Utc>,
    },
    PaymentCollected {
        payment_id: Uuid,
        delivery_id: Uuid,
        amount_total: Decimal,
        at: DateTime<Utc>,
    },
}

impl DispatchEvent {
    pub fn involves(&self, delivery: Uuid) -> bool {
        match self {
            DispatchEvent::BatchFormed { delivery_ids, .. }
            | DispatchEvent::BatchAssigned { delivery_ids, .. } => delivery_ids.contains(&delivery),
            DispatchEvent::DeliveryStatusChanged { delivery_id, .. }
            | DispatchEvent::PaymentCollected { delivery_id, .. } => *delivery_id == delivery,
        }
    }
}
