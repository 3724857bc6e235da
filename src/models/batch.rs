use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::Delivery;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Created,
    Assigned,
    InProgress,
    Completed,
    Canceled,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Canceled)
    }
}

/// One stop of a batch tour. `distance_meters` is the leg from the previous stop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteStep {
    pub sequence: u32,
    pub delivery_id: Uuid,
    pub distance_meters: f64,
}

/// Members are not stored on the batch; they are the deliveries whose
/// `batch_id` points here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub area_name: String,
    pub status: BatchStatus,
    pub delivery_agent_id: Option<Uuid>,
    pub max_orders: u32,
    pub delivery_fee: Decimal,
    pub total_distance_meters: Option<f64>,
    pub route: Vec<RouteStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A batch loaded together with its member deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    pub deliveries: Vec<Delivery>,
}
