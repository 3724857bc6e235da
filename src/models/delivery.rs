use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::geo::{GeoLocation, NewGeoLocation};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryType {
    Express,
    Groupage,
    Standard,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeCategory {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Created,
    WaitingForBatch,
    Batched,
    AssignedToDeliveryAgent,
    InDelivery,
    Delivered,
    Canceled,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Created => "CREATED",
            DeliveryStatus::WaitingForBatch => "WAITING_FOR_BATCH",
            DeliveryStatus::Batched => "BATCHED",
            DeliveryStatus::AssignedToDeliveryAgent => "ASSIGNED_TO_DELIVERY_AGENT",
            DeliveryStatus::InDelivery => "IN_DELIVERY",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Canceled)
    }

    /// Statuses in which a delivery may still reference a batch.
    pub fn allows_batch(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Batched
                | DeliveryStatus::AssignedToDeliveryAgent
                | DeliveryStatus::InDelivery
                | DeliveryStatus::Delivered
        )
    }

    /// Edges of the lifecycle graph. Who may drive an edge (batching engine,
    /// assignment, OTP check, external caller) is enforced by the engine.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Canceled {
            return true;
        }

        matches!(
            (self, next),
            (Created, WaitingForBatch)
                | (Created, AssignedToDeliveryAgent)
                | (WaitingForBatch, Batched)
                | (WaitingForBatch, AssignedToDeliveryAgent)
                | (Batched, AssignedToDeliveryAgent)
                | (AssignedToDeliveryAgent, InDelivery)
                | (InDelivery, Delivered)
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub client_id: Option<Uuid>,
    pub delivery_agent_id: Option<Uuid>,
    pub client_name: String,
    pub client_phone: String,
    pub preferred_languages: Vec<String>,
    pub delivery_type: DeliveryType,
    pub content_nature: String,
    pub package_description: String,
    pub package_weight_kg: f64,
    pub volume_category: VolumeCategory,
    pub declared_value_fcfa: Option<i64>,
    pub delivery_location_id: Uuid,
    pub otp: String,
    pub tracking_link: String,
    pub status: DeliveryStatus,
    pub batch_id: Option<Uuid>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub eta_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub client_phone: String,
    #[serde(default = "default_languages")]
    pub preferred_languages: Vec<String>,
}

fn default_languages() -> Vec<String> {
    vec!["fr".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub delivery_type: DeliveryType,
    pub content_nature: String,
    pub package_description: String,
    pub package_weight_kg: f64,
    pub volume_category: VolumeCategory,
    pub declared_value_fcfa: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDelivery {
    pub seller_id: Uuid,
    #[serde(flatten)]
    pub client: ClientInfo,
    #[serde(flatten)]
    pub package: PackageInfo,
    pub delivery_location: NewGeoLocation,
}

/// A delivery loaded with its drop-off location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryView {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub delivery_location: GeoLocation,
}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus::*;

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for next in [Created, WaitingForBatch, Batched, InDelivery, Delivered, Canceled] {
            assert!(!Delivered.can_transition_to(next));
            assert!(!Canceled.can_transition_to(next));
        }
    }

    #[test]
    fn cancel_is_reachable_from_every_live_state() {
        for from in [Created, WaitingForBatch, Batched, AssignedToDeliveryAgent, InDelivery] {
            assert!(from.can_transition_to(Canceled));
        }
    }

    #[test]
    fn out_of_order_edges_are_rejected() {
        assert!(!Created.can_transition_to(Batched));
        assert!(!Created.can_transition_to(Delivered));
        assert!(!Batched.can_transition_to(InDelivery));
        assert!(!InDelivery.can_transition_to(Batched));
    }

    #[test]
    fn statuses_serialize_as_named_constants() {
        let raw = serde_json::to_string(&AssignedToDeliveryAgent).unwrap();
        assert_eq!(raw, "\"ASSIGNED_TO_DELIVERY_AGENT\"");
        assert_eq!(AssignedToDeliveryAgent.to_string(), "ASSIGNED_TO_DELIVERY_AGENT");
    }
}
