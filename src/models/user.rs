use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    Seller,
    DeliveryAgent,
    Admin,
}

impl Role {
    /// Roles that hold an `AccountBalance`.
    pub fn is_financial(self) -> bool {
        matches!(self, Role::Seller | Role::DeliveryAgent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
