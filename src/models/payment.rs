use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentActor {
    Client,
    Seller,
    DeliveryAgent,
    Platform,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Wave,
    OrangeMoney,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentPurpose {
    ItemPrice,
    DeliveryFee,
    PlatformCommission,
    Insurance,
}

impl PaymentPurpose {
    pub fn beneficiary_actor(self) -> PaymentActor {
        match self {
            PaymentPurpose::ItemPrice => PaymentActor::Seller,
            PaymentPurpose::DeliveryFee => PaymentActor::DeliveryAgent,
            PaymentPurpose::PlatformCommission | PaymentPurpose::Insurance => {
                PaymentActor::Platform
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub payment_method: PaymentMethod,
    pub amount_total: Decimal,
    pub paid_by: PaymentActor,
    pub received_by: PaymentActor,
    pub collected_by: Option<PaymentActor>,
    pub transaction_reference: Option<String>,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub actor: PaymentActor,
    /// Seller or agent credited by this share; `None` for platform shares.
    pub beneficiary_id: Option<Uuid>,
    pub purpose: PaymentPurpose,
    pub amount: Decimal,
    pub settled: bool,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Percentages applied to a payment, selected by who paid it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionRule {
    pub payer: PaymentActor,
    pub item_price_pct: Decimal,
    pub delivery_fee_pct: Decimal,
    pub platform_commission_pct: Decimal,
    #[serde(default)]
    pub insurance_pct: Decimal,
}

impl CommissionRule {
    pub fn shares(&self) -> [(PaymentPurpose, Decimal); 4] {
        [
            (PaymentPurpose::ItemPrice, self.item_price_pct),
            (PaymentPurpose::DeliveryFee, self.delivery_fee_pct),
            (PaymentPurpose::Insurance, self.insurance_pct),
            (PaymentPurpose::PlatformCommission, self.platform_commission_pct),
        ]
    }
}

/// Payment together with the splits recorded for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    #[serde(flatten)]
    pub payment: Payment,
    pub splits: Vec<PaymentSplit>,
}
