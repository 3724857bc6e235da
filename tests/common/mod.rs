#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use yobulma_dispatch::config::Config;
use yobulma_dispatch::engine::lifecycle;
use yobulma_dispatch::engine::users::{self, NewUser};
use yobulma_dispatch::models::delivery::{
    ClientInfo, DeliveryStatus, DeliveryType, DeliveryView, NewDelivery, PackageInfo,
    VolumeCategory,
};
use yobulma_dispatch::models::geo::NewGeoLocation;
use yobulma_dispatch::models::ledger::AccountBalance;
use yobulma_dispatch::models::user::{Role, User};
use yobulma_dispatch::state::AppState;
use yobulma_dispatch::store::Snapshot;

pub fn state() -> Arc<AppState> {
    Arc::new(AppState::new(Config::default()))
}

pub async fn register(state: &AppState, role: Role) -> User {
    users::register_user(
        state,
        NewUser {
            first_name: "Moussa".to_string(),
            last_name: "Ndiaye".to_string(),
            phone_number: format!("77{}", &Uuid::new_v4().simple().to_string()[..7]),
            email: None,
            role,
        },
    )
    .await
    .unwrap()
}

pub fn new_delivery(seller_id: Uuid, area: &str, lng: f64, kind: DeliveryType) -> NewDelivery {
    NewDelivery {
        seller_id,
        client: ClientInfo {
            client_id: None,
            client_name: "Aissatou".to_string(),
            client_phone: "781234567".to_string(),
            preferred_languages: vec!["fr".to_string(), "wo".to_string()],
        },
        package: PackageInfo {
            delivery_type: kind,
            content_nature: "cosmetics".to_string(),
            package_description: "small box".to_string(),
            package_weight_kg: 0.8,
            volume_category: VolumeCategory::Small,
            declared_value_fcfa: Some(15000),
        },
        delivery_location: NewGeoLocation {
            region: "Dakar".to_string(),
            area: area.to_string(),
            address: "Avenue Pompidou".to_string(),
            latitude: 14.6708,
            longitude: lng,
        },
    }
}

/// GROUPAGE delivery already marked ready for grouping.
pub async fn waiting_delivery(state: &AppState, seller_id: Uuid, area: &str, lng: f64) -> DeliveryView {
    let view = lifecycle::create_delivery(state, new_delivery(seller_id, area, lng, DeliveryType::Groupage))
        .await
        .unwrap();
    lifecycle::update_status(state, view.delivery.id, DeliveryStatus::WaitingForBatch)
        .await
        .unwrap();
    view
}

pub async fn set_available(state: &AppState, user_id: Uuid, amount: Decimal) {
    let mut tx = state.store.begin().await.unwrap();
    let mut balance: AccountBalance = tx.balance(user_id).unwrap();
    balance.available_balance = amount;
    balance.updated_at = Utc::now();
    tx.balances.put(balance);
    tx.commit().unwrap();
}

pub async fn set_debt(state: &AppState, user_id: Uuid, amount: Decimal) {
    let mut tx = state.store.begin().await.unwrap();
    let mut balance: AccountBalance = tx.balance(user_id).unwrap();
    balance.debt_balance = amount;
    balance.updated_at = Utc::now();
    tx.balances.put(balance);
    tx.commit().unwrap();
}

pub async fn set_otp(state: &AppState, delivery_id: Uuid, otp: &str) {
    let mut tx = state.store.begin().await.unwrap();
    let mut delivery = tx.deliveries.get(&delivery_id).unwrap();
    delivery.otp = otp.to_string();
    tx.deliveries.put(delivery);
    tx.commit().unwrap();
}

/// Checks the store-wide invariants that must hold after every operation.
pub fn assert_invariants(state: &AppState) {
    assert_consistent(&state.store.snapshot());
}

pub fn assert_consistent(snapshot: &Snapshot<'_>) {
    for delivery in snapshot.deliveries.scan(|_| true) {
        if let Some(batch_id) = delivery.batch_id {
            assert!(
                delivery.status.allows_batch(),
                "delivery {} is {} but has a batch",
                delivery.id,
                delivery.status
            );
            assert!(
                snapshot.batches.get(&batch_id).is_some(),
                "delivery {} points at missing batch {batch_id}",
                delivery.id
            );
        }
    }

    for batch in snapshot.batches.scan(|_| true) {
        let members = snapshot
            .deliveries
            .scan(|d| d.batch_id == Some(batch.id))
            .len();
        assert!(members <= batch.max_orders as usize);
    }

    for balance in snapshot.balances.scan(|_| true) {
        assert!(balance.available_balance >= Decimal::ZERO);
        assert!(balance.debt_balance >= Decimal::ZERO);
    }

    for payment in snapshot.payments.scan(|_| true) {
        let total: Decimal = snapshot
            .splits
            .scan(|s| s.payment_id == payment.id)
            .iter()
            .map(|s| s.amount)
            .sum();
        assert_eq!(total, payment.amount_total, "splits of payment {}", payment.id);
    }
}
