use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::observe;
use crate::error::AppError;
use crate::models::ledger::AccountBalance;
use crate::models::user::{Role, User};
use crate::state::AppState;
use crate::store::Tx;

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub role: Role,
}

pub async fn register_user(state: &AppState, new_user: NewUser) -> Result<User, AppError> {
    let started = Instant::now();
    let result = register(state, new_user).await;
    observe(state, "register_user", started, &result);
    result
}

async fn register(state: &AppState, new_user: NewUser) -> Result<User, AppError> {
    let mut tx = state.store.begin().await?;
    let user = register_in(&mut tx, new_user)?;
    tx.commit()?;

    info!(user_id = %user.id, role = ?user.role, "user registered");
    Ok(user)
}

/// Creates the user and, for sellers and agents, an empty account balance.
pub fn register_in(tx: &mut Tx<'_>, new_user: NewUser) -> Result<User, AppError> {
    let phone_number = new_user.phone_number.trim().to_string();
    if phone_number.is_empty() {
        return Err(AppError::Validation("phone_number cannot be empty".to_string()));
    }
    if new_user.first_name.trim().is_empty() || new_user.last_name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if tx.users.count(|u| u.phone_number == phone_number) > 0 {
        return Err(AppError::Validation(format!(
            "a user with phone number {phone_number} already exists"
        )));
    }

    let user = User {
        id: Uuid::new_v4(),
        first_name: new_user.first_name,
        last_name: new_user.last_name,
        phone_number,
        email: new_user.email,
        role: new_user.role,
        created_at: Utc::now(),
    };
    tx.users.put(user.clone());

    if user.role.is_financial() {
        tx.balances.put(AccountBalance::open(user.id));
    }

    Ok(user)
}

pub fn get_user(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .store
        .snapshot()
        .users
        .get(&user_id)
        .ok_or(AppError::UserNotFound(user_id))
}

pub(crate) fn require_role(tx: &Tx<'_>, user_id: Uuid, role: Role) -> Result<User, AppError> {
    let user = tx
        .users
        .get(&user_id)
        .ok_or(AppError::UserNotFound(user_id))?;

    if user.role != role {
        return Err(AppError::Validation(format!(
            "user {user_id} is {:?}, expected {role:?}",
            user.role
        )));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::{NewUser, register_user};
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::user::Role;
    use crate::state::AppState;

    fn new_user(phone: &str, role: Role) -> NewUser {
        NewUser {
            first_name: "Awa".to_string(),
            last_name: "Diop".to_string(),
            phone_number: phone.to_string(),
            email: None,
            role,
        }
    }

    #[tokio::test]
    async fn sellers_and_agents_get_an_account() {
        let state = AppState::new(Config::default());

        let seller = register_user(&state, new_user("770000001", Role::Seller))
            .await
            .unwrap();
        let client = register_user(&state, new_user("770000002", Role::Client))
            .await
            .unwrap();

        assert!(state.store.snapshot().balances.get(&seller.id).is_some());
        assert!(state.store.snapshot().balances.get(&client.id).is_none());
    }

    #[tokio::test]
    async fn duplicate_phone_is_rejected() {
        let state = AppState::new(Config::default());
        register_user(&state, new_user("770000001", Role::Seller))
            .await
            .unwrap();

        let err = register_user(&state, new_user("770000001", Role::DeliveryAgent))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(state.store.snapshot().users.len(), 1);
    }
}
