//! Available balances, agent cash-collection debt and withdrawals.

use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::observe;
use crate::error::AppError;
use crate::models::ledger::{
    AccountBalance, DebtRecord, WalletProvider, Withdrawal, WithdrawalReceipt, WithdrawalStatus,
};
use crate::state::AppState;
use crate::store::Tx;

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub provider: WalletProvider,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtSettlement {
    pub debt: DebtRecord,
    pub balance: AccountBalance,
}

pub fn get_balance(state: &AppState, user_id: Uuid) -> Result<AccountBalance, AppError> {
    state
        .store
        .snapshot()
        .balances
        .get(&user_id)
        .ok_or(AppError::AccountNotFound(user_id))
}

/// Records that `agent_id` holds `amount` of cash collected for `delivery_id`.
pub fn accrue_debt_in(
    tx: &mut Tx<'_>,
    agent_id: Uuid,
    delivery_id: Uuid,
    amount: Decimal,
) -> Result<DebtRecord, AppError> {
    let now = Utc::now();
    let mut balance = tx.balance(agent_id)?;
    balance.add_debt(amount)?;
    balance.updated_at = now;
    tx.balances.put(balance);

    let debt = DebtRecord {
        id: Uuid::new_v4(),
        debtor_id: agent_id,
        delivery_id,
        amount,
        reason: format!("cash collected on delivery {delivery_id}"),
        settled: false,
        settled_at: None,
        created_at: now,
    };
    tx.debts.put(debt.clone());
    Ok(debt)
}

pub async fn request_withdrawal(
    state: &AppState,
    request: WithdrawalRequest,
) -> Result<WithdrawalReceipt, AppError> {
    let started = Instant::now();
    let result = withdraw(state, request).await;
    observe(state, "request_withdrawal", started, &result);
    result
}

async fn withdraw(
    state: &AppState,
    request: WithdrawalRequest,
) -> Result<WithdrawalReceipt, AppError> {
    if request.amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be > 0".to_string()));
    }
    let phone_number = request.phone_number.trim().to_string();
    if phone_number.is_empty() {
        return Err(AppError::Validation("phone_number cannot be empty".to_string()));
    }

    // The balance is read and decremented under the same transaction.
    let mut tx = state.store.begin().await?;
    let mut balance = tx.balance(request.user_id)?;
    if balance.available_balance < request.amount {
        return Err(AppError::InsufficientFunds {
            available: balance.available_balance,
            requested: request.amount,
        });
    }

    let now = Utc::now();
    balance.available_balance -= request.amount;
    balance.updated_at = now;
    tx.balances.put(balance.clone());

    let withdrawal = Withdrawal {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        amount: request.amount,
        provider: request.provider,
        phone_number,
        status: WithdrawalStatus::Pending,
        created_at: now,
    };
    tx.withdrawals.put(withdrawal.clone());
    tx.commit()?;

    info!(
        withdrawal_id = %withdrawal.id,
        user_id = %withdrawal.user_id,
        amount = %withdrawal.amount,
        provider = ?withdrawal.provider,
        "withdrawal requested"
    );

    Ok(WithdrawalReceipt {
        withdrawal_id: withdrawal.id,
        status: withdrawal.status,
        message: format!(
            "withdrawal of {} to {} ({:?}) recorded",
            withdrawal.amount, withdrawal.phone_number, withdrawal.provider
        ),
        new_balance: balance.available_balance,
    })
}

/// Debt records of one user, oldest first.
pub fn list_debts(state: &AppState, user_id: Uuid) -> Result<Vec<DebtRecord>, AppError> {
    let snapshot = state.store.snapshot();
    if snapshot.balances.get(&user_id).is_none() {
        return Err(AppError::AccountNotFound(user_id));
    }
    let mut debts = snapshot.debts.scan(|d| d.debtor_id == user_id);
    debts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(debts)
}

/// Marks a debt record as remitted. A record settles once; the aggregate debt
/// never drops below zero.
pub async fn settle_debt(state: &AppState, debt_id: Uuid) -> Result<DebtSettlement, AppError> {
    let started = Instant::now();
    let result = settle(state, debt_id).await;
    observe(state, "settle_debt", started, &result);
    result
}

async fn settle(state: &AppState, debt_id: Uuid) -> Result<DebtSettlement, AppError> {
    let mut tx = state.store.begin().await?;
    let mut debt = tx
        .debts
        .get(&debt_id)
        .ok_or(AppError::DebtNotFound(debt_id))?;
    if debt.settled {
        return Err(AppError::AlreadySettled(format!("debt record {debt_id}")));
    }

    let now = Utc::now();
    let mut balance = tx.balance(debt.debtor_id)?;
    if balance.debt_balance < debt.amount {
        warn!(
            debt_id = %debt_id,
            debt_balance = %balance.debt_balance,
            amount = %debt.amount,
            "debt record exceeds outstanding balance; clamping to zero"
        );
    }
    let released = debt.amount.min(balance.debt_balance);
    balance.debt_balance -= released;
    balance.updated_at = now;
    tx.balances.put(balance.clone());

    debt.settled = true;
    debt.settled_at = Some(now);
    tx.debts.put(debt.clone());
    tx.commit()?;

    state
        .metrics
        .outstanding_debt
        .sub(released.to_f64().unwrap_or_default());
    info!(
        debt_id = %debt_id,
        debtor_id = %debt.debtor_id,
        amount = %debt.amount,
        "debt settled"
    );

    Ok(DebtSettlement { debt, balance })
}
