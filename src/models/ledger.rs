use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountBalance {
    pub user_id: Uuid,
    pub available_balance: Decimal,
    pub debt_balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    pub fn open(user_id: Uuid) -> Self {
        Self {
            user_id,
            available_balance: Decimal::ZERO,
            debt_balance: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn credit(&mut self, amount: Decimal) -> Result<(), AppError> {
        self.available_balance = checked_add(self.available_balance, amount, "available balance")?;
        Ok(())
    }

    pub fn add_debt(&mut self, amount: Decimal) -> Result<(), AppError> {
        self.debt_balance = checked_add(self.debt_balance, amount, "debt balance")?;
        Ok(())
    }
}

/// Money addition that reports overflow instead of panicking.
pub fn checked_add(lhs: Decimal, rhs: Decimal, what: &str) -> Result<Decimal, AppError> {
    lhs.checked_add(rhs)
        .ok_or_else(|| AppError::Validation(format!("{what} would overflow")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtRecord {
    pub id: Uuid,
    pub debtor_id: Uuid,
    pub delivery_id: Uuid,
    pub amount: Decimal,
    pub reason: String,
    pub settled: bool,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletProvider {
    Wave,
    #[serde(alias = "OM")]
    OrangeMoney,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Failed,
}

/// Payout request awaiting confirmation from the wallet provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub provider: WalletProvider,
    pub phone_number: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub withdrawal_id: Uuid,
    pub status: WithdrawalStatus,
    pub message: String,
    pub new_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::AccountBalance;
    use crate::error::AppError;

    #[test]
    fn credit_past_the_decimal_range_is_rejected() {
        let mut balance = AccountBalance::open(Uuid::new_v4());
        balance.credit(Decimal::MAX).unwrap();

        let err = balance.credit(dec!(1)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(balance.available_balance, Decimal::MAX);
    }

    #[test]
    fn debt_accumulates() {
        let mut balance = AccountBalance::open(Uuid::new_v4());
        balance.add_debt(dec!(10000)).unwrap();
        balance.add_debt(dec!(2500.50)).unwrap();

        assert_eq!(balance.debt_balance, dec!(12500.50));
        assert!(balance.add_debt(Decimal::MAX).is_err());
    }
}
