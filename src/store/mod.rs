//! In-process relational store.
//!
//! Committed rows live in one `DashMap` per table. Writers go through a [`Tx`]:
//! opening one takes the store-wide write gate, every write is staged inside
//! the transaction, and nothing becomes visible until [`Tx::commit`] has
//! checked the table constraints. Dropping a `Tx` rolls it back.
//!
//! Readers go through a [`Snapshot`]. Commit applies its tables while holding
//! the visibility lock exclusively, so a snapshot sees every table either
//! before or after a commit, never in between.

mod table;

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{RwLock, RwLockReadGuard};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::batch::Batch;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::geo::GeoLocation;
use crate::models::ledger::{AccountBalance, DebtRecord, Withdrawal};
use crate::models::payment::{Payment, PaymentSplit};
use crate::models::user::User;

pub use table::{Row, Staged, Table};

pub struct Store {
    gate: Mutex<()>,
    visibility: RwLock<()>,
    lock_timeout: Duration,
    users: Table<User>,
    locations: Table<GeoLocation>,
    deliveries: Table<Delivery>,
    batches: Table<Batch>,
    payments: Table<Payment>,
    splits: Table<PaymentSplit>,
    balances: Table<AccountBalance>,
    debts: Table<DebtRecord>,
    withdrawals: Table<Withdrawal>,
}

impl Store {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            gate: Mutex::new(()),
            visibility: RwLock::new(()),
            lock_timeout,
            users: Table::new(),
            locations: Table::new(),
            deliveries: Table::new(),
            batches: Table::new(),
            payments: Table::new(),
            splits: Table::new(),
            balances: Table::new(),
            debts: Table::new(),
            withdrawals: Table::new(),
        }
    }

    /// Opens a serializable transaction scope. Waiting longer than the
    /// configured lock timeout is reported as a retryable conflict.
    pub async fn begin(&self) -> Result<Tx<'_>, AppError> {
        let guard = tokio::time::timeout(self.lock_timeout, self.gate.lock())
            .await
            .map_err(|_| {
                AppError::ConcurrencyConflict(format!(
                    "timed out after {}ms waiting for a transaction slot",
                    self.lock_timeout.as_millis()
                ))
            })?;

        Ok(Tx {
            _guard: guard,
            visibility: &self.visibility,
            users: self.users.stage(),
            locations: self.locations.stage(),
            deliveries: self.deliveries.stage(),
            batches: self.batches.stage(),
            payments: self.payments.stage(),
            splits: self.splits.stage(),
            balances: self.balances.stage(),
            debts: self.debts.stage(),
            withdrawals: self.withdrawals.stage(),
        })
    }

    /// Consistent read view of the committed rows. Blocks only while a commit
    /// is being applied; never hold one across an `.await`.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            _guard: self.visibility.read(),
            users: &self.users,
            locations: &self.locations,
            deliveries: &self.deliveries,
            batches: &self.batches,
            payments: &self.payments,
            splits: &self.splits,
            balances: &self.balances,
            debts: &self.debts,
            withdrawals: &self.withdrawals,
        }
    }
}

pub struct Snapshot<'a> {
    _guard: RwLockReadGuard<'a, ()>,
    pub users: &'a Table<User>,
    pub locations: &'a Table<GeoLocation>,
    pub deliveries: &'a Table<Delivery>,
    pub batches: &'a Table<Batch>,
    pub payments: &'a Table<Payment>,
    pub splits: &'a Table<PaymentSplit>,
    pub balances: &'a Table<AccountBalance>,
    pub debts: &'a Table<DebtRecord>,
    pub withdrawals: &'a Table<Withdrawal>,
}

pub struct Tx<'a> {
    _guard: MutexGuard<'a, ()>,
    visibility: &'a RwLock<()>,
    pub users: Staged<'a, User>,
    pub locations: Staged<'a, GeoLocation>,
    pub deliveries: Staged<'a, Delivery>,
    pub batches: Staged<'a, Batch>,
    pub payments: Staged<'a, Payment>,
    pub splits: Staged<'a, PaymentSplit>,
    pub balances: Staged<'a, AccountBalance>,
    pub debts: Staged<'a, DebtRecord>,
    pub withdrawals: Staged<'a, Withdrawal>,
}

impl Tx<'_> {
    /// Conditional update: binds the delivery to `batch_id` only if it is still
    /// waiting and unbatched as seen inside this transaction.
    pub fn claim_for_batch(&mut self, delivery_id: Uuid, batch_id: Uuid) -> Result<Delivery, AppError> {
        let mut delivery = self
            .deliveries
            .get(&delivery_id)
            .ok_or(AppError::DeliveryNotFound(delivery_id))?;

        if delivery.batch_id.is_some() || delivery.status != DeliveryStatus::WaitingForBatch {
            return Err(AppError::ConcurrencyConflict(format!(
                "delivery {delivery_id} was claimed by another batch"
            )));
        }

        delivery.batch_id = Some(batch_id);
        delivery.status = DeliveryStatus::Batched;
        delivery.updated_at = Utc::now();
        self.deliveries.put(delivery.clone());
        Ok(delivery)
    }

    /// Balance row of a financial user, read inside the transaction.
    pub fn balance(&self, user_id: Uuid) -> Result<AccountBalance, AppError> {
        self.balances
            .get(&user_id)
            .ok_or(AppError::AccountNotFound(user_id))
    }

    pub fn commit(self) -> Result<(), AppError> {
        if let Err(err) = self.check_constraints() {
            warn!(error = %err, "transaction rolled back on constraint violation");
            return Err(err);
        }

        let _visible = self.visibility.write();
        self.users.apply();
        self.locations.apply();
        self.deliveries.apply();
        self.batches.apply();
        self.payments.apply();
        self.splits.apply();
        self.balances.apply();
        self.debts.apply();
        self.withdrawals.apply();
        Ok(())
    }

    fn check_constraints(&self) -> Result<(), AppError> {
        for balance in self.balances.written() {
            if balance.available_balance < Decimal::ZERO || balance.debt_balance < Decimal::ZERO {
                return Err(AppError::Persistence(format!(
                    "check constraint: negative balance for user {}",
                    balance.user_id
                )));
            }
        }

        let mut touched_batches: HashSet<Uuid> = self.batches.written().map(|b| b.id).collect();
        for delivery in self.deliveries.written() {
            if let Some(batch_id) = delivery.batch_id {
                if !delivery.status.allows_batch() {
                    return Err(AppError::Persistence(format!(
                        "check constraint: delivery {} is {} but references batch {batch_id}",
                        delivery.id, delivery.status
                    )));
                }
                touched_batches.insert(batch_id);
            }
        }

        for batch_id in touched_batches {
            let batch = self.batches.get(&batch_id).ok_or_else(|| {
                AppError::Persistence(format!("foreign key: batch {batch_id} does not exist"))
            })?;
            let members = self.deliveries.count(|d| d.batch_id == Some(batch_id));
            if members > batch.max_orders as usize {
                return Err(AppError::Persistence(format!(
                    "check constraint: batch {batch_id} holds {members} deliveries, capacity {}",
                    batch.max_orders
                )));
            }
        }

        for payment in self.payments.written() {
            let split_total: Decimal = self
                .splits
                .scan(|s| s.payment_id == payment.id)
                .iter()
                .map(|s| s.amount)
                .sum();
            if split_total != payment.amount_total {
                return Err(AppError::Persistence(format!(
                    "check constraint: splits of payment {} sum to {split_total}, expected {}",
                    payment.id, payment.amount_total
                )));
            }
        }

        Ok(())
    }
}

impl Row for User {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Row for GeoLocation {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Row for Delivery {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Row for Batch {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Row for Payment {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Row for PaymentSplit {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Row for AccountBalance {
    fn key(&self) -> Uuid {
        self.user_id
    }
}

impl Row for DebtRecord {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Row for Withdrawal {
    fn key(&self) -> Uuid {
        self.id
    }
}
