//! Payment collection and purpose-based split of the collected amount.

use std::time::Instant;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::ledger::accrue_debt_in;
use crate::engine::observe;
use crate::error::AppError;
use crate::models::delivery::DeliveryStatus;
use crate::models::event::DispatchEvent;
use crate::models::payment::{
    CommissionRule, Payment, PaymentActor, PaymentMethod, PaymentPurpose, PaymentReceipt,
    PaymentSplit, PaymentStatus,
};
use crate::state::AppState;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    pub delivery_id: Uuid,
    pub payment_method: PaymentMethod,
    pub amount_total: Decimal,
    pub paid_by: PaymentActor,
    pub received_by: PaymentActor,
    pub collected_by: Option<PaymentActor>,
    pub transaction_reference: Option<String>,
}

/// Splits `total` by the rule's percentages at `scale` decimal places.
///
/// Every share except the platform commission is truncated toward zero and
/// the commission takes what is left, so the shares always add up to `total`
/// exactly. Zero shares are omitted. Totals whose shares cannot be computed
/// within the decimal range are rejected.
pub fn compute_splits(
    rule: &CommissionRule,
    total: Decimal,
    scale: u32,
) -> Result<Vec<(PaymentPurpose, Decimal)>, AppError> {
    let mut shares = Vec::with_capacity(4);
    let mut allocated = Decimal::ZERO;

    for (purpose, pct) in rule.shares() {
        if purpose == PaymentPurpose::PlatformCommission {
            continue;
        }
        let amount = total
            .checked_mul(pct)
            .and_then(|scaled| scaled.checked_div(HUNDRED))
            .ok_or_else(|| {
                AppError::Validation(format!("amount_total {total} is too large to split"))
            })?
            .round_dp_with_strategy(scale, RoundingStrategy::ToZero);
        allocated += amount;
        shares.push((purpose, amount));
    }
    shares.push((PaymentPurpose::PlatformCommission, total - allocated));

    shares.retain(|(_, amount)| !amount.is_zero());
    Ok(shares)
}

pub async fn collect_payment(
    state: &AppState,
    new_payment: NewPayment,
) -> Result<PaymentReceipt, AppError> {
    let started = Instant::now();
    let result = collect(state, new_payment).await;
    observe(state, "collect_payment", started, &result);
    result
}

async fn collect(state: &AppState, new_payment: NewPayment) -> Result<PaymentReceipt, AppError> {
    let finance = &state.config.finance;
    let total = new_payment.amount_total;
    if total <= Decimal::ZERO {
        return Err(AppError::Validation("amount_total must be > 0".to_string()));
    }
    if total.normalize().scale() > finance.money_scale {
        return Err(AppError::Validation(format!(
            "amount_total has more than {} decimal places",
            finance.money_scale
        )));
    }
    let rule = finance.commission_rules.for_payer(new_payment.paid_by)?;
    let shares = compute_splits(rule, total, finance.money_scale)?;

    let mut tx = state.store.begin().await?;
    let delivery = tx
        .deliveries
        .get(&new_payment.delivery_id)
        .ok_or(AppError::DeliveryNotFound(new_payment.delivery_id))?;
    if delivery.status == DeliveryStatus::Canceled {
        return Err(AppError::Validation(format!(
            "delivery {} is canceled",
            delivery.id
        )));
    }

    let now = Utc::now();
    let payment = Payment {
        id: Uuid::new_v4(),
        delivery_id: delivery.id,
        payment_method: new_payment.payment_method,
        amount_total: total,
        paid_by: new_payment.paid_by,
        received_by: new_payment.received_by,
        collected_by: new_payment.collected_by,
        transaction_reference: new_payment.transaction_reference,
        status: PaymentStatus::Paid,
        paid_at: Some(now),
        created_at: now,
    };
    tx.payments.put(payment.clone());

    let mut splits = Vec::new();
    for (purpose, amount) in shares {
        let beneficiary_id = match purpose {
            PaymentPurpose::ItemPrice => Some(delivery.seller_id),
            PaymentPurpose::DeliveryFee => delivery.delivery_agent_id,
            PaymentPurpose::PlatformCommission | PaymentPurpose::Insurance => None,
        };
        // The seller's share is earned the moment the payment is recorded.
        let settled = purpose == PaymentPurpose::ItemPrice;

        let split = PaymentSplit {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            actor: purpose.beneficiary_actor(),
            beneficiary_id,
            purpose,
            amount,
            settled,
            settled_at: settled.then_some(now),
        };
        tx.splits.put(split.clone());
        splits.push(split);

        if purpose == PaymentPurpose::ItemPrice {
            let mut balance = tx.balance(delivery.seller_id)?;
            balance.credit(amount)?;
            balance.updated_at = now;
            tx.balances.put(balance);
        }
    }

    let debt = match delivery.delivery_agent_id {
        Some(agent_id) => Some(accrue_debt_in(&mut tx, agent_id, delivery.id, total)?),
        None => None,
    };
    tx.commit()?;

    if let Some(debt) = &debt {
        state
            .metrics
            .outstanding_debt
            .add(debt.amount.to_f64().unwrap_or_default());
    }
    info!(
        payment_id = %payment.id,
        delivery_id = %delivery.id,
        amount_total = %total,
        splits = splits.len(),
        agent_debt = debt.is_some(),
        "payment collected"
    );
    state.publish(DispatchEvent::PaymentCollected {
        payment_id: payment.id,
        delivery_id: delivery.id,
        amount_total: total,
        at: now,
    });

    Ok(PaymentReceipt { payment, splits })
}

/// Marks a delivery-fee, commission or insurance share as reconciled. A
/// delivery-fee share is credited to its agent; one collected before any agent
/// was assigned is rejected and left for OTP confirmation to pay out.
pub async fn settle_split(state: &AppState, split_id: Uuid) -> Result<PaymentSplit, AppError> {
    let started = Instant::now();
    let result = settle(state, split_id).await;
    observe(state, "settle_split", started, &result);
    result
}

async fn settle(state: &AppState, split_id: Uuid) -> Result<PaymentSplit, AppError> {
    let mut tx = state.store.begin().await?;
    let mut split = tx
        .splits
        .get(&split_id)
        .ok_or(AppError::SplitNotFound(split_id))?;
    if split.settled {
        return Err(AppError::AlreadySettled(format!("payment split {split_id}")));
    }

    let now = Utc::now();
    if split.purpose == PaymentPurpose::DeliveryFee {
        // Unassigned fees wait for OTP confirmation to find their agent.
        let agent_id = split.beneficiary_id.ok_or_else(|| {
            AppError::Validation(format!(
                "delivery fee split {split_id} has no agent; it is paid out on delivery confirmation"
            ))
        })?;
        let mut balance = tx.balance(agent_id)?;
        balance.credit(split.amount)?;
        balance.updated_at = now;
        tx.balances.put(balance);
    }

    split.settled = true;
    split.settled_at = Some(now);
    tx.splits.put(split.clone());
    tx.commit()?;

    info!(
        split_id = %split_id,
        purpose = ?split.purpose,
        amount = %split.amount,
        "payment split settled"
    );
    Ok(split)
}

pub fn list_splits(state: &AppState, payment_id: Uuid) -> Result<Vec<PaymentSplit>, AppError> {
    let snapshot = state.store.snapshot();
    if snapshot.payments.get(&payment_id).is_none() {
        return Err(AppError::PaymentNotFound(payment_id));
    }
    Ok(snapshot.splits.scan(|s| s.payment_id == payment_id))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::compute_splits;
    use crate::error::AppError;
    use crate::models::payment::{CommissionRule, PaymentActor, PaymentPurpose};

    fn rule(item: Decimal, fee: Decimal, commission: Decimal, insurance: Decimal) -> CommissionRule {
        CommissionRule {
            payer: PaymentActor::Client,
            item_price_pct: item,
            delivery_fee_pct: fee,
            platform_commission_pct: commission,
            insurance_pct: insurance,
        }
    }

    fn amount_of(splits: &[(PaymentPurpose, Decimal)], purpose: PaymentPurpose) -> Option<Decimal> {
        splits.iter().find(|(p, _)| *p == purpose).map(|(_, a)| *a)
    }

    #[test]
    fn default_rule_splits_ten_thousand() {
        let splits =
            compute_splits(&rule(dec!(85), dec!(10), dec!(5), dec!(0)), dec!(10000), 2).unwrap();

        assert_eq!(amount_of(&splits, PaymentPurpose::ItemPrice), Some(dec!(8500)));
        assert_eq!(amount_of(&splits, PaymentPurpose::DeliveryFee), Some(dec!(1000)));
        assert_eq!(
            amount_of(&splits, PaymentPurpose::PlatformCommission),
            Some(dec!(500))
        );
        assert_eq!(amount_of(&splits, PaymentPurpose::Insurance), None);
    }

    #[test]
    fn rounding_remainder_goes_to_commission() {
        let total = dec!(333.33);
        let splits =
            compute_splits(&rule(dec!(85), dec!(10), dec!(5), dec!(0)), total, 2).unwrap();

        let sum: Decimal = splits.iter().map(|(_, a)| *a).sum();
        assert_eq!(sum, total);
        assert_eq!(amount_of(&splits, PaymentPurpose::ItemPrice), Some(dec!(283.33)));
        assert_eq!(amount_of(&splits, PaymentPurpose::DeliveryFee), Some(dec!(33.33)));
        assert_eq!(
            amount_of(&splits, PaymentPurpose::PlatformCommission),
            Some(dec!(16.67))
        );
    }

    #[test]
    fn whole_currency_scale_still_conserves_total() {
        let total = dec!(1001);
        let splits =
            compute_splits(&rule(dec!(80), dec!(12), dec!(6), dec!(2)), total, 0).unwrap();

        let sum: Decimal = splits.iter().map(|(_, a)| *a).sum();
        assert_eq!(sum, total);
        assert_eq!(amount_of(&splits, PaymentPurpose::Insurance), Some(dec!(20)));
    }

    #[test]
    fn totals_beyond_the_decimal_range_are_rejected() {
        let result = compute_splits(
            &rule(dec!(85), dec!(10), dec!(5), dec!(0)),
            Decimal::MAX,
            2,
        );
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = compute_splits(
            &rule(dec!(85), dec!(10), dec!(5), dec!(0)),
            dec!(70000000000000000000000000000),
            2,
        );
        assert!(result.is_err());
    }
}
