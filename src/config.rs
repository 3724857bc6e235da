use std::collections::HashMap;
use std::env;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::models::payment::{CommissionRule, PaymentActor};

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub tx_lock_timeout: Duration,
    pub dispatch: DispatchConfig,
    pub finance: FinanceConfig,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub default_batch_capacity: u32,
    pub groupage_base_fee: Decimal,
    pub area_delivery_fees: HashMap<String, Decimal>,
    pub average_speed_kmh: f64,
    pub tracking_base_url: String,
}

#[derive(Debug, Clone)]
pub struct FinanceConfig {
    pub money_scale: u32,
    pub commission_rules: CommissionRules,
}

/// Split percentages keyed by the paying actor.
#[derive(Debug, Clone)]
pub struct CommissionRules {
    rules: HashMap<PaymentActor, CommissionRule>,
}

impl CommissionRules {
    pub fn new(rules: Vec<CommissionRule>) -> Result<Self, AppError> {
        let mut by_payer = Self::defaults().rules;
        for rule in rules {
            validate_rule(&rule)?;
            by_payer.insert(rule.payer, rule);
        }
        Ok(Self { rules: by_payer })
    }

    /// 85 / 10 / 5 for every payer.
    pub fn defaults() -> Self {
        let rules = [
            PaymentActor::Client,
            PaymentActor::Seller,
            PaymentActor::DeliveryAgent,
            PaymentActor::Platform,
        ]
        .into_iter()
        .map(|payer| {
            (
                payer,
                CommissionRule {
                    payer,
                    item_price_pct: dec!(85),
                    delivery_fee_pct: dec!(10),
                    platform_commission_pct: dec!(5),
                    insurance_pct: Decimal::ZERO,
                },
            )
        })
        .collect();

        Self { rules }
    }

    pub fn for_payer(&self, payer: PaymentActor) -> Result<&CommissionRule, AppError> {
        self.rules
            .get(&payer)
            .ok_or_else(|| AppError::Config(format!("no commission rule for payer {payer:?}")))
    }
}

fn validate_rule(rule: &CommissionRule) -> Result<(), AppError> {
    let shares = rule.shares();
    if shares.iter().any(|(_, pct)| pct.is_sign_negative()) {
        return Err(AppError::Config(format!(
            "commission rule for {:?} has a negative share",
            rule.payer
        )));
    }

    let total: Decimal = shares.iter().map(|(_, pct)| *pct).sum();
    if total != dec!(100) {
        return Err(AppError::Config(format!(
            "commission rule for {:?} sums to {total}%, expected 100%",
            rule.payer
        )));
    }
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            tx_lock_timeout: Duration::from_millis(2000),
            dispatch: DispatchConfig {
                default_batch_capacity: 5,
                groupage_base_fee: dec!(2000),
                area_delivery_fees: HashMap::new(),
                average_speed_kmh: 20.0,
                tracking_base_url: "https://yobulma.com/track".to_string(),
            },
            finance: FinanceConfig {
                money_scale: 2,
                commission_rules: CommissionRules::defaults(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let dispatch = DispatchConfig {
            default_batch_capacity: parse_or_default(
                "DEFAULT_BATCH_CAPACITY",
                defaults.dispatch.default_batch_capacity,
            )?,
            groupage_base_fee: parse_or_default(
                "GROUPAGE_BASE_FEE",
                defaults.dispatch.groupage_base_fee,
            )?,
            area_delivery_fees: json_or_default("AREA_DELIVERY_FEES", HashMap::new())?,
            average_speed_kmh: parse_or_default(
                "AVERAGE_SPEED_KMH",
                defaults.dispatch.average_speed_kmh,
            )?,
            tracking_base_url: env::var("TRACKING_BASE_URL")
                .unwrap_or(defaults.dispatch.tracking_base_url),
        };
        dispatch.validate()?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            tx_lock_timeout: Duration::from_millis(parse_or_default("TX_LOCK_TIMEOUT_MS", 2000u64)?),
            dispatch,
            finance: FinanceConfig {
                money_scale: parse_or_default("MONEY_SCALE", defaults.finance.money_scale)?,
                commission_rules: CommissionRules::new(json_or_default(
                    "COMMISSION_RULES",
                    Vec::new(),
                )?)?,
            },
        })
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.default_batch_capacity == 0 {
            return Err(AppError::Config(
                "DEFAULT_BATCH_CAPACITY must be > 0".to_string(),
            ));
        }
        if self.average_speed_kmh.is_nan() || self.average_speed_kmh <= 0.0 {
            return Err(AppError::Config("AVERAGE_SPEED_KMH must be > 0".to_string()));
        }
        if self.groupage_base_fee.is_sign_negative() {
            return Err(AppError::Config(
                "GROUPAGE_BASE_FEE must not be negative".to_string(),
            ));
        }
        if let Some((area, fee)) = self
            .area_delivery_fees
            .iter()
            .find(|(_, fee)| fee.is_sign_negative())
        {
            return Err(AppError::Config(format!(
                "AREA_DELIVERY_FEES has a negative fee {fee} for {area}"
            )));
        }
        Ok(())
    }

    pub fn delivery_fee_for(&self, area: &str) -> Decimal {
        self.area_delivery_fees
            .get(area)
            .copied()
            .unwrap_or(self.groupage_base_fee)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

fn json_or_default<T: DeserializeOwned>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => serde_json::from_str(&raw)
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{CommissionRules, Config};
    use crate::error::AppError;
    use crate::models::payment::{CommissionRule, PaymentActor};

    #[test]
    fn area_override_wins_over_base_fee() {
        let mut config = Config::default();
        config
            .dispatch
            .area_delivery_fees
            .insert("Plateau".to_string(), dec!(2500));

        assert_eq!(config.dispatch.delivery_fee_for("Plateau"), dec!(2500));
        assert_eq!(config.dispatch.delivery_fee_for("Medina"), dec!(2000));
    }

    #[test]
    fn rule_override_replaces_default_for_its_payer_only() {
        let rules = CommissionRules::new(vec![CommissionRule {
            payer: PaymentActor::Seller,
            item_price_pct: dec!(80),
            delivery_fee_pct: dec!(12),
            platform_commission_pct: dec!(6),
            insurance_pct: dec!(2),
        }])
        .unwrap();

        assert_eq!(
            rules.for_payer(PaymentActor::Seller).unwrap().item_price_pct,
            dec!(80)
        );
        assert_eq!(
            rules.for_payer(PaymentActor::Client).unwrap().item_price_pct,
            dec!(85)
        );
    }

    #[test]
    fn rule_that_does_not_sum_to_100_is_rejected() {
        let result = CommissionRules::new(vec![CommissionRule {
            payer: PaymentActor::Client,
            item_price_pct: dec!(85),
            delivery_fee_pct: dec!(10),
            platform_commission_pct: dec!(10),
            insurance_pct: dec!(0),
        }]);

        assert!(result.is_err());
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(Config::default().dispatch.validate().is_ok());
    }

    #[test]
    fn negative_fees_are_rejected() {
        let mut config = Config::default();
        config.dispatch.groupage_base_fee = dec!(-1);
        assert!(matches!(
            config.dispatch.validate(),
            Err(AppError::Config(_))
        ));

        let mut config = Config::default();
        config
            .dispatch
            .area_delivery_fees
            .insert("Plateau".to_string(), dec!(-500));
        assert!(matches!(
            config.dispatch.validate(),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn zero_capacity_and_speed_are_rejected() {
        let mut config = Config::default();
        config.dispatch.default_batch_capacity = 0;
        assert!(config.dispatch.validate().is_err());

        let mut config = Config::default();
        config.dispatch.average_speed_kmh = 0.0;
        assert!(config.dispatch.validate().is_err());
    }
}
