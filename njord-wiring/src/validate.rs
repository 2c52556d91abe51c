use crate::{
    config::{AppConfig, Secrets},
    error::ConfigError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Tolerance band for target-weight sums (spec §4.L, §9 REDESIGN FLAGS):
/// a strategy's weights must sum to `[1-eps, 1+eps]`.
const EPSILON: Decimal = dec!(0.001);

/// Strict validation pass over an already-parsed [`AppConfig`] (spec §4.L):
/// negative caps, out-of-band weight sums, and missing named secrets are
/// all rejected before the config is handed to any component. Unknown keys
/// are rejected earlier, at parse time, via `#[serde(deny_unknown_fields)]`.
pub fn validate(config: &AppConfig, secrets: &Secrets) -> Result<(), ConfigError> {
    if config.risk.position_cap_usd < Decimal::ZERO {
        return Err(ConfigError::NegativeCap {
            key: "risk.position_cap_usd".to_string(),
            value: config.risk.position_cap_usd,
        });
    }
    if config.risk.live_micro_cap_usd < Decimal::ZERO {
        return Err(ConfigError::NegativeCap {
            key: "risk.live_micro_cap_usd".to_string(),
            value: config.risk.live_micro_cap_usd,
        });
    }

    let mut sums: HashMap<&str, Decimal> = HashMap::new();
    for target in &config.portfolio.targets {
        if target.weight < Decimal::ZERO {
            return Err(ConfigError::NegativeCap {
                key: format!("portfolio.targets[{}/{}].weight", target.strategy_id, target.symbol),
                value: target.weight,
            });
        }
        *sums.entry(target.strategy_id.as_str()).or_insert(Decimal::ZERO) += target.weight;
    }
    for (strategy_id, sum) in &sums {
        if (*sum - Decimal::ONE).abs() > EPSILON {
            return Err(ConfigError::WeightSumOutOfBand {
                group: strategy_id.to_string(),
                sum: *sum,
            });
        }
    }

    for required in &config.secrets_required {
        if !secrets.contains_key(required) {
            return Err(ConfigError::MissingSecret(required.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AppSection, Env, ExecutionIcebergSection, ExecutionPovSection, ExecutionSection,
        ExecutionSlippageSection, ExecutionTwapSection, ExecutionVwapSection, JournalSection,
        KillswitchSection, PortfolioSection, RedisSection, RiskSection, SlippageModel, TargetWeight,
    };

    fn base_config() -> AppConfig {
        AppConfig {
            app: AppSection { env: Env::Dev },
            redis: RedisSection {
                url: "redis://localhost".to_string(),
            },
            risk: RiskSection {
                position_cap_usd: dec!(1000000),
                rate_cap_per_strategy: 100,
                rate_window_s: 1,
                live_micro_cap_usd: dec!(10),
                symbol_allow_list: vec![],
            },
            killswitch: KillswitchSection {
                file_path: "/tmp/halt".to_string(),
                state_key: "halt".to_string(),
            },
            execution: ExecutionSection {
                slippage: ExecutionSlippageSection { model: SlippageModel::Linear },
                twap: ExecutionTwapSection { slices: 4 },
                vwap: ExecutionVwapSection { lookback_days: 30 },
                iceberg: ExecutionIcebergSection { visible_ratio: dec!(0.1) },
                pov: ExecutionPovSection { target_pov: dec!(0.1) },
            },
            journal: JournalSection {
                rotate_size_mb: 100,
                compress_after_days: 7,
            },
            portfolio: PortfolioSection::default(),
            secrets_required: vec![],
        }
    }

    #[test]
    fn well_formed_config_validates() {
        let config = base_config();
        assert!(validate(&config, &Secrets::new()).is_ok());
    }

    #[test]
    fn negative_position_cap_is_rejected() {
        let mut config = base_config();
        config.risk.position_cap_usd = dec!(-1);
        assert!(matches!(validate(&config, &Secrets::new()), Err(ConfigError::NegativeCap { .. })));
    }

    #[test]
    fn weight_sum_within_epsilon_passes() {
        let mut config = base_config();
        config.portfolio.targets = vec![
            TargetWeight { strategy_id: "s1".to_string(), symbol: "ATOM/USDT".to_string(), weight: dec!(0.6) },
            TargetWeight { strategy_id: "s1".to_string(), symbol: "BTC/USDT".to_string(), weight: dec!(0.4) },
        ];
        assert!(validate(&config, &Secrets::new()).is_ok());
    }

    #[test]
    fn weight_sum_outside_epsilon_is_rejected() {
        let mut config = base_config();
        config.portfolio.targets = vec![
            TargetWeight { strategy_id: "s1".to_string(), symbol: "ATOM/USDT".to_string(), weight: dec!(0.6) },
            TargetWeight { strategy_id: "s1".to_string(), symbol: "BTC/USDT".to_string(), weight: dec!(0.3) },
        ];
        assert!(matches!(
            validate(&config, &Secrets::new()),
            Err(ConfigError::WeightSumOutOfBand { .. })
        ));
    }

    #[test]
    fn missing_required_secret_is_rejected() {
        let mut config = base_config();
        config.secrets_required = vec!["binance_api_key".to_string()];
        assert!(matches!(validate(&config, &Secrets::new()), Err(ConfigError::MissingSecret(_))));
    }

    #[test]
    fn present_secret_satisfies_requirement() {
        let mut config = base_config();
        config.secrets_required = vec!["binance_api_key".to_string()];
        let mut secrets = Secrets::new();
        secrets.insert("binance_api_key".to_string(), "k".to_string());
        assert!(validate(&config, &secrets).is_ok());
    }
}
