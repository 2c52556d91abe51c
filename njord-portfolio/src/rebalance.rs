use rust_decimal::Decimal;
use std::collections::HashMap;

/// A strategy's target share of its own capital held in a given symbol,
/// expressed as a fraction in `[0, 1]`. The tracker treats anything not
/// listed here as having a target of zero.
#[derive(Debug, Clone, Default)]
pub struct TargetAllocations {
    weights: HashMap<(String, String), Decimal>,
}

impl TargetAllocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, strategy_id: &str, symbol: &str, weight: Decimal) {
        self.weights.insert((strategy_id.to_string(), symbol.to_string()), weight);
    }

    pub fn get(&self, strategy_id: &str, symbol: &str) -> Decimal {
        self.weights
            .get(&(strategy_id.to_string(), symbol.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Every `(strategy_id, symbol)` pair with a configured target, so a
    /// caller can find symbols that should be tracked for drift even before
    /// any fill has ever touched them.
    pub fn configured_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.weights.keys().map(|(s, sym)| (s.as_str(), sym.as_str()))
    }
}

/// One line of a rebalance plan: the signed notional delta needed to bring
/// `symbol` back to its target weight of `strategy_id`'s capital.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftLine {
    pub strategy_id: String,
    pub symbol: String,
    pub current_notional: Decimal,
    pub target_notional: Decimal,
}

impl DriftLine {
    pub fn delta_notional(&self) -> Decimal {
        self.target_notional - self.current_notional
    }

    pub fn drift_fraction(&self, capital: Decimal) -> Decimal {
        if capital.is_zero() {
            return Decimal::ZERO;
        }
        (self.delta_notional() / capital).abs()
    }
}
