use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    Dev,
    Paper,
    Live,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSection {
    pub env: Env,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisSection {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskSection {
    pub position_cap_usd: Decimal,
    pub rate_cap_per_strategy: usize,
    pub rate_window_s: u64,
    #[serde(default = "default_live_micro_cap")]
    pub live_micro_cap_usd: Decimal,
    #[serde(default)]
    pub symbol_allow_list: Vec<String>,
}

fn default_live_micro_cap() -> Decimal {
    Decimal::TEN
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KillswitchSection {
    pub file_path: String,
    pub state_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlippageModel {
    Linear,
    Sqrt,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionSlippageSection {
    pub model: SlippageModel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionTwapSection {
    pub slices: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionVwapSection {
    pub lookback_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionIcebergSection {
    pub visible_ratio: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionPovSection {
    pub target_pov: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionSection {
    pub slippage: ExecutionSlippageSection,
    pub twap: ExecutionTwapSection,
    pub vwap: ExecutionVwapSection,
    pub iceberg: ExecutionIcebergSection,
    pub pov: ExecutionPovSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JournalSection {
    pub rotate_size_mb: u64,
    pub compress_after_days: u64,
}

/// One target allocation line (spec §4.J / §4.L weight-sum validation).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetWeight {
    pub strategy_id: String,
    pub symbol: String,
    pub weight: Decimal,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PortfolioSection {
    #[serde(default)]
    pub targets: Vec<TargetWeight>,
    #[serde(default)]
    pub drift_threshold: Option<Decimal>,
    #[serde(default)]
    pub rebalance_interval_s: Option<u64>,
}

/// A single named secret value, supplied by the optional encrypted overlay
/// (spec §4.L: "base + environment-specific + optional encrypted secrets
/// overlay"). Decryption of the overlay itself happens before this type
/// ever sees it — this struct only models the plaintext shape once loaded.
pub type Secrets = HashMap<String, String>;

/// The fully merged, validated configuration document shared read-only
/// across every component after [`validate`] (spec §4.L: "A single
/// `AppConfig` record is shared read-only across all components after
/// validation").
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub app: AppSection,
    pub redis: RedisSection,
    pub risk: RiskSection,
    pub killswitch: KillswitchSection,
    pub execution: ExecutionSection,
    pub journal: JournalSection,
    #[serde(default)]
    pub portfolio: PortfolioSection,
    #[serde(default)]
    pub secrets_required: Vec<String>,
}

/// Deep-merge `overlay` into `base`: mapping keys in `overlay` recursively
/// merge with `base`, everything else in `overlay` (scalars, sequences)
/// replaces `base` outright. Used to fold the environment-specific and
/// secrets layers onto the base document (spec §4.L).
fn merge(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

fn load_yaml(path: &Path) -> Result<serde_yaml::Value, ConfigError> {
    let bytes = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&bytes).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `base`, optionally fold in `env_overlay` and `secrets_overlay`, and
/// deserialize strictly into [`AppConfig`]. Every layer is parsed before any
/// `deny_unknown_fields` check runs, so an unknown key anywhere in the
/// merged document is rejected exactly once.
pub fn load_layered(
    base: &Path,
    env_overlay: Option<&Path>,
    secrets_overlay: Option<&Path>,
) -> Result<AppConfig, ConfigError> {
    let mut document = load_yaml(base)?;
    if let Some(path) = env_overlay {
        merge(&mut document, load_yaml(path)?);
    }
    if let Some(path) = secrets_overlay {
        merge(&mut document, load_yaml(path)?);
    }
    serde_yaml::from_value(document).map_err(|source| ConfigError::Parse {
        path: base.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const BASE: &str = r#"
app:
  env: dev
redis:
  url: redis://localhost:6379
risk:
  position_cap_usd: 1000000
  rate_cap_per_strategy: 100
  rate_window_s: 1
killswitch:
  file_path: /tmp/halt
  state_key: halt
execution:
  slippage:
    model: linear
  twap:
    slices: 4
  vwap:
    lookback_days: 30
  iceberg:
    visible_ratio: 0.1
  pov:
    target_pov: 0.1
journal:
  rotate_size_mb: 100
  compress_after_days: 7
"#;

    #[test]
    fn loads_a_well_formed_base_document() {
        let base = write_yaml(BASE);
        let config = load_layered(base.path(), None, None).unwrap();
        assert_eq!(config.app.env, Env::Dev);
        assert_eq!(config.risk.live_micro_cap_usd, Decimal::TEN);
    }

    #[test]
    fn env_overlay_replaces_scalar_fields() {
        let base = write_yaml(BASE);
        let overlay = write_yaml("app:\n  env: live\n");
        let config = load_layered(base.path(), Some(overlay.path()), None).unwrap();
        assert_eq!(config.app.env, Env::Live);
        // Unrelated fields survive the merge untouched.
        assert_eq!(config.redis.url, "redis://localhost:6379");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let base = write_yaml(&format!("{}\nbogus_top_level_key: true\n", BASE));
        assert!(matches!(load_layered(base.path(), None, None), Err(ConfigError::Parse { .. })));
    }
}
