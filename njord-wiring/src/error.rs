use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse YAML in {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("weight sum for {group} is {sum}, outside [1-eps, 1+eps]")]
    WeightSumOutOfBand { group: String, sum: rust_decimal::Decimal },

    #[error("negative cap rejected: {key} = {value}")]
    NegativeCap { key: String, value: rust_decimal::Decimal },

    #[error("config references secret '{0}' which was not supplied")]
    MissingSecret(String),
}
