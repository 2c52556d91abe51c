#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("bus error: {0}")]
    Bus(String),

    #[error("strategy '{0}' panicked or returned an error, isolated")]
    StrategyFailed(String),

    #[error("event deserialize error: {0}")]
    Deserialize(String),
}
