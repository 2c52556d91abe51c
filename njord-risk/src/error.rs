#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    #[error("failed to publish risk decision: {0}")]
    Publish(String),
}
