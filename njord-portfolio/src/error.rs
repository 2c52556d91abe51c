#[derive(Debug, thiserror::Error)]
pub enum PortfolioError {
    #[error("bus error: {0}")]
    Bus(String),

    #[error("journal error: {0}")]
    Journal(String),
}
