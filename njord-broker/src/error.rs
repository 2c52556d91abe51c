use crate::client::VenueError;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("kill-switch tripped, refusing to place order")]
    Halted,

    #[error("live placement attempted while live_enabled=false")]
    LiveDisabled,

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("venue unavailable after exhausting retries: {0}")]
    RetriesExhausted(#[source] VenueError),

    #[error("venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("journal error: {0}")]
    Journal(String),
}
