use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("service registry error: {0}")]
    Registry(String),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("journal error: {0}")]
    Journal(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigIo { path: PathBuf, source: std::io::Error },

    #[error("service {0} failed")]
    ServiceFailed(String),

    #[error("no factory registered for service {0}")]
    UnknownService(String),
}
