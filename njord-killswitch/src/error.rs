#[derive(Debug, thiserror::Error)]
pub enum KillSwitchError {
    #[error("io error checking sentinel file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shared-state error: {0}")]
    SharedState(String),

    #[error("reset did not take effect: file={file_still_exists} state_key={state_key_still_set}")]
    ResetVerificationFailed {
        file_still_exists: bool,
        state_key_still_set: bool,
    },
}
