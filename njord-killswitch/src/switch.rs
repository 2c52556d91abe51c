use crate::{error::KillSwitchError, shared_state::SharedState};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::warn;

/// Dual-sourced latching kill-switch. Cloning shares the same cache and
/// poller; only one poller task should be spawned per process.
#[derive(Clone)]
pub struct KillSwitch<S: SharedState> {
    file_path: PathBuf,
    state_key: String,
    shared_state: Arc<S>,
    latched: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl<S: SharedState + 'static> KillSwitch<S> {
    pub fn new(file_path: impl Into<PathBuf>, state_key: impl Into<String>, shared_state: Arc<S>) -> Self {
        Self {
            file_path: file_path.into(),
            state_key: state_key.into(),
            shared_state,
            latched: Arc::new(AtomicBool::new(false)),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Cheap, read-mostly check against the cache — never touches the
    /// filesystem or shared state directly.
    pub fn tripped(&self) -> bool {
        self.latched.load(Ordering::Acquire)
    }

    async fn check_sources(&self) -> Result<bool, KillSwitchError> {
        let file_exists = self.file_path.exists();
        let state_set = self.shared_state.get_bool(&self.state_key).await?;
        Ok(file_exists || state_set)
    }

    /// Poll both sources once, latching `tripped()` to `true` if either is
    /// set. Never clears the latch — only [`KillSwitch::reset`] does that.
    pub async fn poll_once(&self) -> Result<(), KillSwitchError> {
        if self.check_sources().await? {
            if !self.latched.swap(true, Ordering::AcqRel) {
                warn!("kill-switch tripped");
            }
        }
        Ok(())
    }

    /// Spawn the background poller loop (≤ 1 s cadence per spec §4.D).
    pub fn spawn_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if let Err(err) = this.poll_once().await {
                    warn!(%err, "kill-switch poll failed");
                }
                tokio::time::sleep(this.poll_interval).await;
            }
        })
    }

    /// Clear both sources atomically, verifying both are cleared before
    /// returning and before the in-process latch is released.
    pub async fn reset(&self) -> Result<(), KillSwitchError> {
        if self.file_path.exists() {
            std::fs::remove_file(&self.file_path).map_err(|source| KillSwitchError::Io {
                path: self.file_path.clone(),
                source,
            })?;
        }
        self.shared_state.delete(&self.state_key).await?;

        let file_still_exists = self.file_path.exists();
        let state_key_still_set = self.shared_state.get_bool(&self.state_key).await?;
        if file_still_exists || state_key_still_set {
            return Err(KillSwitchError::ResetVerificationFailed {
                file_still_exists,
                state_key_still_set,
            });
        }

        self.latched.store(false, Ordering::Release);
        Ok(())
    }
}
