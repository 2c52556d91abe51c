use crate::error::KillSwitchError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Minimal key-value interface the kill-switch (and the Bus) consume from
/// the shared-state collaborator (spec §6, "Shared-state interface").
#[async_trait]
pub trait SharedState: Send + Sync {
    async fn get_bool(&self, key: &str) -> Result<bool, KillSwitchError>;
    async fn set_bool(&self, key: &str, value: bool) -> Result<(), KillSwitchError>;
    async fn delete(&self, key: &str) -> Result<(), KillSwitchError>;
}

/// In-memory fake substitutable for tests (spec §6 requires one).
#[derive(Debug, Default)]
pub struct InMemorySharedState {
    map: Mutex<HashMap<String, bool>>,
}

#[async_trait]
impl SharedState for InMemorySharedState {
    async fn get_bool(&self, key: &str) -> Result<bool, KillSwitchError> {
        Ok(self.map.lock().get(key).copied().unwrap_or(false))
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), KillSwitchError> {
        self.map.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KillSwitchError> {
        self.map.lock().remove(key);
        Ok(())
    }
}
