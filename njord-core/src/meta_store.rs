use crate::model::Meta;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Shared lookup from `intent_id` to the originating [`OrderIntent`]'s
/// `meta`, so a [`FillEvent`](crate::FillEvent) can carry forward
/// `execution_id`/`slice_id`/`algo_type` even though [`OrderEvent`]
/// (spec §3) does not itself carry `meta`. Populated by whoever creates the
/// `OrderIntent` (Strategy Host, execution algorithms); consulted by the
/// Paper Trader and Broker Adapter when they emit a `FillEvent`.
#[derive(Debug, Default)]
pub struct IntentMetaStore {
    inner: Mutex<HashMap<String, Meta>>,
}

impl IntentMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, intent_id: &str, meta: Meta) {
        self.inner.lock().insert(intent_id.to_string(), meta);
    }

    pub fn get(&self, intent_id: &str) -> Meta {
        self.inner.lock().get(intent_id).cloned().unwrap_or_default()
    }

    pub fn forget(&self, intent_id: &str) {
        self.inner.lock().remove(intent_id);
    }
}
