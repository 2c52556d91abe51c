use crate::context::{Context, Params};
use njord_core::OrderIntent;

/// Event-driven strategy callback (grounded on the teacher's `Strategy<E>`
/// trait, generalized to the raw JSON payload every bus topic can carry —
/// a strategy subscribed to several topic patterns sees a mix of shapes and
/// deserializes what it needs from `payload`).
pub trait Strategy: Send {
    fn on_start(&mut self, _params: &Params) {}

    /// React to one bus event. `topic` is the subscribed pattern that
    /// matched, not the literal publish topic. Returns zero or more intents
    /// to be published to `strat.intent`.
    fn on_event(&mut self, ctx: &Context, topic: &str, payload: &serde_json::Value) -> Vec<OrderIntent>;

    fn on_stop(&mut self) {}
}

/// Descriptor loaded from config (spec §4.I): names the strategy's id, the
/// topic patterns it subscribes to, the symbols it trades, and its params.
#[derive(Debug, Clone)]
pub struct StrategyDescriptor {
    pub strategy_id: String,
    pub topics: Vec<String>,
    pub symbols: Vec<String>,
    pub params: Params,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        events: Vec<serde_json::Value>,
    }

    impl Strategy for Recorder {
        fn on_event(&mut self, _ctx: &Context, _topic: &str, payload: &serde_json::Value) -> Vec<OrderIntent> {
            self.events.push(payload.clone());
            Vec::new()
        }
    }

    #[test]
    fn strategy_trait_is_object_safe() {
        let _boxed: Box<dyn Strategy> = Box::new(Recorder { events: Vec::new() });
    }
}
