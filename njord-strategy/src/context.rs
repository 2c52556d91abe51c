use njord_bus::Bus;
use njord_risk::{PositionView, ReferencePriceCache};
use std::{collections::BTreeMap, sync::Arc};

/// Strategy parameter map, keyed by name (spec §4.I: "a params map").
pub type Params = BTreeMap<String, serde_json::Value>;

/// Handle passed to every strategy callback: the bus to publish intents on
/// (strategies don't publish directly — the host does, after collecting
/// their return value — but `bus` is exposed for symmetry with other
/// components and for request/response lookups), current positions, last
/// prices, and this strategy's own params.
pub struct Context<'a> {
    pub bus: &'a Bus,
    pub positions: Arc<dyn PositionView>,
    pub prices: Arc<ReferencePriceCache>,
    pub params: &'a Params,
    pub strategy_id: String,
}
