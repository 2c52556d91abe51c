//! Bounded-ring dedup cache for ingest-side streams (spec §3: `TradeEvent`
//! "Deduplicated by `trade_id` within a rolling window ≥ 512"; spec §9's
//! collections vocabulary: "bounded ring of T with oldest-eviction... for
//! dedup caches and market-data windows").

use crate::{bus::Bus, error::BusError};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Oldest-eviction ring of recently seen identifiers. Holds at most
/// `capacity` ids; inserting past capacity evicts the oldest before adding
/// the new one.
pub struct TradeDedup {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl TradeDedup {
    /// Spec §3 requires a window of at least 512 ids; smaller values are
    /// still accepted so tests can exercise eviction without 512 inserts.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// `true` the first time `id` is seen within the window, `false` for a
    /// duplicate. Never touches the ring on a duplicate.
    pub fn insert_if_new(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Publish `payload` to `topic` under `id`'s dedup guard (spec §8: "for any
/// trade stream with repeated `trade_id`s within the dedup window,
/// downstream `md.trades.*` contains each `trade_id` exactly once"). Returns
/// `Ok(false)` without publishing on a duplicate id.
pub async fn publish_deduped<T>(
    bus: &Bus,
    dedup: &mut TradeDedup,
    topic: &str,
    id: &str,
    payload: &T,
) -> Result<bool, BusError>
where
    T: Serialize,
{
    if !dedup.insert_if_new(id) {
        return Ok(false);
    }
    bus.publish(topic, payload).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use futures::StreamExt;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn duplicate_id_within_window_is_rejected() {
        let mut dedup = TradeDedup::new(512);
        assert!(dedup.insert_if_new("t1"));
        assert!(!dedup.insert_if_new("t1"));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest_so_it_can_reappear() {
        let mut dedup = TradeDedup::new(2);
        assert!(dedup.insert_if_new("t1"));
        assert!(dedup.insert_if_new("t2"));
        assert!(dedup.insert_if_new("t3"));
        assert!(dedup.insert_if_new("t1"), "t1 was evicted by capacity, so it's new again");
        assert_eq!(dedup.len(), 2);
    }

    #[tokio::test]
    async fn publish_deduped_skips_repeated_trade_id() {
        let bus = Bus::new();
        let mut dedup = TradeDedup::new(512);
        let mut sub = bus.subscribe::<Payload>("md.trades.ATOMUSDT");

        assert!(publish_deduped(&bus, &mut dedup, "md.trades.ATOMUSDT", "t1", &Payload { value: 1 })
            .await
            .unwrap());
        assert!(!publish_deduped(&bus, &mut dedup, "md.trades.ATOMUSDT", "t1", &Payload { value: 1 })
            .await
            .unwrap());
        assert!(publish_deduped(&bus, &mut dedup, "md.trades.ATOMUSDT", "t2", &Payload { value: 2 })
            .await
            .unwrap());

        assert_eq!(sub.next().await.unwrap().unwrap(), Payload { value: 1 });
        assert_eq!(sub.next().await.unwrap().unwrap(), Payload { value: 2 });
    }
}
