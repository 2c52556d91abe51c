use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::{collections::BinaryHeap, cmp::Ordering, fmt::Debug, sync::Arc};
use tokio::sync::oneshot;

/// Capability exposing monotonic-ish time and suspension to every component.
/// Production code runs on [`SystemClock`]; backtests and unit tests inject
/// [`FixedClock`] so replay is byte-for-byte deterministic.
#[async_trait]
pub trait Clock: Debug + Send + Sync {
    /// Nanoseconds since the Unix epoch.
    fn now_ns(&self) -> i64;

    /// Suspend the calling task until `duration_ns` has elapsed according to
    /// this clock.
    async fn sleep(&self, duration_ns: i64);
}

/// Wall-clock [`Clock`] backed by `chrono`/`tokio::time`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        Utc::now()
            .timestamp_nanos_opt()
            .expect("system time out of range for i64 nanoseconds")
    }

    async fn sleep(&self, duration_ns: i64) {
        let duration_ns = duration_ns.max(0) as u64;
        tokio::time::sleep(std::time::Duration::from_nanos(duration_ns)).await;
    }
}

struct Waiter {
    wake_ns: i64,
    seq: u64,
    tx: oneshot::Sender<()>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.wake_ns == other.wake_ns && self.seq == other.seq
    }
}
impl Eq for Waiter {}

impl Ord for Waiter {
    // BinaryHeap is a max-heap; invert so the earliest wake time is popped
    // first, tie-broken by enqueue order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .wake_ns
            .cmp(&self.wake_ns)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Inner {
    now_ns: i64,
    next_seq: u64,
    waiters: BinaryHeap<Waiter>,
}

/// Deterministic [`Clock`] for backtests and replay. Time only moves when
/// [`FixedClock::advance`] is called; every waiter whose wake time has
/// passed is released in wake-time order (ties broken by enqueue order).
#[derive(Debug, Clone)]
pub struct FixedClock {
    inner: Arc<Mutex<Inner>>,
}

impl FixedClock {
    pub fn new(start_ns: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                now_ns: start_ns,
                next_seq: 0,
                waiters: BinaryHeap::new(),
            })),
        }
    }

    /// Move time forward by `delta_ns`, waking every waiter whose deadline
    /// has now passed, in (wake_ns, enqueue order).
    pub fn advance(&self, delta_ns: i64) {
        let mut woken = Vec::new();
        {
            let mut inner = self.inner.lock();
            inner.now_ns += delta_ns;
            while let Some(top) = inner.waiters.peek() {
                if top.wake_ns > inner.now_ns {
                    break;
                }
                woken.push(inner.waiters.pop().unwrap());
            }
        }
        for waiter in woken {
            let _ = waiter.tx.send(());
        }
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl Clock for FixedClock {
    fn now_ns(&self) -> i64 {
        self.inner.lock().now_ns
    }

    async fn sleep(&self, duration_ns: i64) {
        let rx = {
            let mut inner = self.inner.lock();
            let wake_ns = inner.now_ns + duration_ns.max(0);
            let seq = inner.next_seq;
            inner.next_seq += 1;
            if wake_ns <= inner.now_ns {
                return;
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push(Waiter { wake_ns, seq, tx });
            rx
        };
        let _ = rx.await;
    }
}
