use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Per-strategy rolling-window order-rate limiter (spec §4.E step 3).
/// `check_and_record(strategy, now_ns)` returns `true` iff this intent is
/// the `cap`-th or earlier within the trailing `window_ns` — the rate-cap
/// linearity law (spec §8): the k-th intent arrives allowed iff `k <= cap`.
#[derive(Debug)]
pub struct RateLimiter {
    cap: usize,
    window_ns: i64,
    windows: Mutex<HashMap<String, VecDeque<i64>>>,
}

impl RateLimiter {
    pub fn new(cap: usize, window_ns: i64) -> Self {
        Self {
            cap,
            window_ns,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check_and_record(&self, strategy_id: &str, now_ns: i64) -> bool {
        let mut guard = self.windows.lock();
        let window = guard.entry(strategy_id.to_string()).or_default();
        while let Some(&front) = window.front() {
            if now_ns - front >= self.window_ns {
                window.pop_front();
            } else {
                break;
            }
        }
        if window.len() >= self.cap {
            return false;
        }
        window.push_back(now_ns);
        true
    }
}
