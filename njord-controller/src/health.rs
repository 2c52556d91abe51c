use async_trait::async_trait;
use std::time::Duration;

/// Liveness probe abstraction (spec §4.K: "HTTP GET `/health` returning 200
/// ⇒ healthy"). Boxed behind a trait so tests substitute a scripted fake
/// instead of binding a real listener.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, url: &str) -> bool;
}

/// Production probe: a real HTTP GET with a short per-attempt timeout.
pub struct ReqwestHealthProbe {
    client: reqwest::Client,
}

impl ReqwestHealthProbe {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a fixed static config");
        Self { client }
    }
}

#[async_trait]
impl HealthProbe for ReqwestHealthProbe {
    async fn check(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Tracks consecutive liveness-check failures for one service and decides
/// when a restart is warranted (spec §4.K: "on N consecutive failures,
/// restarts (configurable)").
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    max_consecutive_failures: u32,
    consecutive_failures: u32,
}

impl LivenessTracker {
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            max_consecutive_failures,
            consecutive_failures: 0,
        }
    }

    /// Record one probe outcome. Returns `true` if the failure streak just
    /// reached the configured threshold (the caller should restart now).
    pub fn record(&mut self, healthy: bool) -> bool {
        if healthy {
            self.consecutive_failures = 0;
            false
        } else {
            self.consecutive_failures += 1;
            self.consecutive_failures >= self.max_consecutive_failures
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
