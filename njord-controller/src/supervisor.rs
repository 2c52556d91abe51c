use crate::{
    error::ControllerError,
    health::{HealthProbe, LivenessTracker},
    registry::ServiceRegistry,
};
use njord_core::Clock;
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<(), ControllerError>> + Send>>;
/// Builds the future a supervised child runs, given its `shutdown` signal.
/// Re-invoked on every restart, so it must be safe to call more than once.
pub type ServiceFactory = Arc<dyn Fn(watch::Receiver<bool>) -> ServiceFuture + Send + Sync>;

struct ChildState {
    factory: ServiceFactory,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<(), ControllerError>>,
    started_ns: i64,
    last_error: Option<String>,
}

/// Owns every supervised child spawned from a [`ServiceRegistry`], tracks
/// uptime/last-error, and restarts a child when its [`LivenessTracker`]
/// trips (spec §4.K).
pub struct Supervisor {
    clock: Arc<dyn Clock>,
    children: HashMap<String, ChildState>,
}

impl Supervisor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            children: HashMap::new(),
        }
    }

    /// Spawn every service in `registry` in topological order, each a
    /// supervised child with its own `shutdown` signal.
    pub fn start_all(
        &mut self,
        registry: &ServiceRegistry,
        factories: &HashMap<String, ServiceFactory>,
    ) -> Result<(), ControllerError> {
        for name in registry.topological_order()? {
            let factory = factories
                .get(&name)
                .ok_or_else(|| ControllerError::UnknownService(name.clone()))?
                .clone();
            self.spawn(name, factory);
        }
        Ok(())
    }

    fn spawn(&mut self, name: String, factory: ServiceFactory) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let fut = factory(shutdown_rx);
        let handle = tokio::spawn(fut);
        let started_ns = self.clock.now_ns();
        info!(service = %name, "service started");
        self.children.insert(
            name,
            ChildState {
                factory,
                shutdown_tx,
                handle,
                started_ns,
                last_error: None,
            },
        );
    }

    /// Stop `name` by signalling shutdown, record whatever error it ended
    /// with, then immediately respawn it from the same factory.
    pub async fn restart(&mut self, name: &str) -> Result<(), ControllerError> {
        let Some(child) = self.children.remove(name) else {
            return Err(ControllerError::UnknownService(name.to_string()));
        };
        let _ = child.shutdown_tx.send(true);
        let result = child.handle.await;
        let last_error = match result {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(join_err) => Some(join_err.to_string()),
        };
        if let Some(err) = &last_error {
            warn!(service = %name, %err, "service restarting after failure");
        }
        self.spawn(name.to_string(), child.factory);
        if let Some(child) = self.children.get_mut(name) {
            child.last_error = last_error;
        }
        Ok(())
    }

    pub fn uptime_ns(&self, name: &str) -> Option<i64> {
        self.children
            .get(name)
            .map(|c| self.clock.now_ns() - c.started_ns)
    }

    pub fn last_error(&self, name: &str) -> Option<String> {
        self.children.get(name).and_then(|c| c.last_error.clone())
    }

    /// Signal shutdown on every child and await their completion.
    pub async fn stop_all(&mut self) {
        for (name, child) in self.children.drain() {
            let _ = child.shutdown_tx.send(true);
            if let Err(err) = child.handle.await {
                error!(service = %name, %err, "service task panicked during shutdown");
            }
        }
    }
}

/// Poll `spec.health_url` on `interval`, restarting the service through
/// `supervisor` once its [`LivenessTracker`] trips. Runs until `shutdown`
/// fires.
pub async fn run_liveness_loop(
    supervisor: Arc<tokio::sync::Mutex<Supervisor>>,
    service_name: String,
    health_url: String,
    probe: Arc<dyn HealthProbe>,
    interval: Duration,
    max_consecutive_failures: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tracker = LivenessTracker::new(max_consecutive_failures);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(interval) => {
                let healthy = probe.check(&health_url).await;
                if tracker.record(healthy) {
                    warn!(service = %service_name, "liveness probe failed {} times consecutively, restarting", tracker.consecutive_failures());
                    let mut guard = supervisor.lock().await;
                    if let Err(err) = guard.restart(&service_name).await {
                        error!(service = %service_name, %err, "failed to restart unhealthy service");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use njord_core::FixedClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ok_factory(counter: Arc<AtomicU32>) -> ServiceFactory {
        Arc::new(move |mut shutdown: watch::Receiver<bool>| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = shutdown.changed().await;
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn start_all_spawns_every_registered_service() {
        let mut registry = ServiceRegistry::new();
        registry.register(crate::registry::ServiceSpec::new("a", "core"));
        registry.register(crate::registry::ServiceSpec::new("b", "core").depends_on("a"));

        let counter = Arc::new(AtomicU32::new(0));
        let mut factories: HashMap<String, ServiceFactory> = HashMap::new();
        factories.insert("a".to_string(), ok_factory(counter.clone()));
        factories.insert("b".to_string(), ok_factory(counter.clone()));

        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(0));
        let mut supervisor = Supervisor::new(clock);
        supervisor.start_all(&registry, &factories).unwrap();
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        supervisor.stop_all().await;
    }

    #[tokio::test]
    async fn restart_respawns_from_the_same_factory() {
        let counter = Arc::new(AtomicU32::new(0));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(0));
        let mut supervisor = Supervisor::new(clock);
        supervisor.spawn("svc".to_string(), ok_factory(counter.clone()));
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        supervisor.restart("svc").await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        supervisor.stop_all().await;
    }
}
