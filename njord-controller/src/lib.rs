//! Controller & Session (spec §4.K): discovers services from a registry,
//! starts them in topological order as supervised children, probes their
//! liveness, and restarts a child after `N` consecutive failures. Sessions
//! are assigned a UUID at controller start, ended at stop, and journalled
//! with config hash and service list.

mod error;
mod health;
mod registry;
mod session;
mod supervisor;

pub use error::ControllerError;
pub use health::{HealthProbe, LivenessTracker, ReqwestHealthProbe};
pub use registry::{ServiceRegistry, ServiceSpec};
pub use session::{config_hash, Session, SessionEventKind, SessionRecord};
pub use supervisor::{run_liveness_loop, ServiceFactory, ServiceFuture, Supervisor};
