//! Services that run, supervise and expose bot instances.

mod config;
mod control;
mod control_plane;
mod notifier;
mod runtime;
mod supervisor;

pub use config::SupervisorConfig;
pub use control_plane::{ControlPlane, OperationReport};
pub use notifier::LifecycleNotifier;
pub use supervisor::{
    InstanceSupervisor, ReloadOutcome, RestartOutcome, StartOutcome, StopOutcome, SupervisorError,
    SupervisorResult,
};
