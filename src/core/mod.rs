//! Task dispatch and lifecycle primitives: pools, timers, run-once,
//! registries, thread groups, and cooperative shutdown.

pub mod auto_expire;
pub mod error;
pub mod group;
pub mod listener;
pub mod machine;
pub mod pool;
pub mod registry;
pub mod rolling_id;
pub mod run_once;
pub mod shutdown;
pub mod timeout;
pub mod timer;
pub mod ttl;

pub use auto_expire::AutoExpiringCollection;
pub use error::{AppResult, CoreError};
pub use group::{GroupId, GroupLatch};
pub use listener::{DecoratingListener, DefaultListener, ThreadEventListener};
pub use machine::{global, ThreadMachine};
pub use pool::{Pool, PoolConfig, TaskFailure, TaskHandle};
pub use registry::{InstanceHandle, InstanceRegistry};
pub use rolling_id::RollingId;
pub use run_once::RunOnceController;
pub use shutdown::ShutdownFlag;
pub use timeout::{InterruptFlag, TimeoutController};
pub use timer::{PeriodicTimerController, TimerHandle};
pub use ttl::TtlCollection;
