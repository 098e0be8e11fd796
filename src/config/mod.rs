//! Configuration models for the framework's pools.

pub mod pool;

pub use pool::{FrameworkConfig, PoolProfileConfig};
