//! Builder for [`crate::core::pool::Pool`], wiring validated
//! [`crate::config::PoolProfileConfig`] values into a running pool.

use crate::config::PoolProfileConfig;
use crate::core::pool::Pool;

/// Constructs a named [`Pool`] from a [`PoolProfileConfig`], validating the
/// profile first.
pub struct PoolBuilder {
    name: String,
    profile: PoolProfileConfig,
}

impl PoolBuilder {
    /// Start building a pool named `name` with the default profile.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile: PoolProfileConfig::default(),
        }
    }

    /// Override the sizing profile.
    #[must_use]
    pub fn with_profile(mut self, profile: PoolProfileConfig) -> Self {
        self.profile = profile;
        self
    }

    /// Validate the profile and build a bounded pool.
    pub fn build_bounded(self) -> Result<Pool, String> {
        self.profile.validate()?;
        Ok(Pool::bounded(self.name, self.profile.into_pool_config()))
    }

    /// Validate the profile and build a cached, elastic pool. `core_threads`
    /// and `max_threads` are ignored — [`Pool::cached`] always starts at
    /// zero core threads with no ceiling.
    pub fn build_cached(self) -> Result<Pool, String> {
        self.profile.validate()?;
        Ok(Pool::cached(self.name, self.profile.into_pool_config()))
    }
}
