//! Server configuration

use std::time::Duration;
use crate::registry::{ClassContext, RegistrationMode, SecurityParams};

/// Default interval between maintenance ticks
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5);

/// Lifecycle controller configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Context the class is registered for
    pub class_context: ClassContext,
    /// Registration mode; also selects the shutdown policy
    pub mode: RegistrationMode,
    /// Period of the maintenance tick (`None` disables it)
    pub maintenance_interval: Option<Duration>,
    /// Give up if no activation arrives within this window
    pub idle_timeout: Option<Duration>,
    /// Security block applied before registration
    pub security: Option<SecurityParams>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            class_context: ClassContext::LocalServer,
            mode: RegistrationMode::SingleUse,
            maintenance_interval: Some(DEFAULT_MAINTENANCE_INTERVAL),
            idle_timeout: None,
            security: None,
        }
    }
}

impl ServerConfig {
    /// Start a builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

/// Builder for [`ServerConfig`]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Set the class context
    pub fn class_context(mut self, context: ClassContext) -> Self {
        self.config.class_context = context;
        self
    }

    /// Set the registration mode
    pub fn mode(mut self, mode: RegistrationMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the maintenance tick period
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.config.maintenance_interval = Some(interval);
        self
    }

    /// Disable the maintenance tick
    pub fn no_maintenance(mut self) -> Self {
        self.config.maintenance_interval = None;
        self
    }

    /// Set the idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = Some(timeout);
        self
    }

    /// Apply a security block at startup
    pub fn security(mut self, params: SecurityParams) -> Self {
        self.config.security = Some(params);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
