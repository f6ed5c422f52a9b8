//! Server lifecycle controller
//!
//! Owns the class registration for the lifetime of the server:
//!
//! ```text
//! Unregistered --start()--> Registered --run_*()--> Draining --> Revoked
//! ```
//!
//! Single-use servers drain when the reference count returns to zero.
//! Multi-use servers ignore the count and drain on an external stop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use crate::activation::{ActivationDispatcher, ClassObject};
use crate::registry::{ActivationRegistry, RegistrationHandle, RegistrationMode};
use crate::tracker::ReferenceTracker;
use crate::types::{Result, ServerError};
use super::config::ServerConfig;
use super::maintenance::{MaintenanceTask, TrackerReport};

/// Controller state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not yet registered
    Unregistered,
    /// Registered, not yet serving
    Registered,
    /// Serving until the shutdown condition is met
    Draining,
    /// Registration withdrawn; final
    Revoked,
}

/// Why serving stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every outstanding reference was released
    Drained,
    /// No activation arrived within the idle timeout
    IdleTimeout,
    /// External stop signal
    Stopped,
}

/// Running maintenance task, aborted when dropped
struct MaintenanceTicker(JoinHandle<()>);

impl Drop for MaintenanceTicker {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Server session: one registration, one tracker, one shutdown
pub struct ServerLifecycleController {
    /// Configuration
    config: ServerConfig,
    /// Registered class factory
    dispatcher: Arc<ActivationDispatcher>,
    /// Platform registry
    registry: Arc<dyn ActivationRegistry>,
    /// Tick work
    maintenance: Arc<dyn MaintenanceTask>,
    /// Current state
    state: LifecycleState,
    /// Present while registered
    registration: Option<RegistrationHandle>,
}

impl ServerLifecycleController {
    /// Create a controller for `dispatcher`
    pub fn new(
        registry: Arc<dyn ActivationRegistry>,
        dispatcher: Arc<ActivationDispatcher>,
        config: ServerConfig,
    ) -> Self {
        Self {
            config,
            dispatcher,
            registry,
            maintenance: Arc::new(TrackerReport),
            state: LifecycleState::Unregistered,
            registration: None,
        }
    }

    /// Replace the maintenance task
    pub fn with_maintenance(mut self, task: Arc<dyn MaintenanceTask>) -> Self {
        self.maintenance = task;
        self
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The registered class factory
    pub fn dispatcher(&self) -> &Arc<ActivationDispatcher> {
        &self.dispatcher
    }

    /// The server's reference tracker
    pub fn tracker(&self) -> &Arc<ReferenceTracker> {
        self.dispatcher.tracker()
    }

    /// Whether the class is currently registered
    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Apply security and register the class factory
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(LifecycleState::Unregistered)?;

        if let Some(params) = &self.config.security {
            self.registry.initialize_security(params).map_err(|e| {
                error!(error = %e, "security initialization failed");
                e
            })?;
        }

        let clsid = self.dispatcher.clsid();
        let handle = self
            .registry
            .register(
                clsid,
                self.dispatcher.clone(),
                self.config.class_context,
                self.config.mode,
            )
            .map_err(|e| {
                error!(%clsid, error = %e, "class registration failed");
                match e {
                    ServerError::RegistrationFailed(_) => e,
                    other => ServerError::RegistrationFailed(other.hresult()),
                }
            })?;

        info!(%clsid, cookie = handle.cookie(), mode = ?self.config.mode, "server registered");
        self.registration = Some(handle);
        self.state = LifecycleState::Registered;
        Ok(())
    }

    /// Serve until the reference count returns to zero, then revoke
    pub async fn run_until_idle(&mut self) -> Result<ShutdownOutcome> {
        self.drive(std::future::pending::<()>(), true).await
    }

    /// Serve until `shutdown` resolves, then revoke
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<ShutdownOutcome>
    where
        F: Future<Output = ()>,
    {
        self.drive(shutdown, false).await
    }

    /// Serve with the policy selected by the registration mode
    ///
    /// Single-use servers stop when idle or on `shutdown`, whichever
    /// comes first. Multi-use servers stop only on `shutdown`.
    pub async fn serve<F>(&mut self, shutdown: F) -> Result<ShutdownOutcome>
    where
        F: Future<Output = ()>,
    {
        let watch_gate = self.config.mode == RegistrationMode::SingleUse;
        self.drive(shutdown, watch_gate).await
    }

    async fn drive<F>(&mut self, shutdown: F, watch_gate: bool) -> Result<ShutdownOutcome>
    where
        F: Future<Output = ()>,
    {
        self.expect_state(LifecycleState::Registered)?;
        self.state = LifecycleState::Draining;

        let ticker = self.spawn_maintenance();
        let tracker = self.tracker().clone();
        let idle_timeout = self.config.idle_timeout;

        let outcome = tokio::select! {
            outcome = Self::wait_idle(tracker, idle_timeout, watch_gate) => outcome,
            _ = shutdown => {
                info!("stop requested");
                ShutdownOutcome::Stopped
            }
        };

        drop(ticker);
        self.revoke_registration();
        info!(?outcome, activations = self.dispatcher.activations(), "server stopped");
        Ok(outcome)
    }

    async fn wait_idle(
        tracker: Arc<ReferenceTracker>,
        idle_timeout: Option<Duration>,
        watch_gate: bool,
    ) -> ShutdownOutcome {
        if !watch_gate {
            return std::future::pending().await;
        }

        if let Some(timeout) = idle_timeout {
            tokio::select! {
                _ = tracker.released() => return ShutdownOutcome::Drained,
                _ = tokio::time::sleep(timeout) => {}
            }
            if !tracker.has_engaged() {
                info!(?timeout, "no activation within idle timeout");
                return ShutdownOutcome::IdleTimeout;
            }
        }

        tracker.released().await;
        ShutdownOutcome::Drained
    }

    fn spawn_maintenance(&self) -> Option<MaintenanceTicker> {
        let period = self.config.maintenance_interval?;
        let task = self.maintenance.clone();
        let tracker = self.tracker().clone();

        Some(MaintenanceTicker(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                task.tick(&tracker);
            }
        })))
    }

    fn revoke_registration(&mut self) {
        if let Some(handle) = self.registration.take() {
            let cookie = handle.cookie();
            match self.registry.revoke(handle) {
                Ok(()) => info!(cookie, "registration revoked"),
                Err(e) => warn!(cookie, error = %e, "revocation failed"),
            }
        }
        self.state = LifecycleState::Revoked;
    }

    fn expect_state(&self, expected: LifecycleState) -> Result<()> {
        if self.state != expected {
            return Err(ServerError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}

impl Drop for ServerLifecycleController {
    fn drop(&mut self) {
        if self.registration.is_some() {
            self.revoke_registration();
        }
    }
}
