//! Shared fixtures for the integration suites
//!
//! Run every suite with `cargo test -p integration-tests`, or one of them
//! with `--test activation_tests`, `--test lifecycle_tests` or
//! `--test concurrency_tests`. `RUST_LOG=debug` turns on server logging.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use bytes::Bytes;
use comserver::{
    ActivationDispatcher, ActivationRegistry, ActivationRequest, CallFuture, ClassObject, Clsid,
    Iid, InProcessRegistry, ObjectReference, RegistrationHandle, RegistrationMode, Result,
    SecurityParams, ServerConfig, ServerError, ServerLifecycleController, ServerObject,
    ClassContext, hresult,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test subscriber honoring RUST_LOG (once per process)
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Echo object; counts how many instances are alive
pub struct EchoObject {
    iid: Iid,
    alive: Arc<AtomicUsize>,
}

impl EchoObject {
    pub fn new(iid: Iid, alive: Arc<AtomicUsize>) -> Self {
        alive.fetch_add(1, Ordering::SeqCst);
        Self { iid, alive }
    }
}

impl Drop for EchoObject {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ServerObject for EchoObject {
    fn interface_id(&self) -> Iid {
        self.iid
    }

    fn invoke(&self, _opnum: u16, args: Bytes) -> CallFuture {
        Box::pin(async move { Ok(args) })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A registered echo server with its in-process registry
pub struct TestServer {
    pub clsid: Clsid,
    pub iid: Iid,
    pub registry: Arc<InProcessRegistry>,
    pub controller: ServerLifecycleController,
    pub alive: Arc<AtomicUsize>,
}

impl TestServer {
    /// Build and start an echo server
    pub fn start(config: ServerConfig) -> Self {
        let clsid = Clsid::generate();
        let iid = Iid::generate();
        let alive = Arc::new(AtomicUsize::new(0));
        let counter = alive.clone();
        let dispatcher = Arc::new(ActivationDispatcher::from_fn(clsid, iid, move |_| {
            EchoObject::new(iid, counter.clone())
        }));
        let registry = Arc::new(InProcessRegistry::new());
        let mut controller = ServerLifecycleController::new(registry.clone(), dispatcher, config);
        controller.start().expect("server start");

        Self {
            clsid,
            iid,
            registry,
            controller,
            alive,
        }
    }

    /// Multi-use server without a maintenance tick
    pub fn multi_use() -> Self {
        Self::start(
            ServerConfig::builder()
                .mode(RegistrationMode::MultipleUse)
                .no_maintenance()
                .build(),
        )
    }

    /// Activate the server's contract interface
    pub fn activate(&self) -> Result<ObjectReference> {
        self.registry.activate(&ActivationRequest::new(self.clsid, self.iid))
    }

    /// Outstanding references
    pub fn count(&self) -> usize {
        self.controller.tracker().count()
    }
}

/// Registry that delegates to an in-process one but can refuse calls
pub struct FaultyRegistry {
    pub inner: InProcessRegistry,
    pub fail_register: bool,
    pub fail_revoke: bool,
    pub revoke_attempts: AtomicUsize,
}

impl FaultyRegistry {
    pub fn new(fail_register: bool, fail_revoke: bool) -> Self {
        Self {
            inner: InProcessRegistry::new(),
            fail_register,
            fail_revoke,
            revoke_attempts: AtomicUsize::new(0),
        }
    }
}

impl ActivationRegistry for FaultyRegistry {
    fn initialize_security(&self, params: &SecurityParams) -> Result<()> {
        self.inner.initialize_security(params)
    }

    fn register(
        &self,
        clsid: Clsid,
        class_object: Arc<dyn ClassObject>,
        context: ClassContext,
        mode: RegistrationMode,
    ) -> Result<RegistrationHandle> {
        if self.fail_register {
            warn!(%clsid, "refusing registration");
            return Err(ServerError::RegistrationFailed(hresult::E_FAIL));
        }
        self.inner.register(clsid, class_object, context, mode)
    }

    fn revoke(&self, handle: RegistrationHandle) -> Result<()> {
        self.revoke_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_revoke {
            warn!(cookie = handle.cookie(), "refusing revocation");
            return Err(ServerError::RevocationFailed(hresult::CO_E_OBJNOTREG));
        }
        self.inner.revoke(handle)
    }
}
