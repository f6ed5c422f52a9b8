//! In-process activation registry
//!
//! Keeps the class table in memory and serves activation requests from
//! callers in the same process, following the platform's rules for
//! single-use and multi-use registrations.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};
use crate::activation::{ClassObject, ObjectReference};
use crate::types::{hresult, Clsid, Iid, Result, ServerError};
use super::{capabilities, ActivationRegistry, ClassContext, RegistrationHandle, RegistrationMode, SecurityParams};

/// `LockServer` pin held for the duration of one activation
struct ServerPin<'a>(&'a dyn ClassObject);

impl<'a> ServerPin<'a> {
    fn acquire(class_object: &'a dyn ClassObject) -> Self {
        class_object.lock_server(true);
        Self(class_object)
    }
}

impl Drop for ServerPin<'_> {
    fn drop(&mut self) {
        self.0.lock_server(false);
    }
}

/// Registered class object
struct RegistryEntry {
    clsid: Clsid,
    class_object: Arc<dyn ClassObject>,
    context: ClassContext,
    mode: RegistrationMode,
    /// Single-use entry already handed to a client
    claimed: bool,
}

/// A client's request to activate a class
#[derive(Clone, Debug)]
pub struct ActivationRequest {
    /// Class to activate
    pub clsid: Clsid,
    /// Context the client asks for
    pub context: ClassContext,
    /// Interface the client wants back
    pub iid: Iid,
    /// Controlling outer object for aggregation
    pub outer: Option<ObjectReference>,
}

impl ActivationRequest {
    /// Request a local-server activation
    pub fn new(clsid: Clsid, iid: Iid) -> Self {
        Self {
            clsid,
            context: ClassContext::LocalServer,
            iid,
            outer: None,
        }
    }

    /// Set the activation context
    pub fn context(mut self, context: ClassContext) -> Self {
        self.context = context;
        self
    }

    /// Request aggregation under `outer`
    pub fn outer(mut self, outer: ObjectReference) -> Self {
        self.outer = Some(outer);
        self
    }
}

/// Class table shared by the server and in-process clients
pub struct InProcessRegistry {
    /// Entries by cookie
    entries: RwLock<HashMap<u32, RegistryEntry>>,
    /// Next cookie to hand out
    next_cookie: AtomicU32,
    /// Security block, set at most once
    security: Mutex<Option<SecurityParams>>,
}

impl InProcessRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_cookie: AtomicU32::new(1),
            security: Mutex::new(None),
        }
    }

    /// Activate a class on behalf of a client
    ///
    /// The class object is pinned with `LockServer` while the instance is
    /// created, as the platform runtime does.
    pub fn activate(&self, request: &ActivationRequest) -> Result<ObjectReference> {
        let class_object = self.claim(request.clsid, request.context)?;

        let _pin = ServerPin::acquire(class_object.as_ref());
        class_object
            .create_instance(request.outer.as_ref(), &request.iid)
            .map_err(ServerError::from)
    }

    /// Activate and report the outcome as a status code
    ///
    /// A panicking class object is reported as `E_UNEXPECTED`.
    pub fn activate_status(&self, request: &ActivationRequest) -> (u32, Option<ObjectReference>) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.activate(request))) {
            Ok(Ok(object)) => (hresult::S_OK, Some(object)),
            Ok(Err(e)) => (e.hresult(), None),
            Err(_) => {
                error!(clsid = %request.clsid, "activation panicked");
                (hresult::E_UNEXPECTED, None)
            }
        }
    }

    /// Whether a class is visible to new activations
    pub fn is_registered(&self, clsid: &Clsid) -> bool {
        let entries = self.entries.read();
        entries.values().any(|e| e.clsid == *clsid && !e.claimed)
    }

    /// Number of live registrations
    pub fn registrations(&self) -> usize {
        self.entries.read().len()
    }

    /// Security block applied so far
    pub fn security(&self) -> Option<SecurityParams> {
        self.security.lock().clone()
    }

    fn claim(&self, clsid: Clsid, context: ClassContext) -> Result<Arc<dyn ClassObject>> {
        let mut entries = self.entries.write();
        let entry = entries
            .values_mut()
            .find(|e| e.clsid == clsid && e.context == context && !e.claimed)
            .ok_or(ServerError::ClassNotRegistered(clsid))?;

        if entry.mode == RegistrationMode::SingleUse {
            debug!(%clsid, "single-use registration claimed");
            entry.claimed = true;
        }
        Ok(entry.class_object.clone())
    }
}

impl Default for InProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationRegistry for InProcessRegistry {
    fn initialize_security(&self, params: &SecurityParams) -> Result<()> {
        let mut security = self.security.lock();
        if security.is_some() {
            return Err(ServerError::SecurityInitFailed(hresult::RPC_E_TOO_LATE));
        }
        debug!(
            ?params,
            secure_refs = params.has_capability(capabilities::SECURE_REFS),
            "security initialized"
        );
        *security = Some(params.clone());
        Ok(())
    }

    fn register(
        &self,
        clsid: Clsid,
        class_object: Arc<dyn ClassObject>,
        context: ClassContext,
        mode: RegistrationMode,
    ) -> Result<RegistrationHandle> {
        if class_object.clsid() != clsid {
            return Err(ServerError::RegistrationFailed(hresult::E_INVALIDARG));
        }

        let cookie = self.next_cookie.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write();
        entries.insert(
            cookie,
            RegistryEntry {
                clsid,
                class_object,
                context,
                mode,
                claimed: false,
            },
        );
        info!(
            %clsid,
            cookie,
            clsctx = context.as_raw(),
            regcls = mode.as_raw(),
            "class object registered"
        );
        Ok(RegistrationHandle::new(cookie))
    }

    fn revoke(&self, handle: RegistrationHandle) -> Result<()> {
        let mut entries = self.entries.write();
        match entries.remove(&handle.cookie()) {
            Some(entry) => {
                info!(clsid = %entry.clsid, cookie = handle.cookie(), "class object revoked");
                Ok(())
            }
            None => Err(ServerError::RevocationFailed(hresult::CO_E_OBJNOTREG)),
        }
    }
}
