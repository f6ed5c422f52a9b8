//! Class factory implementation
//!
//! `ActivationDispatcher` is the IClassFactory the activation runtime
//! calls into. Every object it produces carries a tracking handle, and
//! `LockServer` pins go to the same tracker, so both forms of keep-alive
//! add up in one count.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};
use crate::tracker::{ReferenceTracker, TrackingHandle};
use crate::types::{hresult, ActivationError, Clsid, Iid};
use super::object::{ActivationContext, ObjectFactory, ObjectReference, ServerObject};

/// The class-factory contract consumed by the activation runtime
pub trait ClassObject: Send + Sync {
    /// Class this object produces
    fn clsid(&self) -> Clsid;

    /// Create a new instance
    fn create_instance(
        &self,
        outer: Option<&ObjectReference>,
        riid: &Iid,
    ) -> std::result::Result<ObjectReference, ActivationError>;

    /// Pin (`true`) or unpin (`false`) the server
    fn lock_server(&self, lock: bool);

    /// `create_instance` as seen across the status-code boundary
    ///
    /// A panic in the implementation is reported as `E_UNEXPECTED`.
    fn create_instance_status(
        &self,
        outer: Option<&ObjectReference>,
        riid: &Iid,
    ) -> (u32, Option<ObjectReference>) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.create_instance(outer, riid))) {
            Ok(Ok(object)) => (hresult::S_OK, Some(object)),
            Ok(Err(e)) => (e.hresult(), None),
            Err(_) => {
                error!(clsid = %self.clsid(), "create_instance panicked");
                (hresult::E_UNEXPECTED, None)
            }
        }
    }

    /// `lock_server` as seen across the status-code boundary
    fn lock_server_status(&self, lock: bool) -> u32 {
        self.lock_server(lock);
        hresult::S_OK
    }
}

/// Class factory for a single class and contract
pub struct ActivationDispatcher {
    /// Class identifier
    clsid: Clsid,
    /// Contract interface of produced objects
    contract: Iid,
    /// Shared reference tracker
    tracker: Arc<ReferenceTracker>,
    /// Object constructor
    factory: ObjectFactory,
    /// Successful activations
    activations: AtomicU64,
}

impl ActivationDispatcher {
    /// Create a dispatcher with its own tracker
    pub fn new(clsid: Clsid, contract: Iid, factory: ObjectFactory) -> Self {
        Self::with_tracker(clsid, contract, factory, Arc::new(ReferenceTracker::new()))
    }

    /// Create a dispatcher sharing an existing tracker
    pub fn with_tracker(
        clsid: Clsid,
        contract: Iid,
        factory: ObjectFactory,
        tracker: Arc<ReferenceTracker>,
    ) -> Self {
        Self {
            clsid,
            contract,
            tracker,
            factory,
            activations: AtomicU64::new(0),
        }
    }

    /// Create a dispatcher from a plain constructor
    pub fn from_fn<F, T>(clsid: Clsid, contract: Iid, make: F) -> Self
    where
        F: Fn(&ActivationContext) -> T + Send + Sync + 'static,
        T: ServerObject,
    {
        let factory: ObjectFactory =
            Arc::new(move |ctx: &ActivationContext| -> Box<dyn ServerObject> { Box::new(make(ctx)) });
        Self::new(clsid, contract, factory)
    }

    /// Contract IID
    pub fn contract(&self) -> Iid {
        self.contract
    }

    /// The tracker this dispatcher counts against
    pub fn tracker(&self) -> &Arc<ReferenceTracker> {
        &self.tracker
    }

    /// Number of successful activations so far
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    fn accepts(&self, riid: &Iid) -> bool {
        *riid == self.contract || riid.is_unknown()
    }
}

impl ClassObject for ActivationDispatcher {
    fn clsid(&self) -> Clsid {
        self.clsid
    }

    fn create_instance(
        &self,
        outer: Option<&ObjectReference>,
        riid: &Iid,
    ) -> std::result::Result<ObjectReference, ActivationError> {
        if outer.is_some() {
            debug!(clsid = %self.clsid, "rejecting aggregated activation");
            return Err(ActivationError::AggregationNotSupported);
        }
        if !self.accepts(riid) {
            debug!(clsid = %self.clsid, iid = %riid, "rejecting unsupported interface");
            return Err(ActivationError::InterfaceNotSupported(*riid));
        }

        let handle = TrackingHandle::acquire(&self.tracker);
        let context = ActivationContext {
            clsid: self.clsid,
            requested: *riid,
            serial: handle.serial(),
        };
        let object = match panic::catch_unwind(AssertUnwindSafe(|| (self.factory)(&context))) {
            Ok(object) => object,
            Err(_) => {
                error!(clsid = %self.clsid, serial = context.serial, "object constructor panicked");
                drop(handle);
                return Err(ActivationError::ConstructionFailed);
            }
        };
        self.activations.fetch_add(1, Ordering::Relaxed);
        debug!(
            clsid = %self.clsid,
            serial = context.serial,
            live = self.tracker.count(),
            "object activated"
        );

        Ok(ObjectReference::new(object, context, handle))
    }

    fn lock_server(&self, lock: bool) {
        let count = if lock {
            self.tracker.increment()
        } else {
            self.tracker.decrement()
        };
        debug!(lock, count, "lock server");
    }
}
