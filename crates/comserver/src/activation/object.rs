//! Served objects and the references handed to clients

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use bytes::Bytes;
use crate::tracker::TrackingHandle;
use crate::types::{Clsid, Iid, Result};

/// Result of a method call on a served object
pub type CallResult = Result<Bytes>;

/// Future type for call results
pub type CallFuture = Pin<Box<dyn Future<Output = CallResult> + Send>>;

/// Trait for server-side object implementations
pub trait ServerObject: Send + Sync + 'static {
    /// The contract IID this object implements
    fn interface_id(&self) -> Iid;

    /// Invoke a method on this object
    fn invoke(&self, opnum: u16, args: Bytes) -> CallFuture;

    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Factory function type for constructing served objects
pub type ObjectFactory = Arc<dyn Fn(&ActivationContext) -> Box<dyn ServerObject> + Send + Sync>;

/// What the factory is told about the activation it serves
#[derive(Clone, Debug)]
pub struct ActivationContext {
    /// Class being activated
    pub clsid: Clsid,
    /// Interface the client asked for
    pub requested: Iid,
    /// Serial of the tracking handle bound to the new object
    pub serial: u64,
}

/// A served object plus the handle that keeps the server alive for it
struct ServedObject {
    object: Box<dyn ServerObject>,
    context: ActivationContext,
    _handle: TrackingHandle,
}

/// Shared reference to a served object
///
/// Clones share one tracking handle. Dropping the last clone releases
/// the server reference taken at activation.
#[derive(Clone)]
pub struct ObjectReference {
    inner: Arc<ServedObject>,
}

impl ObjectReference {
    pub(crate) fn new(
        object: Box<dyn ServerObject>,
        context: ActivationContext,
        handle: TrackingHandle,
    ) -> Self {
        Self {
            inner: Arc::new(ServedObject {
                object,
                context,
                _handle: handle,
            }),
        }
    }

    /// The contract IID of the referenced object
    pub fn interface_id(&self) -> Iid {
        self.inner.object.interface_id()
    }

    /// Activation context the object was built with
    pub fn context(&self) -> &ActivationContext {
        &self.inner.context
    }

    /// Invoke a method on the referenced object
    pub fn invoke(&self, opnum: u16, args: Bytes) -> CallFuture {
        self.inner.object.invoke(opnum, args)
    }

    /// Downcast to the concrete object type
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.object.as_any().downcast_ref::<T>()
    }

    /// Number of live clones of this reference
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether two references point at the same served object
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReference")
            .field("clsid", &self.inner.context.clsid)
            .field("iid", &self.interface_id())
            .field("serial", &self.inner.context.serial)
            .finish()
    }
}
