//! Class object registration
//!
//! The registry is the seam to the platform's activation service:
//! - register a class object under a CLSID
//! - revoke it again with the handle returned by registration
//! - apply the process security parameters once, before registering

mod in_process;
mod security;

pub use in_process::*;
pub use security::*;

use std::sync::Arc;
use crate::activation::ClassObject;
use crate::types::{Clsid, Result};

/// Activation context a class is registered for (CLSCTX)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ClassContext {
    /// Same process as the caller
    InprocServer = 1,
    /// Separate process on the same machine
    LocalServer = 4,
    /// Separate machine
    RemoteServer = 16,
}

impl ClassContext {
    /// Raw CLSCTX value
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// How many activations one registration serves (REGCLS)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RegistrationMode {
    /// Withdrawn after the first activation; the server exits once idle
    SingleUse = 0,
    /// Serves any number of activations until stopped externally
    MultipleUse = 1,
}

impl RegistrationMode {
    /// Raw REGCLS value
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Registration cookie returned by the registry
///
/// Not `Clone`: revocation consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(u32);

impl RegistrationHandle {
    /// Wrap a raw cookie (for registry implementations)
    pub fn new(cookie: u32) -> Self {
        Self(cookie)
    }

    /// Raw cookie value
    pub fn cookie(&self) -> u32 {
        self.0
    }
}

/// Platform activation registry
pub trait ActivationRegistry: Send + Sync {
    /// Apply the process-wide security parameters
    fn initialize_security(&self, params: &SecurityParams) -> Result<()>;

    /// Publish a class object
    fn register(
        &self,
        clsid: Clsid,
        class_object: Arc<dyn ClassObject>,
        context: ClassContext,
        mode: RegistrationMode,
    ) -> Result<RegistrationHandle>;

    /// Withdraw a registration
    fn revoke(&self, handle: RegistrationHandle) -> Result<()>;
}
