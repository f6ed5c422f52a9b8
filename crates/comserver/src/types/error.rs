//! Activation and lifecycle error types

use thiserror::Error;
use super::identifiers::{Clsid, Iid};
use crate::lifecycle::LifecycleState;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors reported to the activation runtime from `create_instance`
///
/// These never unwind across the activation boundary; the runtime sees
/// them as status codes via [`ActivationError::hresult`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    /// A non-null outer object was supplied
    #[error("aggregation not supported")]
    AggregationNotSupported,

    /// The requested IID is neither the class contract nor IUnknown
    #[error("interface not supported: {0}")]
    InterfaceNotSupported(Iid),

    /// The object constructor panicked
    #[error("object construction failed")]
    ConstructionFailed,
}

impl ActivationError {
    /// Status code seen by the activation runtime
    pub fn hresult(&self) -> u32 {
        match self {
            Self::AggregationNotSupported => hresult::CLASS_E_NOAGGREGATION,
            Self::InterfaceNotSupported(_) => hresult::E_NOINTERFACE,
            Self::ConstructionFailed => hresult::E_UNEXPECTED,
        }
    }
}

/// Server lifecycle errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// The registry rejected class registration (fatal at startup)
    #[error("class registration failed: 0x{0:08x}")]
    RegistrationFailed(u32),

    /// The registry rejected revocation (logged at shutdown)
    #[error("class revocation failed: 0x{0:08x}")]
    RevocationFailed(u32),

    /// Applying the security parameter block failed
    #[error("security initialization failed: 0x{0:08x}")]
    SecurityInitFailed(u32),

    /// No visible registration for the requested class
    #[error("class not registered: {0}")]
    ClassNotRegistered(Clsid),

    /// Lifecycle operation called in the wrong state
    #[error("invalid lifecycle state: expected {expected:?}, got {actual:?}")]
    InvalidState {
        expected: LifecycleState,
        actual: LifecycleState,
    },

    /// Activation was rejected by the class object
    #[error("activation error: {0}")]
    Activation(#[from] ActivationError),

    /// A served object rejected a method call
    #[error("invalid call: {0}")]
    InvalidCall(String),
}

impl ServerError {
    /// Status code for this error
    pub fn hresult(&self) -> u32 {
        match self {
            Self::RegistrationFailed(code)
            | Self::RevocationFailed(code)
            | Self::SecurityInitFailed(code) => *code,
            Self::ClassNotRegistered(_) => hresult::REGDB_E_CLASSNOTREG,
            Self::InvalidState { .. } => hresult::E_FAIL,
            Self::Activation(e) => e.hresult(),
            Self::InvalidCall(_) => hresult::E_INVALIDARG,
        }
    }
}

/// HRESULT codes used at the activation boundary
pub mod hresult {
    /// Operation successful
    pub const S_OK: u32 = 0x00000000;
    /// Catastrophic failure
    pub const E_UNEXPECTED: u32 = 0x8000FFFF;
    /// Unspecified error
    pub const E_FAIL: u32 = 0x80004005;
    /// No such interface supported
    pub const E_NOINTERFACE: u32 = 0x80004002;
    /// Invalid argument
    pub const E_INVALIDARG: u32 = 0x80070057;
    /// Class does not support aggregation
    pub const CLASS_E_NOAGGREGATION: u32 = 0x80040110;
    /// Class not registered
    pub const REGDB_E_CLASSNOTREG: u32 = 0x80040154;
    /// Object is not registered (bad registration cookie)
    pub const CO_E_OBJNOTREG: u32 = 0x800401FB;
    /// Security already initialized
    pub const RPC_E_TOO_LATE: u32 = 0x80010119;

    /// Check whether a code reports failure (severity bit set)
    pub fn failed(code: u32) -> bool {
        code & 0x8000_0000 != 0
    }

    /// Check whether a code reports success
    pub fn succeeded(code: u32) -> bool {
        !failed(code)
    }
}
