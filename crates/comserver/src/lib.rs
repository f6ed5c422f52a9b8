//! Out-of-process COM class-factory host
//!
//! This crate hosts one activatable class: it registers a class factory
//! with the activation registry, hands out server objects on request,
//! and keeps the host alive exactly as long as clients hold references.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               ServerLifecycleController                     │
//! │  register ─► serve (maintenance tick) ─► drain ─► revoke    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ActivationDispatcher (IClassFactory)                       │
//! │  - CreateInstance: IID check, object + TrackingHandle       │
//! │  - LockServer: explicit pins                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ReferenceTracker: atomic count + one-shot shutdown gate    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ActivationRegistry (platform seam) / InProcessRegistry     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`]: CLSID/IID identifiers, errors, HRESULT codes
//! - [`tracker`]: reference counting and the shutdown gate
//! - [`activation`]: the class factory and served objects
//! - [`registry`]: class registration and in-process activation
//! - [`lifecycle`]: configuration and the server session

pub mod types;
pub mod tracker;
pub mod activation;
pub mod registry;
pub mod lifecycle;

// Re-export main types
pub use types::{hresult, ActivationError, Clsid, Iid, Result, ServerError};
pub use tracker::{GateState, ReferenceTracker, TrackingHandle};
pub use activation::{
    ActivationContext, ActivationDispatcher, CallFuture, CallResult, ClassObject,
    ObjectFactory, ObjectReference, ServerObject,
};
pub use registry::{
    capabilities, ActivationRegistry, ActivationRequest, AuthnLevel, ClassContext, ImpLevel,
    InProcessRegistry, RegistrationHandle, RegistrationMode, SecurityParams,
};
pub use lifecycle::{
    LifecycleState, MaintenanceTask, ServerConfig, ServerConfigBuilder,
    ServerLifecycleController, ShutdownOutcome, TrackerReport,
};
