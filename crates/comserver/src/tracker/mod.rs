//! Server reference tracking
//!
//! - `ReferenceTracker`: atomic count plus the shutdown gate
//! - `TrackingHandle`: one count held by each served object

mod reference_tracker;
mod tracking_handle;

pub use reference_tracker::*;
pub use tracking_handle::*;
