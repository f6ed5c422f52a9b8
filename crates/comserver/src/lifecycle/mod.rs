//! Server lifecycle
//!
//! Registration, the maintenance tick, and the shutdown policy that ties
//! the host process to its outstanding references.

mod config;
mod controller;
mod maintenance;

pub use config::*;
pub use controller::*;
pub use maintenance::*;
