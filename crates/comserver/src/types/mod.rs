//! Core COM types
//!
//! - Identifiers: CLSID, IID
//! - Error taxonomy and HRESULT codes

mod error;
mod identifiers;

pub use error::*;
pub use identifiers::{Clsid, Iid};
