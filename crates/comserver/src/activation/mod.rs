//! Object activation (IClassFactory)
//!
//! - CreateInstance - construct a served object for a client
//! - LockServer - explicit keep-alive pins from the runtime

mod dispatcher;
mod object;

pub use dispatcher::*;
pub use object::*;
