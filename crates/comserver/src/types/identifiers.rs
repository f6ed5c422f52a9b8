//! COM identifier types
//!
//! Both identifiers are 128-bit GUIDs:
//! - CLSID: names an activatable class
//! - IID: names the contract an activation request expects

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Class Identifier (16 bytes / GUID)
///
/// Fixed at registration time; one per hosted class.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Clsid(pub Uuid);

impl Clsid {
    /// Create a CLSID from its 128-bit value
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Generate a random CLSID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for Clsid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Debug for Clsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CLSID({})", self.0)
    }
}

impl fmt::Display for Clsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

/// Interface Identifier (16 bytes / GUID)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Iid(pub Uuid);

impl Iid {
    /// IUnknown, accepted by every class as "any interface"
    pub const IUNKNOWN: Iid = Iid::from_u128(0x00000000_0000_0000_c000_000000000046);

    /// IClassFactory
    pub const ICLASSFACTORY: Iid = Iid::from_u128(0x00000001_0000_0000_c000_000000000046);

    /// Create an IID from its 128-bit value
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Generate a random IID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Check if this is the IUnknown IID
    pub fn is_unknown(&self) -> bool {
        *self == Self::IUNKNOWN
    }
}

impl FromStr for Iid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Debug for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IID({})", self.0)
    }
}

impl fmt::Display for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}
