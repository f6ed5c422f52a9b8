//! Process security parameters for the activation transport

/// Authentication level (RPC_C_AUTHN_LEVEL_*)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum AuthnLevel {
    Default = 0,
    None = 1,
    Connect = 2,
    Call = 3,
    Pkt = 4,
    PktIntegrity = 5,
    /// Encrypted traffic
    #[default]
    PktPrivacy = 6,
}

/// Impersonation level (RPC_C_IMP_LEVEL_*)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ImpLevel {
    Default = 0,
    Anonymous = 1,
    /// Server may read the caller's identity but not act as it
    #[default]
    Identify = 2,
    Impersonate = 3,
    Delegate = 4,
}

/// Authentication capability flags (EOAC_*)
pub mod capabilities {
    pub const NONE: u32 = 0x0;
    pub const MUTUAL_AUTH: u32 = 0x1;
    pub const SECURE_REFS: u32 = 0x2;
    pub const DISABLE_AAA: u32 = 0x1000;
    pub const NO_CUSTOM_MARSHAL: u32 = 0x2000;
}

/// Security parameter block applied once at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityParams {
    pub authn_level: AuthnLevel,
    pub imp_level: ImpLevel,
    pub capabilities: u32,
}

impl Default for SecurityParams {
    fn default() -> Self {
        Self {
            authn_level: AuthnLevel::PktPrivacy,
            imp_level: ImpLevel::Identify,
            capabilities: capabilities::DISABLE_AAA
                | capabilities::SECURE_REFS
                | capabilities::NO_CUSTOM_MARSHAL,
        }
    }
}

impl SecurityParams {
    /// Set the authentication level
    pub fn authn_level(mut self, level: AuthnLevel) -> Self {
        self.authn_level = level;
        self
    }

    /// Set the impersonation level
    pub fn imp_level(mut self, level: ImpLevel) -> Self {
        self.imp_level = level;
        self
    }

    /// Set the capability flags
    pub fn capabilities(mut self, flags: u32) -> Self {
        self.capabilities = flags;
        self
    }

    /// Check for a capability flag
    pub fn has_capability(&self, flag: u32) -> bool {
        self.capabilities & flag == flag
    }
}
