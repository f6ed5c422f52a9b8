//! Time service payload
//!
//! `ITimeService::GetDateTime(prefix)` returns the server's wall-clock
//! time and the name of the executable serving the call.

use std::any::Any;
use std::time::SystemTime;
use bytes::Bytes;
use comserver::{ActivationContext, ActivationDispatcher, CallFuture, Clsid, Iid, ServerError, ServerObject};

// =============================================================================
// COM Identifiers
// =============================================================================

/// CLSID of the time service class
pub const TIME_SERVICE_CLSID: Clsid = Clsid::from_u128(0xf681abd0_41de_46c8_9ed3_d0f4eba19891);

/// IID of ITimeService
pub const ITIME_SERVICE_IID: Iid = Iid::from_u128(0xe88d15a5_0510_4115_9aee_a8421c96decb);

/// Operation numbers for ITimeService
pub mod opnum {
    /// GetDateTime(prefix) -> string
    pub const GET_DATE_TIME: u16 = 0;
}

/// Server-side time service object
#[derive(Debug)]
pub struct TimeService {
    serial: u64,
    module_name: String,
}

impl TimeService {
    /// Build an instance for one activation
    pub fn new(ctx: &ActivationContext) -> Self {
        Self {
            serial: ctx.serial,
            module_name: module_name(),
        }
    }

    /// Instance serial assigned at activation
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Format the reply for `GetDateTime`
    pub fn get_date_time(&self, prefix: &str) -> String {
        format!(
            "{}: {} [server-side COM call executed on {}]",
            prefix,
            humantime::format_rfc3339_seconds(SystemTime::now()),
            self.module_name
        )
    }
}

impl ServerObject for TimeService {
    fn interface_id(&self) -> Iid {
        ITIME_SERVICE_IID
    }

    fn invoke(&self, op: u16, args: Bytes) -> CallFuture {
        let result = match op {
            opnum::GET_DATE_TIME => match std::str::from_utf8(&args) {
                Ok(prefix) => Ok(Bytes::from(self.get_date_time(prefix))),
                Err(e) => Err(ServerError::InvalidCall(format!("prefix is not UTF-8: {e}"))),
            },
            other => Err(ServerError::InvalidCall(format!("unknown opnum {other}"))),
        };
        Box::pin(async move { result })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Class factory for the time service
pub fn time_service_dispatcher() -> ActivationDispatcher {
    ActivationDispatcher::from_fn(TIME_SERVICE_CLSID, ITIME_SERVICE_IID, TimeService::new)
}

fn module_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string())
}
