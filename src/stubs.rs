//! Unimplemented extra operations.
//!
//! VIN read, DTC read/clear, MIL status, and PID enumeration all have a
//! well-defined shape but no implementation here. Rather than omit them or
//! invent behavior, each one keeps its documented signature and returns a
//! typed error.

use crate::dtc::DtcRequestType;
use crate::handle::RequestHandle;
use crate::request::Request;
use crate::response::Response;
use crate::shims::Shims;
use crate::{DiagError, DiagServerResult};

/// Not implemented. Would request the malfunction-indicator-lamp status.
pub fn request_mil_status(
    _shims: &Shims,
    _callback: Option<Box<dyn FnMut(&Response)>>,
) -> DiagServerResult<RequestHandle> {
    Err(DiagError::NotImplemented("request_mil_status"))
}

/// Not implemented. Would request the vehicle identification number.
pub fn request_vin(
    _shims: &Shims,
    _callback: Option<Box<dyn FnMut(&Response)>>,
) -> DiagServerResult<RequestHandle> {
    Err(DiagError::NotImplemented("request_vin"))
}

/// Not implemented. Would request DTCs of the given type.
pub fn request_dtc(
    _shims: &Shims,
    _kind: DtcRequestType,
    _callback: Option<Box<dyn FnMut(&Response)>>,
) -> DiagServerResult<RequestHandle> {
    Err(DiagError::NotImplemented("request_dtc"))
}

/// Not implemented. Would clear stored DTCs.
pub fn clear_dtc(_shims: &Shims) -> DiagServerResult<()> {
    Err(DiagError::NotImplemented("clear_dtc"))
}

/// Not implemented. Would enumerate which PIDs an ECU supports.
pub fn enumerate_pids(
    _shims: &Shims,
    _request: &Request,
    _callback: Option<Box<dyn FnMut(&Response)>>,
) -> DiagServerResult<RequestHandle> {
    Err(DiagError::NotImplemented("enumerate_pids"))
}
