//! DTC request classification.
//!
//! This exists only to give [`crate::stubs::request_dtc`] a meaningful
//! signature; no DTC encoding/decoding logic is implemented.

/// Which class of trouble code a [`crate::stubs::request_dtc`] call asks for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DtcRequestType {
    /// Mode 0x03 — stored (emissions-related) DTCs.
    Emissions,
    /// Mode 0x07 — pending DTCs from the current or last drive cycle.
    DriveCycle,
    /// Mode 0x0A — permanent DTCs.
    Permanent,
}
