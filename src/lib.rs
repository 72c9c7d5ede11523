#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]

//! A crate implementing the UDS/OBD-II diagnostic protocol layer that rides on
//! top of ISO-TP (ISO 15765-2) over a CAN bus.
//!
//! The crate is a client: an application composes a [`request::Request`]
//! (mode, optional PID, optional payload, target arbitration ID), obtains an
//! in-progress [`handle::RequestHandle`] via [`request()`] or
//! [`generate_request()`], feeds received CAN frames into that handle with
//! [`receive_can_frame()`], and receives a fully assembled positive or
//! negative [`response::Response`].
//!
//! The library is single-threaded and cooperative: it performs no I/O other
//! than the injected [`shims::Shims`] capabilities, runs no background
//! threads, and does all of its work synchronously inside the two entry
//! points above. CAN bus transmission and (optionally) timer scheduling are
//! supplied by the embedding application; everything else — ISO-TP
//! reassembly, UDS framing, negative-response decoding, functional broadcast
//! fan-out — is implemented here.

pub mod codec;
pub mod dtc;
pub mod handle;
pub mod isotp;
pub mod obd2;
pub mod request;
pub mod response;
pub mod shims;
pub mod stubs;

pub use handle::{
    generate_request, receive_can_frame, request, request_pid, request_sent, start_request,
};
pub use obd2::{decode_obd2_pid, payload_to_integer};
pub use request::{request_equals, request_to_string, Request};
pub use response::{response_to_string, Nrc, Response};
pub use shims::{init_shims, Shims};

/// Result type returned by the fallible operations in this crate.
pub type DiagServerResult<T> = Result<T, DiagError>;

/// Errors this crate can report.
///
/// Deliberately flat: one server error enum rather than a tree of
/// per-module errors.
#[derive(Debug, thiserror::Error)]
pub enum DiagError {
    /// A [`request::Request`] violated one of its documented invariants
    /// (`payload_length <= 7`, `pid_length in {0,1,2}`).
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    /// One of the VIN, DTC list/clear, MIL status, or PID enumeration
    /// operations, none of which this crate implements. See [`stubs`].
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    /// Error from the underlying ISO-TP engine's configuration entry points.
    #[error("ISO-TP error: {0}")]
    IsoTp(#[from] isotp::IsoTpError),
}
