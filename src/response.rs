//! Response value type and the negative-response-code enumeration.

use crate::request::BoundedWriter;
use std::fmt::Write as _;

/// Maximum length of a [`Response::payload`] — large enough for the
/// multi-frame VIN response scenario (18 bytes) and any other ISO-TP message
/// this crate's receive engine can reassemble.
pub const MAX_RESPONSE_PAYLOAD_LENGTH: usize = 127;

/// All negative response codes (NRCs) this crate recognizes by name, plus an
/// opaque passthrough for anything else an ECU might send.
///
/// The recognized set stays exactly the eleven values this protocol layer
/// names, not the full ISO 14229 NRC table a generic UDS crate would carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Nrc {
    /// 0x00 — not actually a failure; present for completeness.
    Success,
    /// 0x11 — the ECU does not support this service at all.
    ServiceNotSupported,
    /// 0x12 — the ECU supports the service but not this sub-function.
    SubFunctionNotSupported,
    /// 0x13 — the request message length or format was wrong.
    IncorrectLengthOrFormat,
    /// 0x22 — the request is valid but the ECU's current state disallows it.
    ConditionsNotCorrect,
    /// 0x31 — a parameter in the request is out of range.
    RequestOutOfRange,
    /// 0x33 — the requested action needs a security level not yet unlocked.
    SecurityAccessDenied,
    /// 0x35 — a SecurityAccess key was rejected.
    InvalidKey,
    /// 0x36 — too many failed SecurityAccess attempts.
    TooManyAttempts,
    /// 0x37 — a SecurityAccess retry arrived before the mandated delay.
    TimeDelayNotExpired,
    /// 0x78 — the ECU accepted the request but needs more time; a final
    /// response follows later.
    ResponsePending,
    /// Any other byte, reported opaquely rather than clamped or zeroed.
    Other(u8),
}

impl Nrc {
    /// The raw wire byte for this NRC.
    pub fn code(self) -> u8 {
        match self {
            Nrc::Success => 0x00,
            Nrc::ServiceNotSupported => 0x11,
            Nrc::SubFunctionNotSupported => 0x12,
            Nrc::IncorrectLengthOrFormat => 0x13,
            Nrc::ConditionsNotCorrect => 0x22,
            Nrc::RequestOutOfRange => 0x31,
            Nrc::SecurityAccessDenied => 0x33,
            Nrc::InvalidKey => 0x35,
            Nrc::TooManyAttempts => 0x36,
            Nrc::TimeDelayNotExpired => 0x37,
            Nrc::ResponsePending => 0x78,
            Nrc::Other(raw) => raw,
        }
    }
}

impl Default for Nrc {
    fn default() -> Self {
        Nrc::Success
    }
}

impl From<u8> for Nrc {
    fn from(raw: u8) -> Self {
        match raw {
            0x00 => Nrc::Success,
            0x11 => Nrc::ServiceNotSupported,
            0x12 => Nrc::SubFunctionNotSupported,
            0x13 => Nrc::IncorrectLengthOrFormat,
            0x22 => Nrc::ConditionsNotCorrect,
            0x31 => Nrc::RequestOutOfRange,
            0x33 => Nrc::SecurityAccessDenied,
            0x35 => Nrc::InvalidKey,
            0x36 => Nrc::TooManyAttempts,
            0x37 => Nrc::TimeDelayNotExpired,
            0x78 => Nrc::ResponsePending,
            other => Nrc::Other(other),
        }
    }
}

impl std::fmt::Display for Nrc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02x}", self.code())
    }
}

/// A partially or fully completed response to a [`crate::Request`].
///
/// `completed` must be checked before acting on any other field: several
/// entry points return a `Response` even when the underlying handle is still
/// in progress (see [`crate::receive_can_frame`]).
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Response {
    /// True once the request is complete, successfully or not.
    pub completed: bool,
    /// Only meaningful if `completed` is true. `false` means
    /// `negative_response_code` explains the failure.
    pub success: bool,
    /// True if reassembling this response required more than one CAN frame.
    pub multi_frame: bool,
    /// Arbitration ID the response was received on.
    pub arbitration_id: u32,
    /// The request's mode, echoed back (with the positive-response +0x40
    /// offset already stripped).
    pub mode: u8,
    /// Whether this is a response to a PID request; if so, `pid` is valid.
    pub has_pid: bool,
    /// The echoed PID, valid only if `has_pid`.
    pub pid: u16,
    /// Meaningful only when `completed && !success`.
    pub negative_response_code: Nrc,
    /// Response payload, up to [`MAX_RESPONSE_PAYLOAD_LENGTH`] bytes. Only
    /// the first `payload_length` bytes are meaningful.
    pub payload: [u8; MAX_RESPONSE_PAYLOAD_LENGTH],
    /// Number of meaningful bytes in `payload`.
    pub payload_length: u8,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            completed: false,
            success: false,
            multi_frame: false,
            arbitration_id: 0,
            mode: 0,
            has_pid: false,
            pid: 0,
            negative_response_code: Nrc::Success,
            payload: [0; MAX_RESPONSE_PAYLOAD_LENGTH],
            payload_length: 0,
        }
    }
}

impl Response {
    /// Effective payload slice, respecting `payload_length`.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_length as usize]
    }
}

/// Renders `response` into `destination`, truncating rather than overflowing
/// the buffer, and returns the written portion as a `&str`.
///
/// Format: `"arb_id: 0xHH, mode: 0xHH, [pid: 0xHH, ][nrc: 0xHH, ]payload: 0x.. | no payload"`.
pub fn response_to_string<'a>(response: &Response, destination: &'a mut [u8]) -> &'a str {
    let mut buf = BoundedWriter::new(destination);
    let _ = write!(
        buf,
        "arb_id: 0x{:x}, mode: 0x{:x}, ",
        response.arbitration_id, response.mode
    );
    if response.has_pid {
        let _ = write!(buf, "pid: 0x{:x}, ", response.pid);
    }
    if !response.success {
        let _ = write!(buf, "nrc: 0x{:02x}, ", response.negative_response_code.code());
    }
    if response.payload_length > 0 {
        let _ = buf.write_str("payload: 0x");
        for byte in response.payload() {
            let _ = write!(buf, "{:02x}", byte);
        }
    } else {
        let _ = buf.write_str("no payload");
    }
    buf.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nrc_round_trips_known_codes() {
        for &code in &[0x00, 0x11, 0x12, 0x13, 0x22, 0x31, 0x33, 0x35, 0x36, 0x37, 0x78] {
            assert_eq!(Nrc::from(code).code(), code);
        }
    }

    #[test]
    fn unknown_nrc_passes_through_opaquely() {
        let nrc = Nrc::from(0x99);
        assert_eq!(nrc, Nrc::Other(0x99));
        assert_eq!(nrc.code(), 0x99);
    }

    #[test]
    fn to_string_includes_nrc_only_on_failure() {
        let mut resp = Response {
            completed: true,
            success: false,
            negative_response_code: Nrc::ServiceNotSupported,
            mode: 0x01,
            arbitration_id: 0x108,
            ..Default::default()
        };
        let mut buf = [0u8; 64];
        assert!(response_to_string(&resp, &mut buf).contains("nrc: 0x11"));

        resp.success = true;
        let mut buf2 = [0u8; 64];
        assert!(!response_to_string(&resp, &mut buf2).contains("nrc"));
    }
}
