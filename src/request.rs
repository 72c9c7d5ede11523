//! Request value type and the OBD-II mode constants it's framed with.

use std::fmt::Write as _;

/// Upper bound on [`Request::payload`]'s backing array.
///
/// Not every request can use all 7 bytes: [`Request::validate`] also enforces
/// the ISO-TP single-frame bound that `1 (mode) + pid_length + payload_length`
/// fit in [`crate::isotp::MAX_SINGLE_FRAME_PAYLOAD_LENGTH`] (6) bytes.
pub const MAX_REQUEST_PAYLOAD_LENGTH: usize = 7;

/// The broadcast arbitration ID: a request sent here solicits a response
/// from every ECU listening on 0x7E8..0x7EF.
pub const FUNCTIONAL_BROADCAST_ID: u32 = 0x7df;

/// Friendly names for the OBD-II modes this crate understands by number.
/// Any other `u8` in `1..=0x3e` is a valid, if unnamed, mode.
pub mod mode {
    /// Show current data.
    pub const POWERTRAIN_DIAGNOSTIC_REQUEST: u8 = 0x01;
    /// Show freeze frame data.
    pub const POWERTRAIN_FREEZE_FRAME_REQUEST: u8 = 0x02;
    /// Show stored (emissions-related) DTCs.
    pub const EMISSIONS_DTC_REQUEST: u8 = 0x03;
    /// Clear DTCs and stored values.
    pub const EMISSIONS_DTC_CLEAR: u8 = 0x04;
    /// Test results, oxygen sensor monitoring (non-CAN only).
    pub const TEST_RESULTS: u8 = 0x06;
    /// Show pending DTCs detected during current or last driving cycle.
    pub const DRIVE_CYCLE_DTC_REQUEST: u8 = 0x07;
    /// Control operation of on-board component/system.
    pub const CONTROL: u8 = 0x08;
    /// Request vehicle information.
    pub const VEHICLE_INFORMATION: u8 = 0x09;
    /// Show permanent DTCs.
    pub const PERMANENT_DTC_REQUEST: u8 = 0x0a;
    /// Manufacturer-specific PID request. Not technically OBD-II Mode 01-0A,
    /// but both the major enhanced diagnostic standards put their PID
    /// requests here.
    pub const ENHANCED_DIAGNOSTIC_REQUEST: u8 = 0x22;
    /// Tester present, used to keep an extended diagnostic session alive.
    pub const TESTER_PRESENT: u8 = 0x3e;
}

/// Which flavor of PID a [`crate::request_pid`] call is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidRequestType {
    /// Mode 0x01, 1-byte PID — the standard OBD-II "show current data" PIDs.
    Standard,
    /// Mode 0x22, 2-byte PID — manufacturer-specific / enhanced PIDs.
    Enhanced,
}

/// A single diagnostic request.
///
/// The only required fields are `arbitration_id` and `mode`; everything else
/// defaults to "absent" (`Default::default()` gives a request with no PID
/// and no payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Request {
    /// Arbitration ID to send the request to. [`FUNCTIONAL_BROADCAST_ID`] for
    /// functional broadcast.
    pub arbitration_id: u32,
    /// The OBD-II/UDS mode (service ID) for the request.
    pub mode: u8,
    /// Whether this request carries a PID.
    pub has_pid: bool,
    /// The PID, if `has_pid` is set. Ignored otherwise.
    pub pid: u16,
    /// Length in bytes of the PID field: 1, 2, or 0 to auto-derive (see
    /// [`crate::codec::encode`]). Ignored if `has_pid` is false.
    pub pid_length: u8,
    /// Request payload, up to [`MAX_REQUEST_PAYLOAD_LENGTH`] bytes. Only the
    /// first `payload_length` bytes are meaningful.
    pub payload: [u8; MAX_REQUEST_PAYLOAD_LENGTH],
    /// Number of meaningful bytes in `payload`.
    pub payload_length: u8,
    /// If true, outbound CAN frames are sent at their exact data length
    /// instead of being padded to 8 bytes. Most ECUs expect padding, hence
    /// the default of `false`.
    pub no_frame_padding: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            arbitration_id: 0,
            mode: 0,
            has_pid: false,
            pid: 0,
            pid_length: 0,
            payload: [0; MAX_REQUEST_PAYLOAD_LENGTH],
            payload_length: 0,
            no_frame_padding: false,
        }
    }
}

impl Request {
    /// Returns `Err` if `payload_length` or `pid_length` violate their
    /// documented bounds. Called by [`crate::generate_request`] before a
    /// handle is ever created for this request.
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.payload_length as usize > MAX_REQUEST_PAYLOAD_LENGTH {
            return Err("payload_length exceeds MAX_REQUEST_PAYLOAD_LENGTH");
        }
        if self.pid_length > 2 {
            return Err("pid_length must be 0, 1, or 2");
        }
        let pid_length = if self.has_pid {
            crate::codec::effective_pid_length(self)
        } else {
            0
        };
        if 1 + pid_length + self.payload_length as usize
            > crate::isotp::MAX_SINGLE_FRAME_PAYLOAD_LENGTH
        {
            return Err("mode + pid + payload exceeds the single-frame encoding bound");
        }
        Ok(())
    }

    /// Effective payload slice, respecting `payload_length`.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_length as usize]
    }
}

/// Two requests are considered equal for matching purposes iff their
/// arbitration ID, mode, `has_pid`, and PID all agree. The payload is
/// deliberately not compared: it identifies what to *send*, not what
/// response a given request is waiting for.
pub fn request_equals(ours: &Request, theirs: &Request) -> bool {
    ours.arbitration_id == theirs.arbitration_id
        && ours.mode == theirs.mode
        && ours.has_pid == theirs.has_pid
        && ours.pid == theirs.pid
}

/// Renders `request` into `destination`, truncating rather than overflowing
/// the buffer, and returns the written portion as a `&str`.
///
/// Format: `"arb_id: 0xHH, mode: 0xHH, [pid: 0xHH, ]payload: 0x.. | no payload"`.
pub fn request_to_string<'a>(request: &Request, destination: &'a mut [u8]) -> &'a str {
    let mut buf = BoundedWriter::new(destination);
    let _ = write!(buf, "arb_id: 0x{:x}, mode: 0x{:x}, ", request.arbitration_id, request.mode);
    if request.has_pid {
        let _ = write!(buf, "pid: 0x{:x}, ", request.pid);
    }
    if request.payload_length > 0 {
        let _ = buf.write_str("payload: 0x");
        for byte in request.payload() {
            let _ = write!(buf, "{:02x}", byte);
        }
    } else {
        let _ = buf.write_str("no payload");
    }
    buf.finish()
}

/// A `fmt::Write` sink over a fixed `&mut [u8]` that silently truncates
/// rather than erroring once the buffer fills, so callers never see a
/// panic or a lost write from a too-small scratch buffer.
pub(crate) struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> BoundedWriter<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    pub(crate) fn finish(self) -> &'a str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl std::fmt::Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let remaining = self.buf.len() - self.len;
        let take = remaining.min(s.len());
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_ignores_payload() {
        let a = Request {
            arbitration_id: 0x100,
            mode: 0x22,
            has_pid: true,
            pid: 0x1234,
            payload_length: 1,
            payload: [0xaa, 0, 0, 0, 0, 0, 0],
            ..Default::default()
        };
        let mut b = a;
        b.payload = [0xbb; MAX_REQUEST_PAYLOAD_LENGTH];
        assert!(request_equals(&a, &b));
        b.pid = 0x1235;
        assert!(!request_equals(&a, &b));
    }

    #[test]
    fn to_string_truncates_without_panicking() {
        let req = Request {
            arbitration_id: 0x100,
            mode: 0x22,
            has_pid: true,
            pid: 0x1234,
            payload_length: 3,
            payload: [1, 2, 3, 0, 0, 0, 0],
            ..Default::default()
        };
        let mut tiny = [0u8; 8];
        let rendered = request_to_string(&req, &mut tiny);
        assert!(rendered.len() <= 8);
    }

    #[test]
    fn to_string_no_payload() {
        let req = Request {
            arbitration_id: 0x100,
            mode: 0x01,
            ..Default::default()
        };
        let mut buf = [0u8; 64];
        assert_eq!(
            request_to_string(&req, &mut buf),
            "arb_id: 0x100, mode: 0x1, no payload"
        );
    }

    #[test]
    fn validate_rejects_oversized_payload_length() {
        let req = Request {
            payload_length: 8,
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_pid_length() {
        let req = Request {
            pid_length: 3,
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_rejects_payload_that_overflows_with_pid() {
        let req = Request {
            has_pid: true,
            pid_length: 2,
            payload_length: 6,
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let ok = Request {
            has_pid: true,
            pid_length: 2,
            payload_length: 3,
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }
}
