//! UDS/OBD-II payload encode/decode.

use crate::request::Request;
use crate::response::{Nrc, Response};

/// Encodes `request` into an ISO-TP payload, returning the bytes and the
/// number of meaningful bytes.
///
/// Applies the auto-sizing rule when `request.pid_length` is 0: the
/// effective PID length is derived from the mode and the PID's value rather
/// than left ambiguous.
pub fn encode(request: &Request) -> [u8; 7] {
    let mut payload = [0u8; 7];
    payload[0] = request.mode;
    let mut offset = 1usize;

    if request.has_pid {
        let pid_length = effective_pid_length(request);
        if pid_length == 2 {
            payload[1] = (request.pid >> 8) as u8;
            payload[2] = request.pid as u8;
        } else {
            payload[1] = request.pid as u8;
        }
        offset += pid_length;
    }

    let payload_length = request.payload_length as usize;
    payload[offset..offset + payload_length].copy_from_slice(&request.payload()[..payload_length]);
    payload
}

/// Number of bytes [`encode`] writes for `request`: `1 + pid_length +
/// payload_length`.
pub fn encoded_length(request: &Request) -> usize {
    let pid_length = if request.has_pid {
        effective_pid_length(request)
    } else {
        0
    };
    1 + pid_length + request.payload_length as usize
}

pub(crate) fn effective_pid_length(request: &Request) -> usize {
    if request.pid_length != 0 {
        return request.pid_length as usize;
    }
    if request.mode <= 0x0a || request.mode == 0x3e {
        1
    } else if request.pid > 0xff {
        2
    } else {
        1
    }
}

/// Decodes a reassembled ISO-TP message against the `request` that solicited
/// it.
///
/// Returns `None` when the message is a mismatch (wrong mode-echo, wrong
/// PID): the caller must leave the handle open rather than treat this as
/// completion.
pub fn decode(payload: &[u8], request: &Request) -> Option<Response> {
    if payload.is_empty() {
        return None;
    }

    let m = payload[0];
    if m == 0x7f {
        let echoed_mode = payload.get(1).copied().unwrap_or(0);
        let nrc = payload.get(2).copied().map(Nrc::from).unwrap_or(Nrc::Success);
        return Some(Response {
            completed: true,
            success: false,
            mode: echoed_mode,
            negative_response_code: nrc,
            ..Default::default()
        });
    }

    if m != request.mode.wrapping_add(0x40) {
        return None;
    }

    let mut response = Response {
        completed: true,
        success: true,
        mode: request.mode,
        ..Default::default()
    };

    let mut offset = 1usize;
    if request.has_pid {
        let pid_length = effective_pid_length(request);
        if payload.len() <= 1 {
            return None;
        }
        let pid = if pid_length == 2 {
            if payload.len() < 3 {
                return None;
            }
            ((payload[1] as u16) << 8) | payload[2] as u16
        } else {
            payload[1] as u16
        };
        if pid != request.pid {
            return None;
        }
        response.has_pid = true;
        response.pid = pid;
        offset += pid_length;
    }

    let remaining = payload.len().saturating_sub(offset);
    let copy_len = remaining.min(response.payload.len());
    response.payload[..copy_len].copy_from_slice(&payload[offset..offset + copy_len]);
    response.payload_length = copy_len as u8;

    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::mode;

    #[test]
    fn encode_auto_sizes_standard_pid_to_one_byte() {
        let request = Request {
            mode: mode::POWERTRAIN_DIAGNOSTIC_REQUEST,
            has_pid: true,
            pid: 0x02,
            ..Default::default()
        };
        let payload = encode(&request);
        assert_eq!(encoded_length(&request), 2);
        assert_eq!(&payload[..2], &[0x01, 0x02]);
    }

    #[test]
    fn encode_auto_sizes_enhanced_pid_to_two_bytes() {
        let request = Request {
            mode: mode::ENHANCED_DIAGNOSTIC_REQUEST,
            has_pid: true,
            pid: 0x1234,
            ..Default::default()
        };
        let payload = encode(&request);
        assert_eq!(encoded_length(&request), 3);
        assert_eq!(&payload[..3], &[0x22, 0x12, 0x34]);
    }

    #[test]
    fn encode_appends_payload_after_pid() {
        let request = Request {
            mode: 0x2e,
            has_pid: true,
            pid: 0xf190,
            payload_length: 2,
            payload: [0xaa, 0xbb, 0, 0, 0, 0, 0],
            ..Default::default()
        };
        let payload = encode(&request);
        assert_eq!(encoded_length(&request), 5);
        assert_eq!(&payload[..5], &[0x2e, 0xf1, 0x90, 0xaa, 0xbb]);
    }

    #[test]
    fn decode_negative_response() {
        let request = Request {
            mode: 0x01,
            ..Default::default()
        };
        let response = decode(&[0x7f, 0x01, 0x11], &request).unwrap();
        assert!(response.completed);
        assert!(!response.success);
        assert_eq!(response.negative_response_code, Nrc::ServiceNotSupported);
        assert_eq!(response.mode, 0x01);
    }

    #[test]
    fn decode_positive_non_pid() {
        let request = Request {
            mode: 0x03,
            ..Default::default()
        };
        let response = decode(&[0x43, 0x23], &request).unwrap();
        assert!(response.completed);
        assert!(response.success);
        assert_eq!(response.payload(), &[0x23]);
    }

    #[test]
    fn decode_rejects_pid_mismatch() {
        let request = Request {
            mode: 0x22,
            has_pid: true,
            pid: 0x1234,
            ..Default::default()
        };
        assert!(decode(&[0x62, 0x12, 0x33, 0x45], &request).is_none());
        let response = decode(&[0x62, 0x12, 0x34, 0x45], &request).unwrap();
        assert_eq!(response.pid, 0x1234);
        assert_eq!(response.payload(), &[0x45]);
    }

    #[test]
    fn decode_treats_missing_pid_bytes_as_mismatch() {
        let request = Request {
            mode: 0x09,
            has_pid: true,
            pid: 0x02,
            ..Default::default()
        };
        assert!(decode(&[0x49], &request).is_none());
    }
}
