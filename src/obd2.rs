//! OBD-II Mode 01 PID numeric decoding.

use crate::response::Response;

/// Interprets `response`'s payload as a big-endian unsigned integer.
///
/// Used both directly by callers that want raw integer PIDs and as the
/// fallback case of [`decode_obd2_pid`] for PIDs with no named formula.
pub fn payload_to_integer(response: &Response) -> u64 {
    response
        .payload()
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | byte as u64)
}

/// Applies the standard OBD-II Mode 01 formula for `response.pid` to its
/// payload, returning the decoded physical value.
///
/// PIDs with no formula below fall back to [`payload_to_integer`] (cast to
/// `f64`), which is also useful as a diagnostic when a caller passes in a PID
/// this table doesn't recognize.
pub fn decode_obd2_pid(response: &Response) -> f64 {
    let p = response.payload();
    match response.pid {
        0x0a => p.first().copied().unwrap_or(0) as f64 * 3.0,
        0x0c => {
            let a = p.first().copied().unwrap_or(0) as f64;
            let b = p.get(1).copied().unwrap_or(0) as f64;
            (a * 256.0 + b) / 4.0
        }
        0x0b | 0x0d | 0x33 => p.first().copied().unwrap_or(0) as f64,
        0x10 => {
            let a = p.first().copied().unwrap_or(0) as f64;
            let b = p.get(1).copied().unwrap_or(0) as f64;
            (a * 256.0 + b) / 100.0
        }
        0x04 | 0x11 | 0x2f | 0x45 | 0x4c | 0x52 | 0x5a => {
            p.first().copied().unwrap_or(0) as f64 * 100.0 / 255.0
        }
        0x05 | 0x0f | 0x46 | 0x5c => p.first().copied().unwrap_or(0) as f64 - 40.0,
        0x62 => p.first().copied().unwrap_or(0) as f64 - 125.0,
        _ => payload_to_integer(response) as f64,
    }
}
