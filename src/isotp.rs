//! Minimal ISO-TP (ISO 15765-2) send/receive engine.
//!
//! Sends never exceed a single CAN frame: the diagnostic codec (see
//! [`crate::codec`]) bounds its encoded payload to 6 bytes, so `send` never
//! needs to build a first-frame/consecutive-frame sequence. Receive does need
//! the full first-frame/consecutive-frame/flow-control dance, since an ECU's
//! response (a VIN, say) can run well past 7 bytes.

use crate::shims::Shims;

/// Maximum reassembled message size this engine can hold.
pub const MAX_MESSAGE_LENGTH: usize = 127;

/// Maximum payload [`send`] will fit in a single ISO-TP frame.
///
/// The diagnostic codec's own encoding bound ([`crate::request::Request`]'s
/// `mode + pid + payload` total) is derived from this same 6-byte ceiling.
pub const MAX_SINGLE_FRAME_PAYLOAD_LENGTH: usize = 6;

const PCI_SINGLE_FRAME: u8 = 0x0;
const PCI_FIRST_FRAME: u8 = 0x1;
const PCI_CONSECUTIVE_FRAME: u8 = 0x2;
const PCI_FLOW_CONTROL: u8 = 0x3;

/// Errors from the ISO-TP engine's fallible configuration entry points.
///
/// Per-frame reassembly problems (an out-of-sequence consecutive frame, an
/// unrecognized PCI nibble) are logged and the offending frame dropped
/// rather than surfaced here.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IsoTpError {
    /// The payload handed to [`send`] does not fit in a single CAN frame.
    #[error("payload of {0} bytes does not fit a single ISO-TP frame")]
    PayloadTooLarge(usize),
    /// A consecutive frame arrived with a sequence number that did not match
    /// the expected next value.
    #[error("out-of-sequence consecutive frame")]
    OutOfSequence,
    /// A PCI nibble this engine does not understand.
    #[error("unknown ISO-TP frame type 0x{0:x}")]
    UnknownFrameType(u8),
}

/// Block size, separation time, and padding policy for the ISO-TP engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsoTpConfig {
    /// Number of consecutive frames a flow-control grant permits before the
    /// sender must wait for another. Written into outgoing flow-control
    /// frames; not independently enforced against inbound consecutive frames.
    pub block_size: u8,
    /// Minimum separation time (milliseconds) requested between consecutive
    /// frames, written into outgoing flow-control frames.
    pub st_min_ms: u8,
    /// Whether outbound CAN frames are padded to 8 bytes.
    pub pad_frames: bool,
}

impl Default for IsoTpConfig {
    fn default() -> Self {
        Self {
            block_size: 8,
            st_min_ms: 20,
            pad_frames: true,
        }
    }
}

/// A fully or partially reassembled ISO-TP message.
#[derive(Debug, Clone, Copy)]
pub struct Message {
    /// Reassembled payload.
    pub payload: [u8; MAX_MESSAGE_LENGTH],
    /// Meaningful length of `payload`.
    pub size: usize,
    /// True once reassembly finished.
    pub completed: bool,
    /// True if more than one CAN frame was needed.
    pub multi_frame: bool,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            payload: [0; MAX_MESSAGE_LENGTH],
            size: 0,
            completed: false,
            multi_frame: false,
        }
    }
}

impl Message {
    fn in_progress() -> Self {
        Self::default()
    }
}

/// Tracks a single-frame-bounded outbound ISO-TP transfer.
#[derive(Debug, Clone, Copy)]
pub struct SendHandle {
    /// True once the send is done (this engine only ever sends single
    /// frames, so this is true immediately after [`send`] returns).
    pub completed: bool,
    /// Whether the underlying `send_can` call reported success.
    pub success: bool,
    /// Destination arbitration id.
    pub arbitration_id: u32,
}

impl SendHandle {
    /// Consumes a flow-control frame addressed to this send. A no-op today:
    /// this engine never produces a multi-frame send for the diagnostic
    /// codec's payloads, so there is never consecutive-frame state to
    /// drive. Kept for symmetry with the receive side and as the hook a
    /// future multi-frame send path would extend.
    pub fn continue_send(&mut self, _arbitration_id: u32, _data: &[u8]) {}
}

/// Sends `payload` as a single ISO-TP frame on `arbitration_id`.
///
/// Returns `Err` if `payload` exceeds [`MAX_SINGLE_FRAME_PAYLOAD_LENGTH`] (6
/// bytes) — the diagnostic codec never produces more than that, so this is a
/// defensive bound, not a path this crate's own callers exercise.
pub fn send(
    shims: &Shims,
    config: &IsoTpConfig,
    arbitration_id: u32,
    payload: &[u8],
    pad: bool,
) -> Result<SendHandle, IsoTpError> {
    if payload.len() > MAX_SINGLE_FRAME_PAYLOAD_LENGTH {
        return Err(IsoTpError::PayloadTooLarge(payload.len()));
    }
    let mut frame = [0u8; 8];
    frame[0] = PCI_SINGLE_FRAME << 4 | payload.len() as u8;
    frame[1..1 + payload.len()].copy_from_slice(payload);
    let frame_len = if pad && config.pad_frames {
        8
    } else {
        1 + payload.len()
    };
    let success = shims.send_can(arbitration_id, &frame[..frame_len]);
    Ok(SendHandle {
        completed: true,
        success,
        arbitration_id,
    })
}

/// A single ISO-TP receive slot, reassembling frames addressed to
/// `listen_arbitration_id` and replying with flow control on
/// `reply_arbitration_id`.
#[derive(Debug, Clone, Copy)]
pub struct ReceiveHandle {
    /// Arbitration id this slot listens on.
    pub listen_arbitration_id: u32,
    /// Arbitration id flow-control frames are sent back to.
    pub reply_arbitration_id: u32,
    multi_frame: bool,
    buffer: [u8; MAX_MESSAGE_LENGTH],
    filled: usize,
    expected_length: usize,
    next_sequence: u8,
}

/// Opens a receive slot that reassembles frames addressed to
/// `listen_arbitration_id` and replies with flow control on
/// `reply_arbitration_id`, mirroring [`send`]'s free-function shape.
pub fn receive(listen_arbitration_id: u32, reply_arbitration_id: u32) -> ReceiveHandle {
    ReceiveHandle {
        listen_arbitration_id,
        reply_arbitration_id,
        multi_frame: false,
        buffer: [0; MAX_MESSAGE_LENGTH],
        filled: 0,
        expected_length: 0,
        next_sequence: 1,
    }
}

impl ReceiveHandle {
    /// True while this slot is in the middle of reassembling a multi-frame
    /// message (has seen a first frame but not yet the final consecutive
    /// frame). A slot that is not mid-reassembly is ready to start a fresh
    /// message on its next frame, which lets a single receive slot see
    /// several distinct single-frame messages in a row (e.g. a mismatched
    /// response followed by a matching one on the same arbitration id).
    pub fn mid_reassembly(&self) -> bool {
        self.multi_frame
    }

    fn reset(&mut self) {
        self.multi_frame = false;
        self.filled = 0;
        self.expected_length = 0;
        self.next_sequence = 1;
    }

    /// Feeds one inbound CAN frame to this slot. Frames not addressed to
    /// `listen_arbitration_id` are ignored and an empty, non-completed
    /// [`Message`] is returned.
    pub fn continue_receive(
        &mut self,
        shims: &Shims,
        config: &IsoTpConfig,
        arbitration_id: u32,
        data: &[u8],
    ) -> Message {
        if arbitration_id != self.listen_arbitration_id || data.is_empty() {
            return Message::in_progress();
        }

        let pci = data[0] >> 4;
        match pci {
            PCI_SINGLE_FRAME => {
                let len = (data[0] & 0x0f) as usize;
                let available = data.len().saturating_sub(1).min(len);
                let mut message = Message::in_progress();
                message.payload[..available].copy_from_slice(&data[1..1 + available]);
                message.size = available;
                message.completed = true;
                message.multi_frame = false;
                self.reset();
                message
            }
            PCI_FIRST_FRAME => {
                if data.len() < 2 {
                    log::warn!("isotp: first frame too short on 0x{:x}", arbitration_id);
                    return Message::in_progress();
                }
                let total_length =
                    (((data[0] & 0x0f) as usize) << 8) | data[1] as usize;
                self.expected_length = total_length.min(MAX_MESSAGE_LENGTH);
                let header_bytes = data.len().saturating_sub(2);
                let take = header_bytes.min(self.expected_length);
                self.buffer[..take].copy_from_slice(&data[2..2 + take]);
                self.filled = take;
                self.multi_frame = true;
                self.next_sequence = 1;

                let fc_frame = [
                    PCI_FLOW_CONTROL << 4,
                    config.block_size,
                    config.st_min_ms,
                    0,
                    0,
                    0,
                    0,
                    0,
                ];
                shims.send_can(self.reply_arbitration_id, &fc_frame);
                Message::in_progress()
            }
            PCI_CONSECUTIVE_FRAME => {
                if !self.multi_frame {
                    log::debug!(
                        "isotp: consecutive frame with no first frame on 0x{:x}",
                        arbitration_id
                    );
                    return Message::in_progress();
                }
                let sequence = data[0] & 0x0f;
                if sequence != self.next_sequence & 0x0f {
                    shims.log("isotp: out-of-sequence consecutive frame, dropping");
                    log::warn!(
                        "{}",
                        IsoTpError::OutOfSequence.to_string()
                    );
                    return Message::in_progress();
                }
                self.next_sequence = self.next_sequence.wrapping_add(1);

                let remaining = self.expected_length.saturating_sub(self.filled);
                let payload_bytes = data.len().saturating_sub(1);
                let take = payload_bytes.min(remaining);
                self.buffer[self.filled..self.filled + take]
                    .copy_from_slice(&data[1..1 + take]);
                self.filled += take;

                if self.filled >= self.expected_length {
                    let mut message = Message::in_progress();
                    message.payload[..self.filled].copy_from_slice(&self.buffer[..self.filled]);
                    message.size = self.filled;
                    message.completed = true;
                    message.multi_frame = true;
                    self.reset();
                    message
                } else {
                    Message::in_progress()
                }
            }
            PCI_FLOW_CONTROL => {
                log::debug!("isotp: flow control frame ignored on receive side");
                Message::in_progress()
            }
            other => {
                log::warn!("{}", IsoTpError::UnknownFrameType(other));
                Message::in_progress()
            }
        }
    }
}
