//! Receive-handle multiplexer and request handle state machine.

use crate::codec;
use crate::isotp::{self, IsoTpConfig};
use crate::request::{mode, PidRequestType, Request, FUNCTIONAL_BROADCAST_ID};
use crate::response::Response;
use crate::shims::Shims;
use crate::{DiagError, DiagServerResult};

const MAX_RECEIVE_SLOTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    SendInflight,
    AwaitingResponse,
    Completed,
}

/// An in-progress (or completed) diagnostic request.
///
/// Owns its own ISO-TP send slot and up to [`MAX_RECEIVE_SLOTS`] receive
/// slots; see [`crate::request`], [`crate::start_request`], and
/// [`crate::receive_can_frame`] for how a handle is created and driven.
pub struct RequestHandle {
    request: Request,
    isotp_config: IsoTpConfig,
    send: Option<isotp::SendHandle>,
    receive: [Option<isotp::ReceiveHandle>; MAX_RECEIVE_SLOTS],
    receive_count: usize,
    state: HandleState,
    completed: bool,
    success: bool,
    callback: Option<Box<dyn FnMut(&Response)>>,
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("request", &self.request)
            .field("state", &self.state)
            .field("completed", &self.completed)
            .field("success", &self.success)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl RequestHandle {
    /// The request this handle is carrying.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// True once the handle has completed, successfully or not.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Meaningful only once `completed()` is true.
    pub fn success(&self) -> bool {
        self.success
    }
}

/// Builds a [`RequestHandle`] for `request` without performing any I/O.
///
/// The handle is not sent until [`start_request`] is called on it (directly,
/// or via [`request`]/[`request_pid`]).
pub fn generate_request(
    shims: &Shims,
    request: &Request,
    callback: Option<Box<dyn FnMut(&Response)>>,
) -> DiagServerResult<RequestHandle> {
    if let Err(reason) = request.validate() {
        shims.log("rejecting invalid diagnostic request");
        log::warn!("invalid diagnostic request: {}", reason);
        return Err(DiagError::InvalidRequest(reason));
    }
    Ok(RequestHandle {
        request: *request,
        isotp_config: IsoTpConfig::default(),
        send: None,
        receive: [None; MAX_RECEIVE_SLOTS],
        receive_count: 0,
        state: HandleState::SendInflight,
        completed: false,
        success: false,
        callback,
    })
}

fn open_receive_slots(handle: &mut RequestHandle) {
    handle.receive = [None; MAX_RECEIVE_SLOTS];
    if handle.request.arbitration_id == FUNCTIONAL_BROADCAST_ID {
        for i in 0..MAX_RECEIVE_SLOTS {
            let listen = 0x7e8 + i as u32;
            let reply = listen - 0x08;
            handle.receive[i] = Some(isotp::receive(listen, reply));
        }
        handle.receive_count = MAX_RECEIVE_SLOTS;
    } else {
        let listen = handle.request.arbitration_id + 0x08;
        let reply = handle.request.arbitration_id;
        handle.receive[0] = Some(isotp::receive(listen, reply));
        handle.receive_count = 1;
    }
}

/// Sends `handle`'s request's first (and, per this crate's 6-byte encode
/// bound, only) ISO-TP frame and opens its receive slots.
///
/// May be called again on an already-completed handle to re-arm it and send
/// the same request a second time.
pub fn start_request(shims: &Shims, handle: &mut RequestHandle) {
    handle.completed = false;
    handle.success = false;

    let payload = codec::encode(&handle.request);
    let length = codec::encoded_length(&handle.request);
    let pad = !handle.request.no_frame_padding;

    let send = match isotp::send(
        shims,
        &handle.isotp_config,
        handle.request.arbitration_id,
        &payload[..length],
        pad,
    ) {
        Ok(send) => send,
        Err(err) => {
            shims.log("failed to send diagnostic request");
            log::error!("isotp send failed: {}", err);
            handle.completed = true;
            handle.success = false;
            handle.state = HandleState::Completed;
            return;
        }
    };

    handle.send = Some(send);

    if send.completed {
        if send.success {
            handle.state = HandleState::AwaitingResponse;
            open_receive_slots(handle);
        } else {
            handle.completed = true;
            handle.success = false;
            handle.state = HandleState::Completed;
            shims.log("diagnostic request send failed");
            log::error!(
                "send_can reported failure for arbitration id 0x{:x}",
                handle.request.arbitration_id
            );
            return;
        }
    } else {
        handle.state = HandleState::SendInflight;
    }

    let mut buf = [0u8; 96];
    let rendered = crate::request::request_to_string(&handle.request, &mut buf);
    shims.log(format!("sending diagnostic request: {}", rendered));
    log::debug!("sending diagnostic request: {}", rendered);
}

/// Builds and sends a request for `request` in one call.
pub fn request(
    shims: &Shims,
    request: &Request,
    callback: Option<Box<dyn FnMut(&Response)>>,
) -> DiagServerResult<RequestHandle> {
    let mut handle = generate_request(shims, request, callback)?;
    start_request(shims, &mut handle);
    Ok(handle)
}

/// Builds and sends a PID request.
///
/// `kind` selects mode 0x01 with a 1-byte PID (`Standard`) or mode 0x22 with
/// a 2-byte PID (`Enhanced`). Always applies frame padding.
pub fn request_pid(
    shims: &Shims,
    kind: PidRequestType,
    arbitration_id: u32,
    pid: u16,
    callback: Option<Box<dyn FnMut(&Response)>>,
) -> DiagServerResult<RequestHandle> {
    let (request_mode, pid_length) = match kind {
        PidRequestType::Standard => (mode::POWERTRAIN_DIAGNOSTIC_REQUEST, 1),
        PidRequestType::Enhanced => (mode::ENHANCED_DIAGNOSTIC_REQUEST, 2),
    };
    let req = Request {
        arbitration_id,
        mode: request_mode,
        has_pid: true,
        pid,
        pid_length,
        no_frame_padding: false,
        ..Default::default()
    };
    request(shims, &req, callback)
}

/// True once this handle's outbound ISO-TP send has completed (successfully
/// or not).
pub fn request_sent(handle: &RequestHandle) -> bool {
    handle.send.map(|send| send.completed).unwrap_or(false)
}

/// Feeds one inbound CAN frame to `handle`.
///
/// Returns a [`Response`] whose `completed` field must be checked before
/// acting on anything else: most calls return a non-completed response
/// because the frame was irrelevant, a mismatch, or arrived on an
/// already-completed handle.
pub fn receive_can_frame(
    shims: &Shims,
    handle: &mut RequestHandle,
    arbitration_id: u32,
    data: &[u8],
) -> Response {
    match handle.state {
        HandleState::Completed => {
            log::debug!(
                "ignoring frame on arb 0x{:x} for already-completed handle",
                arbitration_id
            );
            Response::default()
        }
        HandleState::SendInflight => {
            if let Some(send) = handle.send.as_mut() {
                send.continue_send(arbitration_id, data);
                if send.completed {
                    if send.success {
                        handle.state = HandleState::AwaitingResponse;
                        open_receive_slots(handle);
                    } else {
                        handle.completed = true;
                        handle.success = false;
                        handle.state = HandleState::Completed;
                    }
                }
            }
            Response::default()
        }
        HandleState::AwaitingResponse => {
            let receive_count = handle.receive_count;
            let request = handle.request;
            let config = handle.isotp_config;

            for i in 0..receive_count {
                let slot = match handle.receive[i].as_mut() {
                    Some(slot) => slot,
                    None => continue,
                };
                let message = slot.continue_receive(shims, &config, arbitration_id, data);
                if !message.completed {
                    continue;
                }
                if message.size == 0 {
                    shims.log("received empty diagnostic message");
                    log::debug!("empty reassembled payload on arb 0x{:x}", arbitration_id);
                    continue;
                }

                match codec::decode(&message.payload[..message.size], &request) {
                    Some(mut response) => {
                        response.multi_frame = message.multi_frame;
                        response.arbitration_id = arbitration_id;

                        handle.completed = true;
                        handle.success = response.success;
                        handle.state = HandleState::Completed;

                        let mut buf = [0u8; 96];
                        let rendered = crate::response::response_to_string(&response, &mut buf);
                        shims.log(format!("diagnostic response received: {}", rendered));
                        log::debug!("diagnostic response received: {}", rendered);

                        if let Some(callback) = handle.callback.as_mut() {
                            callback(&response);
                        }
                        return response;
                    }
                    None => {
                        log::debug!(
                            "mismatched diagnostic response on arb 0x{:x}, discarding",
                            arbitration_id
                        );
                    }
                }
            }
            Response::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::shims::init_shims;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_shims() -> (Shims, Rc<RefCell<Vec<(u32, Vec<u8>)>>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let sent2 = sent.clone();
        let shims = init_shims(
            None,
            Some(Rc::new(move |id, data: &[u8]| {
                sent2.borrow_mut().push((id, data.to_vec()));
                true
            })),
            None,
        );
        (shims, sent)
    }

    #[test]
    fn simple_positive_non_pid() {
        let (shims, sent) = recording_shims();
        let req = Request {
            arbitration_id: 0x100,
            mode: 0x03,
            no_frame_padding: true,
            ..Default::default()
        };
        let mut handle = request(&shims, &req, None).unwrap();
        assert_eq!(sent.borrow()[0], (0x100, vec![0x02, 0x03]));

        let response = receive_can_frame(&shims, &mut handle, 0x108, &[0x02, 0x43, 0x23]);
        assert!(response.completed);
        assert!(response.success);
        assert_eq!(response.mode, 0x03);
        assert_eq!(response.payload(), &[0x23]);
        assert!(handle.completed());
        assert!(handle.success());
    }

    #[test]
    fn wrong_arbitration_id_is_ignored() {
        let (shims, _sent) = recording_shims();
        let req = Request {
            arbitration_id: 0x100,
            mode: 0x03,
            no_frame_padding: true,
            ..Default::default()
        };
        let mut handle = request(&shims, &req, None).unwrap();
        let response = receive_can_frame(&shims, &mut handle, 0x100, &[0x02, 0x43, 0x23]);
        assert!(!response.completed);
        assert!(!handle.completed());
    }

    #[test]
    fn negative_response() {
        let (shims, _sent) = recording_shims();
        let req = Request {
            arbitration_id: 0x100,
            mode: 0x01,
            ..Default::default()
        };
        let mut handle = request(&shims, &req, None).unwrap();
        let response = receive_can_frame(&shims, &mut handle, 0x108, &[0x03, 0x7f, 0x01, 0x11]);
        assert!(response.completed);
        assert!(!response.success);
        assert_eq!(response.mode, 0x01);
        assert_eq!(response.negative_response_code.code(), 0x11);
    }

    #[test]
    fn functional_broadcast_first_responder_wins() {
        let (shims, sent) = recording_shims();
        let req = Request {
            arbitration_id: FUNCTIONAL_BROADCAST_ID,
            mode: 0x03,
            no_frame_padding: true,
            ..Default::default()
        };
        let mut handle = request(&shims, &req, None).unwrap();
        assert_eq!(sent.borrow()[0], (FUNCTIONAL_BROADCAST_ID, vec![0x02, 0x03]));

        let response = receive_can_frame(&shims, &mut handle, 0x7e8, &[0x02, 0x43, 0x23]);
        assert!(response.completed);
        assert!(response.success);
        assert_eq!(response.arbitration_id, 0x7e8);
        assert_eq!(response.payload(), &[0x23]);
    }

    #[test]
    fn wrong_pid_then_right_pid() {
        let (shims, _sent) = recording_shims();
        let req = Request {
            arbitration_id: 0x100,
            mode: 0x22,
            has_pid: true,
            pid: 0x1234,
            ..Default::default()
        };
        let mut handle = request(&shims, &req, None).unwrap();

        let mismatch =
            receive_can_frame(&shims, &mut handle, 0x108, &[0x04, 0x62, 0x12, 0x33, 0x45]);
        assert!(!mismatch.completed);
        assert!(!handle.completed());

        let response =
            receive_can_frame(&shims, &mut handle, 0x108, &[0x04, 0x62, 0x12, 0x34, 0x45]);
        assert!(response.completed);
        assert!(response.success);
        assert_eq!(response.pid, 0x1234);
        assert_eq!(response.payload(), &[0x45]);
    }

    #[test]
    fn multi_frame_vin_response() {
        let (shims, sent) = recording_shims();
        let req = Request {
            arbitration_id: 0x100,
            mode: 0x09,
            has_pid: true,
            pid: 0x02,
            ..Default::default()
        };
        let mut handle = request(&shims, &req, None).unwrap();

        let in_progress = receive_can_frame(
            &shims,
            &mut handle,
            0x108,
            &[0x10, 0x14, 0x49, 0x02, 0x01, 0x31, 0x46, 0x4D],
        );
        assert!(!in_progress.completed);
        let flow_control = sent.borrow().last().cloned().unwrap();
        assert_eq!(flow_control.0, 0x100);
        assert_eq!(flow_control.1[0] >> 4, 0x3);

        let still_in_progress = receive_can_frame(
            &shims,
            &mut handle,
            0x108,
            &[0x21, 0x43, 0x55, 0x39, 0x4A, 0x39, 0x34, 0x48],
        );
        assert!(!still_in_progress.completed);

        let response = receive_can_frame(
            &shims,
            &mut handle,
            0x108,
            &[0x22, 0x55, 0x41, 0x30, 0x34, 0x35, 0x32, 0x34],
        );
        assert!(response.completed);
        assert!(response.success);
        assert!(response.multi_frame);
        assert_eq!(response.mode, 0x09);
        assert_eq!(response.pid, 0x02);
        assert_eq!(response.payload_length, 18);
        assert_eq!(
            &response.payload()[..8],
            &[0x01, 0x31, 0x46, 0x4D, 0x43, 0x55, 0x39, 0x4A]
        );
    }

    #[test]
    fn completed_handle_ignores_further_frames() {
        let (shims, _sent) = recording_shims();
        let req = Request {
            arbitration_id: 0x100,
            mode: 0x03,
            no_frame_padding: true,
            ..Default::default()
        };
        let mut handle = request(&shims, &req, None).unwrap();
        receive_can_frame(&shims, &mut handle, 0x108, &[0x02, 0x43, 0x23]);
        assert!(handle.completed());

        let after = receive_can_frame(&shims, &mut handle, 0x108, &[0x02, 0x43, 0x23]);
        assert!(!after.completed);
    }

    #[test]
    fn callback_fires_exactly_once_on_completion() {
        let (shims, _sent) = recording_shims();
        let calls = Rc::new(RefCell::new(0));
        let calls2 = calls.clone();
        let req = Request {
            arbitration_id: 0x100,
            mode: 0x03,
            no_frame_padding: true,
            ..Default::default()
        };
        let mut handle = request(
            &shims,
            &req,
            Some(Box::new(move |_response: &Response| {
                *calls2.borrow_mut() += 1;
            })),
        )
        .unwrap();
        receive_can_frame(&shims, &mut handle, 0x100, &[0xff]);
        assert_eq!(*calls.borrow(), 0);
        receive_can_frame(&shims, &mut handle, 0x108, &[0x02, 0x43, 0x23]);
        assert_eq!(*calls.borrow(), 1);
        receive_can_frame(&shims, &mut handle, 0x108, &[0x02, 0x43, 0x23]);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn request_pid_auto_pads_and_sizes() {
        let (shims, sent) = recording_shims();
        let handle = request_pid(&shims, PidRequestType::Standard, 0x100, 0x02, None).unwrap();
        assert!(request_sent(&handle));
        let (id, data) = &sent.borrow()[0];
        assert_eq!(*id, 0x100);
        assert_eq!(data.len(), 8);
        assert_eq!(&data[..3], &[0x02, 0x01, 0x02]);
    }

    #[test]
    fn generate_request_rejects_invalid_payload_length() {
        let (shims, _sent) = recording_shims();
        let req = Request {
            payload_length: 8,
            ..Default::default()
        };
        assert!(generate_request(&shims, &req, None).is_err());
    }
}
