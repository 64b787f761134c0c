//! The base wire object: a dispatch byte, an opaque payload, and an optional
//! completion callback.

/// Called once a packet's fate is known. `delivered` is `true` for an ACKed
/// serial send, a successful SF write, or a loopback echo; `false` for a
/// no-ack serial send (no ACK is structurally possible), a write or connect
/// failure, or a drop before any transport is connected.
pub type CompletionCallback = Box<dyn FnOnce(&Packet, bool) + Send>;

/// A dispatched frame in flight between a dispatcher and a transport.
pub struct Packet {
    dispatch: u8,
    payload: Vec<u8>,
    callback: Option<CompletionCallback>,
}

impl Packet {
    /// Builds a packet with no completion notification.
    pub fn new(dispatch: u8, payload: Vec<u8>) -> Self {
        Packet { dispatch, payload, callback: None }
    }

    /// Builds a packet that invokes `callback` exactly once, when its fate is known.
    pub fn with_callback(
        dispatch: u8,
        payload: Vec<u8>,
        callback: impl FnOnce(&Packet, bool) + Send + 'static,
    ) -> Self {
        Packet { dispatch, payload, callback: Some(Box::new(callback)) }
    }

    pub fn dispatch(&self) -> u8 {
        self.dispatch
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The full wire representation: `dispatch` followed by `payload`.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(1 + self.payload.len());
        wire.push(self.dispatch);
        wire.extend_from_slice(&self.payload);
        wire
    }

    /// Consumes the packet, firing its completion callback (if any) with `delivered`.
    pub fn complete(mut self, delivered: bool) {
        if let Some(callback) = self.callback.take() {
            callback(&self, delivered);
        }
    }
}
