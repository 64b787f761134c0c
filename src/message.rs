//! Active messages and the dispatcher that routes them by type and address.

use std::collections::HashMap;

use log::warn;

use crate::dispatch::{Dispatcher, Handler, OutgoingSender};
use crate::error::MessageError;
use crate::packet::Packet;

pub const BROADCAST_ADDR: u16 = 0xFFFF;
const HEADER_LEN: usize = 8;

/// An active mote message: destination, source, group, type, payload, and an
/// optional 2-byte `[lqi, rssi]` footer. See SPEC_FULL.md §3 for the wire layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub dispatch: u8,
    pub destination: u16,
    /// `None` means "let the dispatcher fill in its own address on send".
    pub source: Option<u16>,
    /// `None` means "let the dispatcher fill in its own group on send".
    pub group: Option<u8>,
    pub r#type: u8,
    pub payload: Vec<u8>,
    pub footer: Vec<u8>,
}

impl Message {
    pub fn new() -> Self {
        Message::default()
    }

    pub fn source_or_zero(&self) -> u16 {
        self.source.unwrap_or(0)
    }

    pub fn group_or_zero(&self) -> u8 {
        self.group.unwrap_or(0)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len() + self.footer.len());
        buf.push(self.dispatch);
        buf.extend_from_slice(&self.destination.to_be_bytes());
        buf.extend_from_slice(&self.source_or_zero().to_be_bytes());
        buf.push(self.payload.len() as u8);
        buf.push(self.group_or_zero());
        buf.push(self.r#type);
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.footer);
        buf
    }

    pub fn deserialize(data: &[u8]) -> Result<Message, MessageError> {
        if data.len() < HEADER_LEN {
            return Err(MessageError::Truncated(data.len()));
        }
        let dispatch = data[0];
        let destination = u16::from_be_bytes([data[1], data[2]]);
        let source = u16::from_be_bytes([data[3], data[4]]);
        let length = data[5] as usize;
        let group = data[6];
        let r#type = data[7];
        let rest = &data[HEADER_LEN..];
        if length > rest.len() {
            return Err(MessageError::LengthMismatch { declared: length, remaining: rest.len() });
        }
        let payload = rest[..length].to_vec();
        let footer = rest[length..].to_vec();
        if footer.len() != 0 && footer.len() != 2 {
            return Err(MessageError::InvalidFooter(footer.len()));
        }
        Ok(Message {
            dispatch,
            destination,
            source: Some(source),
            group: Some(group),
            r#type,
            payload,
            footer,
        })
    }
}

/// Demultiplexes active messages by type byte into receiver/snooper tables,
/// applying address-based routing and dispatcher-level source/group defaults.
pub struct MessageDispatcher {
    dispatch: u8,
    address: u16,
    group: u8,
    receivers: HashMap<u8, Handler<Message>>,
    default_receiver: Option<Handler<Message>>,
    snoopers: HashMap<u8, Handler<Message>>,
    default_snooper: Option<Handler<Message>>,
    sender: Option<OutgoingSender>,
}

impl MessageDispatcher {
    pub fn new(address: u16, group: u8) -> Self {
        MessageDispatcher::with_dispatch_byte(0x00, address, group)
    }

    pub fn with_dispatch_byte(dispatch: u8, address: u16, group: u8) -> Self {
        MessageDispatcher {
            dispatch,
            address,
            group,
            receivers: HashMap::new(),
            default_receiver: None,
            snoopers: HashMap::new(),
            default_snooper: None,
            sender: None,
        }
    }

    pub fn register_receiver(&mut self, ptype: u8, receiver: Option<Handler<Message>>) {
        match receiver {
            Some(handler) => {
                self.receivers.insert(ptype, handler);
            }
            None => {
                self.receivers.remove(&ptype);
            }
        }
    }

    pub fn register_default_receiver(&mut self, receiver: Option<Handler<Message>>) {
        self.default_receiver = receiver;
    }

    pub fn register_snooper(&mut self, ptype: u8, snooper: Option<Handler<Message>>) {
        match snooper {
            Some(handler) => {
                self.snoopers.insert(ptype, handler);
            }
            None => {
                self.snoopers.remove(&ptype);
            }
        }
    }

    pub fn register_default_snooper(&mut self, snooper: Option<Handler<Message>>) {
        self.default_snooper = snooper;
    }

    /// Applies the dispatcher's source/group defaults to unset fields and
    /// serializes the result into a packet ready for [`crate::Connection::send`].
    pub fn prepare(&self, mut message: Message) -> Packet {
        message.dispatch = self.dispatch;
        if message.source.is_none() {
            message.source = Some(self.address);
        }
        if message.group.is_none() {
            message.group = Some(self.group);
        }
        let wire = message.serialize();
        Packet::new(wire[0], wire[1..].to_vec())
    }
}

impl Dispatcher for MessageDispatcher {
    fn dispatch_byte(&self) -> u8 {
        self.dispatch
    }

    fn attach(&mut self, sender: OutgoingSender) {
        self.sender = Some(sender);
    }

    fn detach(&mut self) {
        self.sender = None;
    }

    fn send(&mut self, packet: Packet) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(packet);
        } else {
            packet.complete(false);
        }
    }

    fn receive(&mut self, data: &[u8]) {
        let message = match Message::deserialize(data) {
            Ok(m) => m,
            Err(e) => {
                warn!("failed to deserialize message ({} bytes): {}", data.len(), e);
                return;
            }
        };
        if message.destination == self.address
            || message.destination == 0
            || message.destination == BROADCAST_ADDR
        {
            if let Some(handler) = self.receivers.get(&message.r#type) {
                handler.deliver(message);
            } else if let Some(handler) = &self.default_receiver {
                handler.deliver(message);
            }
        } else if let Some(handler) = self.snoopers.get(&message.r#type) {
            handler.deliver(message);
        } else if let Some(handler) = &self.default_snooper {
            handler.deliver(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::sync::{Arc, Mutex};

    #[test]
    fn round_trips_through_serialize() {
        let m = Message {
            dispatch: 0,
            destination: 0x1234,
            source: Some(0x0001),
            group: Some(0x22),
            r#type: 0x10,
            payload: vec![1, 2, 3],
            footer: vec![],
        };
        let wire = m.serialize();
        assert_eq!(Message::deserialize(&wire).unwrap(), m);
    }

    #[test]
    fn round_trips_with_footer() {
        let m = Message {
            dispatch: 0,
            destination: 0xFFFF,
            source: Some(1),
            group: Some(0x22),
            r#type: 5,
            payload: vec![9, 9],
            footer: vec![200, 44],
        };
        let wire = m.serialize();
        assert_eq!(Message::deserialize(&wire).unwrap(), m);
    }

    #[test]
    fn deserialize_rejects_length_mismatch() {
        let mut wire = Message {
            dispatch: 0,
            destination: 1,
            source: Some(1),
            group: Some(1),
            r#type: 1,
            payload: vec![1, 2, 3],
            footer: vec![],
        }
        .serialize();
        // Claim a longer payload than actually present.
        wire[5] = 200;
        assert!(matches!(Message::deserialize(&wire), Err(MessageError::LengthMismatch { .. })));
    }

    #[test]
    fn deserialize_rejects_truncated_header() {
        assert!(matches!(Message::deserialize(&[1, 2, 3]), Err(MessageError::Truncated(3))));
    }

    #[test]
    fn prepare_fills_in_defaults() {
        let dispatcher = MessageDispatcher::new(0x0001, 0x22);
        let message = Message { r#type: 0x10, payload: vec![0xAB], ..Message::new() };
        let packet = dispatcher.prepare(message);
        assert_eq!(packet.dispatch(), 0);
        let recovered = Message::deserialize(&packet.to_wire_bytes()).unwrap();
        assert_eq!(recovered.source, Some(0x0001));
        assert_eq!(recovered.group, Some(0x22));
    }

    #[test]
    fn broadcast_routes_to_receiver_never_snooper() {
        let mut dispatcher = MessageDispatcher::new(0x0001, 0x22);
        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        dispatcher.register_receiver(
            0x10,
            Some(Handler::callback(move |m: Message| received2.lock().unwrap().push(m))),
        );
        let snooped = Arc::new(Mutex::new(Vec::new()));
        let snooped2 = snooped.clone();
        dispatcher
            .register_default_snooper(Some(Handler::callback(move |m: Message| snooped2.lock().unwrap().push(m))));

        let message = Message { destination: BROADCAST_ADDR, r#type: 0x10, ..Message::new() };
        dispatcher.receive(&message.serialize());

        assert_eq!(received.lock().unwrap().len(), 1);
        assert!(snooped.lock().unwrap().is_empty());
    }

    #[test]
    fn foreign_destination_routes_to_snooper_then_default() {
        let mut dispatcher = MessageDispatcher::new(0x0001, 0x22);
        let (tx, rx) = channel();
        dispatcher.register_default_snooper(Some(Handler::queue(tx)));

        let message = Message { destination: 0x0002, r#type: 0x77, ..Message::new() };
        dispatcher.receive(&message.serialize());

        let delivered = rx.recv_timeout(std::time::Duration::from_millis(100)).unwrap();
        assert_eq!(delivered.destination, 0x0002);
    }

    #[test]
    fn send_without_attached_sender_completes_false() {
        let mut dispatcher = MessageDispatcher::new(0x0001, 0x22);
        let fired = Arc::new(Mutex::new(None));
        let fired2 = fired.clone();
        let packet = Packet::with_callback(0, vec![], move |_p, ok| *fired2.lock().unwrap() = Some(ok));
        dispatcher.send(packet);
        assert_eq!(*fired.lock().unwrap(), Some(false));
    }
}
