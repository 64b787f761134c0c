//! Dispatches a parsed connection scheme to the matching transport worker.
//!
//! Every variant exposes the same infallible `spawn`/`send`/`join` surface;
//! per-transport connection failures are reported only as a `Disconnected`
//! event, never as a `Result`, so the supervisor's reconnect loop has one
//! code path regardless of which transport is in play.

use std::sync::mpsc::Sender;

use crate::conn_string::{parse_serial_info, parse_sf_info, Scheme};
use crate::events::Event;
use crate::loopback::LoopbackTransport;
use crate::packet::Packet;
use crate::serial_transport::SerialTransport;
use crate::sf_transport::SfTransport;

pub enum TransportHandle {
    Serial(SerialTransport),
    Sf(SfTransport),
    Loopback(LoopbackTransport),
}

impl TransportHandle {
    pub fn spawn(scheme: Scheme, info: &str, events: Sender<Event>) -> TransportHandle {
        match scheme {
            Scheme::Serial => TransportHandle::Serial(SerialTransport::spawn(parse_serial_info(info), events)),
            Scheme::Sf => TransportHandle::Sf(SfTransport::spawn(parse_sf_info(info), events)),
            Scheme::Loopback => TransportHandle::Loopback(LoopbackTransport::spawn(events)),
        }
    }

    pub fn send(&self, packet: Packet) {
        match self {
            TransportHandle::Serial(t) => t.send(packet),
            TransportHandle::Sf(t) => t.send(packet),
            TransportHandle::Loopback(t) => t.send(packet),
        }
    }

    pub fn join(self) {
        match self {
            TransportHandle::Serial(t) => t.join(),
            TransportHandle::Sf(t) => t.join(),
            TransportHandle::Loopback(t) => t.join(),
        }
    }
}
