//! An in-process transport that echoes every sent packet straight back as an
//! incoming frame. Used for tests and for exercising the supervisor without
//! real hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::debug;

use crate::events::Event;
use crate::packet::Packet;

pub struct LoopbackTransport {
    outbound: Sender<Packet>,
    connected: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LoopbackTransport {
    pub fn spawn(events: Sender<Event>) -> Self {
        let (outbound_tx, outbound_rx) = channel::<Packet>();
        let alive = Arc::new(AtomicBool::new(true));
        let connected = Arc::new(AtomicBool::new(true));
        let alive_loop = alive.clone();
        let connected_loop = connected.clone();

        let handle = thread::Builder::new()
            .name("moteconnection-loopback".into())
            .spawn(move || {
                let _ = events.send(Event::Connected);
                while alive_loop.load(Ordering::Acquire) {
                    match outbound_rx.recv_timeout(Duration::from_millis(50)) {
                        Ok(packet) => {
                            let wire = packet.to_wire_bytes();
                            debug!("loopback echo {} bytes", wire.len());
                            let _ = events.send(Event::Incoming(wire));
                            packet.complete(true);
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                connected_loop.store(false, Ordering::Release);
                let _ = events.send(Event::Disconnected);
            })
            .expect("spawn loopback transport thread");

        LoopbackTransport { outbound: outbound_tx, connected, alive, handle: Some(handle) }
    }

    pub fn send(&self, packet: Packet) {
        if self.connected.load(Ordering::Acquire) {
            let _ = self.outbound.send(packet);
        } else {
            packet.complete(false);
        }
    }

    pub fn join(mut self) {
        self.alive.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
