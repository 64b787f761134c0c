//! Serial-forwarder (SF) transport: a TCP stream carrying a `"U "` handshake
//! followed by 1-byte length-prefixed packets. There is no sequencing or ACK
//! layer on this transport — see SPEC_FULL.md §4.3.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::conn_string::SfConnInfo;
use crate::events::Event;
use crate::packet::Packet;

const SF_HANDSHAKE: &[u8; 2] = b"U ";
const SF_SOCKET_TIMEOUT: Duration = Duration::from_millis(100);
const SF_MAX_PACKET_LEN: usize = 255;

pub struct SfTransport {
    outbound: Sender<Packet>,
    connected: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SfTransport {
    pub fn spawn(info: SfConnInfo, events: Sender<Event>) -> Self {
        let (outbound_tx, outbound_rx) = channel::<Packet>();
        let alive = Arc::new(AtomicBool::new(true));
        let connected = Arc::new(AtomicBool::new(false));
        let alive_loop = alive.clone();
        let connected_loop = connected.clone();

        let handle = thread::Builder::new()
            .name("moteconnection-sf".into())
            .spawn(move || run(info, events, outbound_rx, alive_loop, connected_loop))
            .expect("spawn sf transport thread");

        SfTransport { outbound: outbound_tx, connected, alive, handle: Some(handle) }
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

fn handshake(stream: &mut TcpStream) -> std::io::Result<()> {
    stream.write_all(SF_HANDSHAKE)?;
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply)?;
    if &reply != SF_HANDSHAKE {
        return Err(std::io::Error::new(ErrorKind::InvalidData, "unexpected serial forwarder greeting"));
    }
    Ok(())
}

fn run(
    info: SfConnInfo,
    events: Sender<Event>,
    outbound_rx: std::sync::mpsc::Receiver<Packet>,
    alive: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
) {
    let mut stream = match TcpStream::connect((info.host.as_str(), info.port)) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to connect to serial forwarder {}:{}: {}", info.host, info.port, e);
            let _ = events.send(Event::Disconnected);
            return;
        }
    };

    if let Err(e) = stream.set_read_timeout(Some(SF_SOCKET_TIMEOUT)) {
        error!("failed to configure serial forwarder socket: {}", e);
        let _ = events.send(Event::Disconnected);
        return;
    }

    if let Err(e) = handshake(&mut stream) {
        error!("serial forwarder handshake with {}:{} failed: {}", info.host, info.port, e);
        let _ = events.send(Event::Disconnected);
        return;
    }

    connected.store(true, Ordering::Release);
    let _ = events.send(Event::Connected);
    info!("connected to serial forwarder {}:{}", info.host, info.port);

    'session: while alive.load(Ordering::Acquire) {
        let mut len_byte = [0u8; 1];
        match stream.read_exact(&mut len_byte) {
            Ok(()) => {
                let mut body = vec![0u8; len_byte[0] as usize];
                if let Err(e) = stream.read_exact(&mut body) {
                    error!("serial forwarder read error from {}:{}: {}", info.host, info.port, e);
                    break 'session;
                }
                let _ = events.send(Event::Incoming(body));
                continue;
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                error!("serial forwarder read error from {}:{}: {}", info.host, info.port, e);
                break 'session;
            }
        }

        match outbound_rx.try_recv() {
            Ok(packet) => {
                let wire = packet.to_wire_bytes();
                if wire.len() > SF_MAX_PACKET_LEN {
                    warn!("dropping outgoing packet of {} bytes, exceeds serial forwarder limit", wire.len());
                    packet.complete(false);
                    continue;
                }
                let mut frame = Vec::with_capacity(1 + wire.len());
                frame.push(wire.len() as u8);
                frame.extend_from_slice(&wire);
                match stream.write_all(&frame) {
                    Ok(()) => packet.complete(true),
                    Err(e) => {
                        error!("serial forwarder write error to {}:{}: {}", info.host, info.port, e);
                        packet.complete(false);
                        break 'session;
                    }
                }
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
    }

    connected.store(false, Ordering::Release);
    let _ = events.send(Event::Disconnected);
}
