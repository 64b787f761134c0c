//! Direct serial/UART transport: HDLC framing, CRC validation, and a
//! stop-and-wait reliability layer with a single outstanding frame.
//!
//! The whole session — `seq_in`, `seq_out`, the outbound slot, the receive
//! buffer and escape state — is private to this worker thread. The only
//! cross-thread channel is the outbound packet queue; see SPEC_FULL.md §4.2.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serial::prelude::*;

use crate::conn_string::SerialConnInfo;
use crate::events::Event;
use crate::framing::{encode_serial_frame, parse_serial_frame, HdlcDecoder, SerialFrame};
use crate::packet::Packet;

const SERIAL_PORT_TIMEOUT: Duration = Duration::from_millis(10);
const SERIAL_ACK_TIMEOUT: Duration = Duration::from_millis(200);
/// Retransmit count after the initial transmit, before a reliable send is abandoned.
const SEND_TRIES: u32 = 1;

pub struct SerialTransport {
    outbound: Sender<Packet>,
    connected: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

struct OutboundSlot {
    packet: Packet,
    wire: Vec<u8>,
    seq: u8,
    deadline: Instant,
    tries_left: u32,
}

impl SerialTransport {
    pub fn spawn(info: SerialConnInfo, events: Sender<Event>) -> Self {
        let (outbound_tx, outbound_rx) = channel::<Packet>();
        let alive = Arc::new(AtomicBool::new(true));
        let connected = Arc::new(AtomicBool::new(false));
        let alive_loop = alive.clone();
        let connected_loop = connected.clone();

        let handle = thread::Builder::new()
            .name("moteconnection-serial".into())
            .spawn(move || run(info, events, outbound_rx, alive_loop, connected_loop))
            .expect("spawn serial transport thread");

        SerialTransport { outbound: outbound_tx, connected, alive, handle: Some(handle) }
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

fn open_port(info: &SerialConnInfo) -> serial::Result<serial::SystemPort> {
    let settings = serial::PortSettings {
        baud_rate: serial::BaudOther(info.baud as usize),
        char_size: serial::Bits8,
        parity: serial::ParityNone,
        stop_bits: serial::Stop1,
        flow_control: serial::FlowNone,
    };
    let mut port = serial::open(&info.path)?;
    port.configure(&settings)?;
    port.set_timeout(SERIAL_PORT_TIMEOUT)?;
    Ok(port)
}

fn run(
    info: SerialConnInfo,
    events: Sender<Event>,
    outbound_rx: std::sync::mpsc::Receiver<Packet>,
    alive: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
) {
    let mut port = match open_port(&info) {
        Ok(p) => p,
        Err(e) => {
            error!("failed to open serial port {}: {}", info.path, e);
            let _ = events.send(Event::Disconnected);
            return;
        }
    };

    connected.store(true, Ordering::Release);
    let _ = events.send(Event::Connected);
    info!("serial port {} connected at {} baud", info.path, info.baud);

    let mut seq_out: Option<u8> = if info.acks { Some(0) } else { None };
    let mut seq_in: Option<u8> = None;
    let mut slot: Option<OutboundSlot> = None;
    let mut decoder = HdlcDecoder::new();

    'session: while alive.load(Ordering::Acquire) {
        let mut byte = [0u8; 1];
        match port.read(&mut byte) {
            Ok(1) => {
                if let Some(candidate) = decoder.push_byte(byte[0]) {
                    handle_frame(&candidate, &mut port, &events, &mut seq_in, &mut seq_out, &mut slot);
                }
                continue;
            }
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                error!("serial read error on {}: {}", info.path, e);
                break 'session;
            }
        }

        if let Err(e) = service_outbound(&mut port, &outbound_rx, &mut seq_out, &mut slot) {
            error!("serial write error on {}: {}", info.path, e);
            break 'session;
        }
    }

    connected.store(false, Ordering::Release);
    if let Some(slot) = slot.take() {
        slot.packet.complete(false);
    }
    let _ = events.send(Event::Disconnected);
}

fn handle_frame(
    candidate: &[u8],
    port: &mut serial::SystemPort,
    events: &Sender<Event>,
    seq_in: &mut Option<u8>,
    seq_out: &mut Option<u8>,
    slot: &mut Option<OutboundSlot>,
) {
    let frame = match parse_serial_frame(candidate) {
        Ok(f) => f,
        Err(e) => {
            warn!("dropping malformed serial frame: {}", e);
            return;
        }
    };

    match frame {
        SerialFrame::NoAckPacket { body } => {
            if body.is_empty() {
                warn!("dropped empty no-ack packet");
            } else {
                let _ = events.send(Event::Incoming(body));
            }
        }
        SerialFrame::Packet { seq, body } => {
            if *seq_in != Some(seq) {
                *seq_in = Some(seq);
                let _ = events.send(Event::Incoming(body));
            } else {
                debug!("duplicate packet for seq {:#04x}", seq);
            }
            let ack = encode_serial_frame(&SerialFrame::Ack { seq });
            if let Err(e) = port.write_all(&ack) {
                warn!("failed to write ack for seq {:#04x}: {}", seq, e);
            }
        }
        SerialFrame::Ack { seq } => match (slot.as_ref(), *seq_out) {
            (Some(s), Some(expected)) if s.seq == expected && seq == expected => {
                let finished = slot.take().unwrap();
                finished.packet.complete(true);
                *seq_out = Some(expected.wrapping_add(1));
            }
            (_, Some(expected)) => warn!("ack for {:#04x}, waiting {:#04x}", seq, expected),
            (_, None) => warn!("ack for {:#04x}, acks disabled", seq),
        },
    }
}

fn service_outbound(
    port: &mut serial::SystemPort,
    outbound_rx: &std::sync::mpsc::Receiver<Packet>,
    seq_out: &mut Option<u8>,
    slot: &mut Option<OutboundSlot>,
) -> std::io::Result<()> {
    if slot.is_none() {
        match outbound_rx.try_recv() {
            Ok(packet) => {
                let wire = packet.to_wire_bytes();
                match *seq_out {
                    None => {
                        let frame = encode_serial_frame(&SerialFrame::NoAckPacket { body: wire });
                        port.write_all(&frame)?;
                        // No ACK is structurally possible without sequencing: report unconfirmed.
                        packet.complete(false);
                    }
                    Some(seq) => {
                        let frame =
                            encode_serial_frame(&SerialFrame::Packet { seq, body: wire.clone() });
                        port.write_all(&frame)?;
                        *slot = Some(OutboundSlot {
                            packet,
                            wire,
                            seq,
                            deadline: Instant::now() + SERIAL_ACK_TIMEOUT,
                            tries_left: SEND_TRIES,
                        });
                    }
                }
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
    } else {
        let due = slot.as_ref().map(|s| Instant::now() >= s.deadline).unwrap_or(false);
        if due {
            let s = slot.as_mut().unwrap();
            if s.tries_left > 0 {
                let frame = encode_serial_frame(&SerialFrame::Packet { seq: s.seq, body: s.wire.clone() });
                port.write_all(&frame)?;
                s.tries_left -= 1;
                s.deadline = Instant::now() + SERIAL_ACK_TIMEOUT;
            } else {
                let finished = slot.take().unwrap();
                warn!("ack for {:#04x} not received", finished.seq);
                finished.packet.complete(false);
                *seq_out = Some(finished.seq.wrapping_add(1));
            }
        }
    }
    Ok(())
}
