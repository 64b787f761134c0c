//! The connection supervisor: a single worker thread owning the active
//! transport, reconnection timing, and the dispatcher registry, reached
//! through a thin, lock-protected public API.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::conn_string::{split_in_two, Scheme};
use crate::dispatch::{Dispatcher, OutgoingSender};
use crate::error::{ConnectError, SendError};
use crate::events::{ConnectParams, ConnectedCallback, Event};
use crate::packet::Packet;
use crate::transport::TransportHandle;

/// A guard borrowing a single registered dispatcher out of the registry.
/// Dereferences to the dispatcher trait object; released on drop.
pub struct DispatcherHandle<'a> {
    guard: MutexGuard<'a, HashMap<u8, Box<dyn Dispatcher>>>,
    key: u8,
}

impl<'a> Deref for DispatcherHandle<'a> {
    type Target = dyn Dispatcher + 'static;

    fn deref(&self) -> &Self::Target {
        self.guard.get(&self.key).expect("dispatcher present while handle is held").as_ref()
    }
}

impl<'a> DerefMut for DispatcherHandle<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.get_mut(&self.key).expect("dispatcher present while handle is held").as_mut()
    }
}

/// The public handle to a mote connection. Owns the supervisor thread and
/// hands out dispatcher registrations; the actual serial/SF session lives on
/// its own transport worker thread, see [`crate::transport::TransportHandle`].
pub struct Connection {
    events_tx: Sender<Event>,
    dispatchers: Arc<Mutex<HashMap<u8, Box<dyn Dispatcher>>>>,
    transport: Arc<Mutex<Option<TransportHandle>>>,
    reconnect_period: Arc<Mutex<Option<Duration>>>,
    connected: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    loop_handle: Option<thread::JoinHandle<()>>,
}

impl Default for Connection {
    fn default() -> Self {
        Connection::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        let (events_tx, events_rx) = channel::<Event>();
        let dispatchers = Arc::new(Mutex::new(HashMap::new()));
        let transport = Arc::new(Mutex::new(None));
        let reconnect_period = Arc::new(Mutex::new(None));
        let connected = Arc::new(AtomicBool::new(false));
        let busy = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));

        let loop_dispatchers = dispatchers.clone();
        let loop_transport = transport.clone();
        let loop_reconnect = reconnect_period.clone();
        let loop_connected = connected.clone();
        let loop_busy = busy.clone();
        let loop_alive = alive.clone();
        let loop_events_tx = events_tx.clone();

        let loop_handle = thread::Builder::new()
            .name("moteconnection-supervisor".into())
            .spawn(move || {
                run(
                    events_rx,
                    loop_events_tx,
                    loop_dispatchers,
                    loop_transport,
                    loop_reconnect,
                    loop_connected,
                    loop_busy,
                    loop_alive,
                )
            })
            .expect("spawn supervisor thread");

        Connection {
            events_tx,
            dispatchers,
            transport,
            reconnect_period,
            connected,
            busy,
            alive,
            loop_handle: Some(loop_handle),
        }
    }

    /// Starts connecting to `<scheme>@<rest>`. If `reconnect` is set, a lost
    /// connection is retried after that period until [`Connection::disconnect`]
    /// is called. Fails synchronously if already connecting/connected, or if
    /// the scheme is not recognized.
    pub fn connect(
        &self,
        connstr: &str,
        reconnect: Option<Duration>,
        on_connected: Option<ConnectedCallback>,
        on_disconnected: Option<ConnectedCallback>,
    ) -> Result<(), ConnectError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(ConnectError::Busy);
        }
        let (scheme_str, rest) = split_in_two(connstr, '@');
        let scheme = match Scheme::parse(scheme_str) {
            Some(scheme) => scheme,
            None => {
                self.busy.store(false, Ordering::Release);
                return Err(ConnectError::UnknownScheme(scheme_str.to_string()));
            }
        };
        *self.reconnect_period.lock().unwrap() = reconnect;
        let _ = self.events_tx.send(Event::Connect(ConnectParams {
            scheme,
            info: rest.to_string(),
            on_connected,
            on_disconnected,
        }));
        Ok(())
    }

    /// Tears down the active transport, if any, and cancels any pending
    /// reconnect. Blocks until the transport's worker thread has exited.
    pub fn disconnect(&self) {
        *self.reconnect_period.lock().unwrap() = None;
        let transport = self.transport.lock().unwrap().take();
        if let Some(transport) = transport {
            transport.join();
        }
        self.connected.store(false, Ordering::Release);
        self.busy.store(false, Ordering::Release);
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Disconnects, then stops the supervisor thread itself.
    pub fn join(mut self) {
        self.disconnect();
        self.alive.store(false, Ordering::Release);
        if let Some(handle) = self.loop_handle.take() {
            let _ = handle.join();
        }
    }

    /// Registers a dispatcher, attaching it to this connection's outgoing queue.
    /// Replaces any dispatcher previously registered for the same dispatch byte.
    pub fn register_dispatcher(&self, mut dispatcher: Box<dyn Dispatcher>) {
        dispatcher.attach(OutgoingSender(self.events_tx.clone()));
        self.dispatchers.lock().unwrap().insert(dispatcher.dispatch_byte(), dispatcher);
    }

    pub fn remove_dispatcher(&self, dispatch_byte: u8) {
        if let Some(mut dispatcher) = self.dispatchers.lock().unwrap().remove(&dispatch_byte) {
            dispatcher.detach();
        }
    }

    /// Borrows the dispatcher registered for `dispatch_byte`, if any.
    pub fn retrieve_dispatcher(&self, dispatch_byte: u8) -> Option<DispatcherHandle<'_>> {
        let guard = self.dispatchers.lock().unwrap();
        if guard.contains_key(&dispatch_byte) {
            Some(DispatcherHandle { guard, key: dispatch_byte })
        } else {
            None
        }
    }

    /// Queues `packet` for transmission on the active transport. Fails
    /// synchronously if no dispatcher is registered for its dispatch byte;
    /// once accepted, transmission outcome is reported only via the packet's
    /// completion callback.
    pub fn send(&self, packet: Packet) -> Result<(), SendError> {
        if !self.dispatchers.lock().unwrap().contains_key(&packet.dispatch()) {
            return Err(SendError::NoDispatcher(packet.dispatch()));
        }
        let _ = self.events_tx.send(Event::Outgoing(packet));
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    events_rx: Receiver<Event>,
    events_tx: Sender<Event>,
    dispatchers: Arc<Mutex<HashMap<u8, Box<dyn Dispatcher>>>>,
    transport: Arc<Mutex<Option<TransportHandle>>>,
    reconnect_period: Arc<Mutex<Option<Duration>>>,
    connected: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
) {
    let mut scheme: Option<Scheme> = None;
    let mut info: Option<String> = None;
    let mut on_connected: Option<ConnectedCallback> = None;
    let mut on_disconnected: Option<ConnectedCallback> = None;
    let mut reconnect_at: Option<Instant> = None;

    while alive.load(Ordering::Acquire) {
        match events_rx.recv_timeout(Duration::from_secs(1)) {
            Ok(Event::Connect(params)) => {
                info!("connecting to {:?}@{}", params.scheme, params.info);
                scheme = Some(params.scheme);
                info = Some(params.info.clone());
                on_connected = params.on_connected;
                on_disconnected = params.on_disconnected;
                reconnect_at = None;
                let handle = TransportHandle::spawn(params.scheme, &params.info, events_tx.clone());
                *transport.lock().unwrap() = Some(handle);
            }
            Ok(Event::Connected) => {
                info!("connection established");
                connected.store(true, Ordering::Release);
                if let Some(callback) = &on_connected {
                    callback();
                }
            }
            Ok(Event::Disconnected) => {
                info!("connection lost");
                connected.store(false, Ordering::Release);
                if let Some(callback) = &on_disconnected {
                    callback();
                }
                *transport.lock().unwrap() = None;
                let period = *reconnect_period.lock().unwrap();
                match period {
                    Some(period) => reconnect_at = Some(Instant::now() + period),
                    None => {
                        busy.store(false, Ordering::Release);
                        reconnect_at = None;
                    }
                }
            }
            Ok(Event::Outgoing(packet)) => {
                let active = transport.lock().unwrap();
                match active.as_ref() {
                    Some(handle) => handle.send(packet),
                    None => packet.complete(false),
                }
            }
            Ok(Event::Incoming(data)) => {
                if data.is_empty() {
                    warn!("dropping empty incoming frame");
                } else {
                    let dispatch_byte = data[0];
                    let mut table = dispatchers.lock().unwrap();
                    match table.get_mut(&dispatch_byte) {
                        Some(dispatcher) => dispatcher.receive(&data),
                        None => debug!("no dispatcher registered for {:#04x}", dispatch_byte),
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(deadline) = reconnect_at {
            if Instant::now() >= deadline {
                reconnect_at = None;
                // disconnect() may have cleared this concurrently while we were waiting.
                let still_wanted = reconnect_period.lock().unwrap().is_some();
                if still_wanted {
                    if let (Some(scheme), Some(info)) = (scheme, info.clone()) {
                        info!("reconnecting to {:?}@{}", scheme, info);
                        let handle = TransportHandle::spawn(scheme, &info, events_tx.clone());
                        *transport.lock().unwrap() = Some(handle);
                    }
                }
            }
        }
    }

    let leftover = transport.lock().unwrap().take();
    if let Some(transport) = leftover {
        transport.join();
    }
}
