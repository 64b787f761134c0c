//! The supervisor's event queue item type, and the parameters captured by a
//! `connect()` call that a reconnect attempt needs to reuse.

use crate::conn_string::Scheme;
use crate::packet::Packet;

pub type ConnectedCallback = Box<dyn Fn() + Send>;

pub struct ConnectParams {
    pub scheme: Scheme,
    pub info: String,
    pub on_connected: Option<ConnectedCallback>,
    pub on_disconnected: Option<ConnectedCallback>,
}

pub enum Event {
    Incoming(Vec<u8>),
    Outgoing(Packet),
    Connect(ConnectParams),
    Connected,
    Disconnected,
}
