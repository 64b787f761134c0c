//! The dispatcher abstraction: a demux keyed by a dispatch byte, with a
//! `deliver()` utility shared by every concrete dispatcher's receiver/snooper
//! tables.

use std::sync::mpsc::Sender;

use crate::events::Event;
use crate::packet::Packet;

/// Either a plain callback or a thread-safe queue; `deliver()` submits to
/// whichever shape was registered without ever blocking the caller.
pub enum Handler<T> {
    Callback(Box<dyn Fn(T) + Send + Sync>),
    Queue(Sender<T>),
}

impl<T> Handler<T> {
    pub fn callback(f: impl Fn(T) + Send + Sync + 'static) -> Self {
        Handler::Callback(Box::new(f))
    }

    pub fn queue(sender: Sender<T>) -> Self {
        Handler::Queue(sender)
    }

    /// Delivers `value` to the handler. A full or disconnected queue just
    /// drops the value rather than blocking the supervisor loop.
    pub fn deliver(&self, value: T) {
        match self {
            Handler::Callback(f) => f(value),
            Handler::Queue(sender) => {
                let _ = sender.send(value);
            }
        }
    }
}

/// Handed to a dispatcher at registration time. Submits an outgoing packet by
/// enqueuing it directly on the supervisor's own event queue -- the same
/// queue the supervisor loop blocks on -- so a send wakes the loop
/// immediately instead of waiting on a side channel it only drains once an
/// event arrives or its poll timeout elapses.
#[derive(Clone)]
pub struct OutgoingSender(pub(crate) Sender<Event>);

impl OutgoingSender {
    pub fn send(&self, packet: Packet) {
        let _ = self.0.send(Event::Outgoing(packet));
    }
}

/// A registered handler bound to one dispatch byte.
///
/// `send`/`receive` operate purely on wire bytes; dispatcher-specific
/// decoration (e.g. a message dispatcher filling in default source/group)
/// happens one layer up, on the concrete type, before a [`Packet`] is ever
/// constructed -- see [`crate::message::MessageDispatcher::prepare`].
pub trait Dispatcher: Send {
    fn dispatch_byte(&self) -> u8;

    /// Bound by the supervisor at registration time; enqueues an outgoing packet.
    fn attach(&mut self, sender: OutgoingSender);

    fn detach(&mut self);

    /// Submits an already-constructed packet. Returns without effect if detached.
    fn send(&mut self, packet: Packet);

    /// Hands the dispatcher a full inbound frame, including the dispatch byte.
    fn receive(&mut self, data: &[u8]);
}
