//! # moteconnection
//!
//! Host-side connectivity for TinyOS-style sensor motes. A [`Connection`]
//! supervises a transport — a directly-attached serial port running an
//! HDLC-framed, stop-and-wait reliability layer, a TCP "serial forwarder",
//! or an in-process loopback — and reconnects it on demand. Active messages
//! are demultiplexed onto the connection through a [`MessageDispatcher`],
//! keyed by dispatch byte and routed by destination and active message type.
//!
//! ## Example
//! ```no_run
//! use std::sync::mpsc::channel;
//! use std::time::Duration;
//!
//! use moteconnection::{Connection, Handler, MessageDispatcher};
//!
//! let connection = Connection::new();
//! connection
//!     .connect("sf@localhost:9002", Some(Duration::from_secs(5)), None, None)
//!     .expect("connection string is well-formed");
//!
//! let (tx, rx) = channel();
//! let mut dispatcher = MessageDispatcher::new(0x0001, 0x22);
//! dispatcher.register_default_receiver(Some(Handler::queue(tx)));
//! connection.register_dispatcher(Box::new(dispatcher));
//!
//! if let Ok(received) = rx.recv_timeout(Duration::from_secs(1)) {
//!     println!("{:?}", received);
//! }
//!
//! connection.disconnect();
//! connection.join();
//! ```

mod conn_string;
pub mod crc;
pub mod dispatch;
pub mod error;
mod events;
pub mod framing;
mod loopback;
pub mod message;
pub mod packet;
mod serial_transport;
mod sf_transport;
mod supervisor;
mod transport;

pub use conn_string::Scheme;
pub use dispatch::{Dispatcher, Handler};
pub use error::{ConnectError, FrameError, MessageError, SendError};
pub use events::ConnectedCallback;
pub use message::{Message, MessageDispatcher, BROADCAST_ADDR};
pub use packet::{CompletionCallback, Packet};
pub use supervisor::{Connection, DispatcherHandle};
