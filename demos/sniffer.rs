//! Connects to a mote and prints every incoming message.
//!
//! Usage: sniffer <connection-string>
//!   e.g. sniffer sf@localhost:9002

use std::env;
use std::sync::mpsc::channel;
use std::time::Duration;

use log::LevelFilter;
use moteconnection::{Connection, Handler, MessageDispatcher};

fn main() {
    env_logger::Builder::from_default_env().filter_level(LevelFilter::Info).init();

    let connstr = match env::args().nth(1) {
        Some(arg) => arg,
        None => {
            eprintln!("usage: sniffer <connection-string>");
            std::process::exit(1);
        }
    };

    let connection = Connection::new();
    let connected_string = connstr.clone();
    let disconnected_string = connstr.clone();
    connection
        .connect(
            &connstr,
            Some(Duration::from_secs(10)),
            Some(Box::new(move || println!("connected to {}", connected_string))),
            Some(Box::new(move || println!("disconnected from {}", disconnected_string))),
        )
        .expect("valid connection string");

    let (tx, rx) = channel();
    let mut dispatcher = MessageDispatcher::new(0, 0);
    dispatcher.register_default_receiver(Some(Handler::queue(tx.clone())));
    dispatcher.register_default_snooper(Some(Handler::queue(tx)));
    connection.register_dispatcher(Box::new(dispatcher));

    while let Ok(message) = rx.recv() {
        println!("{:?}", message);
    }
}
