//! Connects to a real UART-attached mote, sends one message, and prints
//! whatever comes back for a while.
//!
//! Usage: real_uart_on_linux [device] [baud]
//!   e.g. real_uart_on_linux /dev/ttyUSB0 115200

use std::env;
use std::sync::mpsc::channel;
use std::thread;
use std::time::Duration;

use log::LevelFilter;
use moteconnection::{Connection, Handler, Message, MessageDispatcher};

fn main() {
    env_logger::Builder::from_default_env().filter_level(LevelFilter::Debug).init();

    let device = env::args().nth(1).unwrap_or_else(|| "/dev/ttyS5".to_string());
    let baud: u32 = env::args().nth(2).and_then(|s| s.parse().ok()).unwrap_or(115_200);
    let connstr = format!("serial@{}:{}", device, baud);

    let connection = Connection::new();
    connection
        .connect(
            &connstr,
            Some(Duration::from_secs(5)),
            Some(Box::new(|| println!("uart connected"))),
            Some(Box::new(|| println!("uart disconnected"))),
        )
        .expect("valid connection string");

    let (tx, rx) = channel();
    let mut dispatcher = MessageDispatcher::new(0xCCC4, 0);
    dispatcher.register_default_receiver(Some(Handler::queue(tx)));

    let outgoing = Message { destination: 0xFFFF, r#type: 1, payload: vec![1, 2, 3], ..Message::new() };
    let packet = dispatcher.prepare(outgoing);
    connection.register_dispatcher(Box::new(dispatcher));
    connection.send(packet).expect("dispatcher just registered");

    thread::spawn(move || {
        while let Ok(message) = rx.recv() {
            println!("received: {:?}", message);
        }
    });

    thread::sleep(Duration::from_secs(10));
    connection.disconnect();
    connection.join();
}
