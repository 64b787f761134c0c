//! Sends a single hex-encoded payload to a mote and exits.
//!
//! Usage: injector <connection-string> <hex-data> [amid] [dest] [src]
//!   e.g. injector sf@localhost:9002 deadbeef 0x76 0xFFFF 0xCCC4

use std::env;
use std::thread;
use std::time::Duration;

use log::LevelFilter;
use moteconnection::{Connection, Message, MessageDispatcher};

fn parse_num(text: &str, default: u32) -> u32 {
    let trimmed = text.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(trimmed, 16).unwrap_or(default)
}

fn decode_hex(text: &str) -> Vec<u8> {
    (0..text.len())
        .step_by(2)
        .filter_map(|i| text.get(i..i + 2))
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .collect()
}

fn main() {
    env_logger::Builder::from_default_env().filter_level(LevelFilter::Info).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: injector <connection-string> <hex-data> [amid] [dest] [src]");
        std::process::exit(1);
    }
    let connstr = &args[1];
    let payload = decode_hex(&args[2]);
    let amid = args.get(3).map(|s| parse_num(s, 0x76)).unwrap_or(0x76) as u8;
    let dest = args.get(4).map(|s| parse_num(s, 0xFFFF)).unwrap_or(0xFFFF) as u16;
    let src = args.get(5).map(|s| parse_num(s, 0xCCC4)).unwrap_or(0xCCC4) as u16;

    let connection = Connection::new();
    connection
        .connect(connstr, Some(Duration::from_secs(10)), None, None)
        .expect("valid connection string");

    let message = Message { destination: dest, r#type: amid, payload, ..Message::new() };
    let dispatcher = MessageDispatcher::new(src, 0);
    let packet = dispatcher.prepare(message);
    connection.register_dispatcher(Box::new(dispatcher));

    thread::sleep(Duration::from_millis(200));
    connection.send(packet).expect("dispatcher registered");
    thread::sleep(Duration::from_millis(200));

    connection.disconnect();
    connection.join();
}
