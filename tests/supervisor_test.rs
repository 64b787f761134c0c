use std::sync::mpsc::channel;
use std::time::Duration;

use moteconnection::{Connection, ConnectError, Handler, Message, MessageDispatcher};

#[test]
fn loopback_echoes_sent_message() {
    let connection = Connection::new();
    connection.connect("loopback@", None, None, None).unwrap();

    let (tx, rx) = channel();
    let mut dispatcher = MessageDispatcher::new(0x0001, 0x22);
    dispatcher.register_default_receiver(Some(Handler::queue(tx)));

    let outgoing = Message { destination: 0x0001, r#type: 0x10, payload: vec![1, 2, 3], ..Message::new() };
    let packet = dispatcher.prepare(outgoing);
    connection.register_dispatcher(Box::new(dispatcher));
    connection.send(packet).unwrap();

    let received = rx.recv_timeout(Duration::from_secs(1)).expect("loopback echo");
    assert_eq!(received.payload, vec![1, 2, 3]);
    assert_eq!(received.r#type, 0x10);

    connection.disconnect();
    connection.join();
}

#[test]
fn connected_reports_false_until_connect_completes() {
    let connection = Connection::new();
    assert!(!connection.connected());

    connection.connect("loopback@", None, None, None).unwrap();
    // Loopback announces CONNECTED almost immediately; give the supervisor a tick.
    std::thread::sleep(Duration::from_millis(100));
    assert!(connection.connected());

    connection.disconnect();
    assert!(!connection.connected());

    connection.join();
}

#[test]
fn connect_while_already_connecting_is_rejected() {
    let connection = Connection::new();
    connection.connect("loopback@", None, None, None).unwrap();

    let result = connection.connect("loopback@", None, None, None);
    assert!(matches!(result, Err(ConnectError::Busy)));

    connection.disconnect();
    connection.join();
}

#[test]
fn unknown_scheme_is_rejected_synchronously() {
    let connection = Connection::new();
    let result = connection.connect("carrier-pigeon@nowhere", None, None, None);
    assert!(matches!(result, Err(ConnectError::UnknownScheme(_))));
    // Rejecting an unknown scheme must not leave the connection stuck "busy".
    assert!(connection.connect("loopback@", None, None, None).is_ok());

    connection.disconnect();
    connection.join();
}

#[test]
fn send_without_dispatcher_is_rejected() {
    use moteconnection::Packet;

    let connection = Connection::new();
    connection.connect("loopback@", None, None, None).unwrap();

    let result = connection.send(Packet::new(0x42, vec![0xAB]));
    assert!(result.is_err());

    connection.disconnect();
    connection.join();
}
