//! Connection-string parsing: `<scheme>@<rest>`, plus the per-transport
//! sub-grammars of §4.2/§4.3.

use log::warn;

/// Splits `text` on the first occurrence of `separator`, or returns `(text, "")`
/// if `separator` does not occur.
pub fn split_in_two(text: &str, separator: char) -> (&str, &str) {
    match text.find(separator) {
        Some(idx) => (&text[..idx], &text[idx + separator.len_utf8()..]),
        None => (text, ""),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Serial,
    Sf,
    Loopback,
}

impl Scheme {
    pub fn parse(name: &str) -> Option<Scheme> {
        match name {
            "serial" => Some(Scheme::Serial),
            "sf" => Some(Scheme::Sf),
            "loopback" => Some(Scheme::Loopback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConnInfo {
    pub path: String,
    pub baud: u32,
    pub acks: bool,
}

const DEFAULT_BAUD: u32 = 115_200;

/// Parses `PATH[:BAUD[*ACK|*NOACK]]`.
pub fn parse_serial_info(rest: &str) -> SerialConnInfo {
    let (path_and_baud, ack_token) = split_in_two(rest, '*');
    let (path, baud_str) = split_in_two(path_and_baud, ':');
    let baud = if baud_str.is_empty() {
        DEFAULT_BAUD
    } else {
        match baud_str.parse() {
            Ok(b) => b,
            Err(_) => {
                warn!("invalid baud rate '{}', defaulting to {}", baud_str, DEFAULT_BAUD);
                DEFAULT_BAUD
            }
        }
    };
    let acks = match ack_token {
        "" | "ACK" => true,
        "NOACK" => false,
        other => {
            warn!("unknown ack token '{}', defaulting to ACK", other);
            true
        }
    };
    SerialConnInfo { path: path.to_string(), baud, acks }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfConnInfo {
    pub host: String,
    pub port: u16,
}

const DEFAULT_SF_PORT: u16 = 9002;

/// Parses `HOST[:PORT]`.
pub fn parse_sf_info(rest: &str) -> SfConnInfo {
    let (host, port_str) = split_in_two(rest, ':');
    let port = if port_str.is_empty() {
        DEFAULT_SF_PORT
    } else {
        match port_str.parse() {
            Ok(p) => p,
            Err(_) => {
                warn!("invalid port '{}', defaulting to {}", port_str, DEFAULT_SF_PORT);
                DEFAULT_SF_PORT
            }
        }
    };
    SfConnInfo { host: host.to_string(), port }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_in_two_finds_first_occurrence() {
        assert_eq!(split_in_two("serial@/dev/ttyUSB0:115200", '@'), ("serial", "/dev/ttyUSB0:115200"));
        assert_eq!(split_in_two("no-separator", '@'), ("no-separator", ""));
    }

    #[test]
    fn serial_info_defaults() {
        let info = parse_serial_info("/dev/ttyUSB0");
        assert_eq!(info, SerialConnInfo { path: "/dev/ttyUSB0".into(), baud: 115_200, acks: true });
    }

    #[test]
    fn serial_info_parses_baud_and_noack() {
        let info = parse_serial_info("/dev/ttyUSB0:9600*NOACK");
        assert_eq!(info, SerialConnInfo { path: "/dev/ttyUSB0".into(), baud: 9600, acks: false });
    }

    #[test]
    fn serial_info_unknown_token_keeps_acks_enabled() {
        let info = parse_serial_info("/dev/ttyUSB0:9600*GARBAGE");
        assert!(info.acks);
    }

    #[test]
    fn sf_info_defaults_port() {
        assert_eq!(parse_sf_info("localhost"), SfConnInfo { host: "localhost".into(), port: 9002 });
        assert_eq!(parse_sf_info("localhost:1234"), SfConnInfo { host: "localhost".into(), port: 1234 });
    }

    #[test]
    fn scheme_parse() {
        assert_eq!(Scheme::parse("serial"), Some(Scheme::Serial));
        assert_eq!(Scheme::parse("sf"), Some(Scheme::Sf));
        assert_eq!(Scheme::parse("loopback"), Some(Scheme::Loopback));
        assert_eq!(Scheme::parse("nope"), None);
    }
}
