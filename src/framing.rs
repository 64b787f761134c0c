//! HDLC-style byte stuffing and the serial inner-protocol frame format built
//! on top of it (tag + sequence + opaque body + CCITT-16 CRC).

use crate::crc::crc_ccitt16;
use crate::error::FrameError;

pub const FRAME_BYTE: u8 = 0x7E;
pub const ESCAPE_BYTE: u8 = 0x7D;
pub const XOR_BYTE: u8 = 0x20;

pub const TAG_ACK: u8 = 0x43;
pub const TAG_PACKET: u8 = 0x44;
pub const TAG_NO_ACK_PACKET: u8 = 0x45;

/// Byte-stuffs `payload` between a pair of `FRAME_BYTE` delimiters.
pub fn hdlc_encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push(FRAME_BYTE);
    for &b in payload {
        if b == FRAME_BYTE || b == ESCAPE_BYTE {
            out.push(ESCAPE_BYTE);
            out.push(b ^ XOR_BYTE);
        } else {
            out.push(b);
        }
    }
    out.push(FRAME_BYTE);
    out
}

/// Streaming HDLC de-framer. Feed bytes one at a time; a non-`None` return
/// is a candidate frame (not yet CRC-checked).
#[derive(Default)]
pub struct HdlcDecoder {
    escape_next: bool,
    buffer: Vec<u8>,
}

impl HdlcDecoder {
    pub fn new() -> Self {
        HdlcDecoder::default()
    }

    pub fn push_byte(&mut self, byte: u8) -> Option<Vec<u8>> {
        if byte == FRAME_BYTE {
            self.escape_next = false;
            if self.buffer.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.buffer));
        }
        if byte == ESCAPE_BYTE {
            self.escape_next = true;
            return None;
        }
        if self.escape_next {
            self.buffer.push(byte ^ XOR_BYTE);
            self.escape_next = false;
        } else {
            self.buffer.push(byte);
        }
        None
    }
}

/// A de-framed, CRC-verified serial inner-protocol frame.
#[derive(Debug, PartialEq, Eq)]
pub enum SerialFrame {
    Ack { seq: u8 },
    Packet { seq: u8, body: Vec<u8> },
    NoAckPacket { body: Vec<u8> },
}

/// Verifies the trailing CRC and parses the tag of a candidate HDLC frame.
pub fn parse_serial_frame(frame: &[u8]) -> Result<SerialFrame, FrameError> {
    if frame.len() < 3 {
        return Err(FrameError::TooShort);
    }
    let (data, crc_bytes) = frame.split_at(frame.len() - 2);
    let claimed = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let computed = crc_ccitt16(data);
    if computed != claimed {
        return Err(FrameError::CrcMismatch { computed, claimed });
    }
    if data.is_empty() {
        return Err(FrameError::Empty);
    }
    let tag = data[0];
    let body = &data[1..];
    match tag {
        TAG_ACK => {
            if body.is_empty() {
                Err(FrameError::Truncated(tag))
            } else {
                Ok(SerialFrame::Ack { seq: body[0] })
            }
        }
        TAG_PACKET => {
            // Needs a sequence byte plus at least one body byte; an empty body is dropped,
            // not acked.
            if body.len() < 2 {
                Err(FrameError::Truncated(tag))
            } else {
                Ok(SerialFrame::Packet { seq: body[0], body: body[1..].to_vec() })
            }
        }
        TAG_NO_ACK_PACKET => Ok(SerialFrame::NoAckPacket { body: body.to_vec() }),
        other => Err(FrameError::UnknownTag(other)),
    }
}

/// Builds the HDLC-encoded wire bytes for a serial inner-protocol frame.
pub fn encode_serial_frame(frame: &SerialFrame) -> Vec<u8> {
    let mut data = Vec::new();
    match frame {
        SerialFrame::Ack { seq } => {
            data.push(TAG_ACK);
            data.push(*seq);
        }
        SerialFrame::Packet { seq, body } => {
            data.push(TAG_PACKET);
            data.push(*seq);
            data.extend_from_slice(body);
        }
        SerialFrame::NoAckPacket { body } => {
            data.push(TAG_NO_ACK_PACKET);
            data.extend_from_slice(body);
        }
    }
    let crc = crc_ccitt16(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    hdlc_encode(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut decoder = HdlcDecoder::new();
        bytes.iter().filter_map(|&b| decoder.push_byte(b)).collect()
    }

    #[test]
    fn raw_escape_round_trips() {
        let raw = [0x7E, 0x7D, 0x00];
        let encoded = hdlc_encode(&raw);
        assert_eq!(encoded, vec![0x7E, 0x7D, 0x5E, 0x7D, 0x5D, 0x00, 0x7E]);
        let frames = decode_all(&encoded);
        assert_eq!(frames, vec![raw.to_vec()]);
    }

    #[test]
    fn empty_frame_between_delimiters_is_ignored() {
        // Two adjacent FRAME bytes (no content) must not produce a spurious frame.
        let frames = decode_all(&[0x7E, 0x7E, 0x01, 0x7E]);
        assert_eq!(frames, vec![vec![0x01]]);
    }

    #[test]
    fn scenario_received_ack_less_frame() {
        let wire = [0x7E, 0x44, 0x00, 0xFF, 0x9D, 0xDF, 0x7E];
        let frames = decode_all(&wire);
        assert_eq!(frames.len(), 1);
        let parsed = parse_serial_frame(&frames[0]).unwrap();
        assert_eq!(parsed, SerialFrame::Packet { seq: 0x00, body: vec![0xFF] });
    }

    #[test]
    fn scenario_escaped_payload() {
        let wire = [0x7E, 0x44, 0x00, 0x0E, 0x7D, 0x5E, 0x7D, 0x5E, 0x7D, 0x5E, 0xED, 0xB9, 0x7E];
        let frames = decode_all(&wire);
        assert_eq!(frames.len(), 1);
        let parsed = parse_serial_frame(&frames[0]).unwrap();
        assert_eq!(
            parsed,
            SerialFrame::Packet { seq: 0x00, body: vec![0x0E, 0x7E, 0x7E, 0x7E] }
        );
    }

    #[test]
    fn serial_frame_round_trips_through_hdlc() {
        let frame = SerialFrame::NoAckPacket { body: vec![0x7E, 0x7D, 0x00] };
        let wire = encode_serial_frame(&frame);
        let decoded = decode_all(&wire);
        assert_eq!(decoded.len(), 1);
        assert_eq!(parse_serial_frame(&decoded[0]).unwrap(), frame);
    }

    #[test]
    fn crc_mismatch_is_rejected() {
        let mut wire = encode_serial_frame(&SerialFrame::Ack { seq: 3 });
        // Flip a payload bit inside the frame (index 2, past the leading FRAME_BYTE).
        wire[2] ^= 0xFF;
        let decoded = decode_all(&wire);
        assert_eq!(decoded.len(), 1);
        assert!(matches!(parse_serial_frame(&decoded[0]), Err(FrameError::CrcMismatch { .. })));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut data = vec![0x99u8];
        let crc = crc_ccitt16(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        let wire = hdlc_encode(&data);
        let decoded = decode_all(&wire);
        assert!(matches!(parse_serial_frame(&decoded[0]), Err(FrameError::UnknownTag(0x99))));
    }

    #[test]
    fn packet_with_empty_body_is_rejected() {
        let mut data = vec![TAG_PACKET, 0x00];
        let crc = crc_ccitt16(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        let wire = hdlc_encode(&data);
        let decoded = decode_all(&wire);
        assert!(matches!(parse_serial_frame(&decoded[0]), Err(FrameError::Truncated(TAG_PACKET))));
    }
}
