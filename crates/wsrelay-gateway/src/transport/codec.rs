//! Frame classification for the tungstenite transport.
//!
//! - Text/Binary frames => raw payload bytes handed to the envelope codec
//! - Ping/Pong are transport keepalive and never reach the session loop
//! - Close ends the connection

use tokio_tungstenite::tungstenite::Message;

#[derive(Debug)]
pub enum Inbound {
    Data(Vec<u8>),
    Keepalive,
    Close,
}

pub fn decode(msg: Message) -> Inbound {
    match msg {
        Message::Text(s) => Inbound::Data(s.as_bytes().to_vec()),
        Message::Binary(b) => Inbound::Data(b.to_vec()),
        // tungstenite answers pings itself; raw frames never surface on read
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Keepalive,
        Message::Close(_) => Inbound::Close,
    }
}

/// Wrap an encoded envelope as a text frame.
pub fn text_frame(payload: Vec<u8>) -> Result<Message, std::string::FromUtf8Error> {
    String::from_utf8(payload).map(Message::text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keepalive_frames_never_carry_data() {
        assert!(matches!(decode(Message::Ping(vec![1u8].into())), Inbound::Keepalive));
        assert!(matches!(decode(Message::Pong(Vec::<u8>::new().into())), Inbound::Keepalive));
        assert!(matches!(decode(Message::Close(None)), Inbound::Close));
    }

    #[test]
    fn text_and_binary_yield_payload() {
        let Inbound::Data(b) = decode(Message::text("{}")) else { panic!("expected data") };
        assert_eq!(b, b"{}");
        let Inbound::Data(b) = decode(Message::binary(vec![0x7bu8, 0x7d])) else { panic!("expected data") };
        assert_eq!(b, b"{}");
    }

    #[test]
    fn non_utf8_payload_is_rejected() {
        assert!(text_frame(vec![0xff, 0xfe]).is_err());
    }
}
