use crate::{GenericReply, Message, ReceiveEvent, Result, VersionReply};

pub const START_DELIMITER: u8 = b'#';
pub const END_DELIMITER: u8 = b'\n';

const MSG_SIZE_IDENTIFIER: usize = 3;
// radio boot chatter, silently discarded
const MSG_INIT_IGNORE: &[u8] = b"CCCCCC";

const MSG_FANET_RECEIVE: &str = "FNF";
const MSG_FANET_REPLY: &str = "FNR";
const MSG_VERSION_REPLY: &str = "DGV";
const MSG_REGION_REPLY: &str = "DGR";

/// Streaming parser for the `#...\n` framing on the serial line.
///
/// Feed it whatever bytes are available; it hands back the messages whose
/// end delimiter has been seen. Incomplete frames stay buffered.
#[derive(Default)]
pub struct Parser {
    buffer: Vec<u8>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes `bytes` and returns all completed messages, in arrival order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Message> {
        let mut messages = Vec::new();
        for &byte in bytes {
            match byte {
                START_DELIMITER => {
                    // ignore initialization progress (CCCC...)
                    if !self.buffer.is_empty() && !self.buffer.starts_with(MSG_INIT_IGNORE) {
                        warn!(
                            "discarding incomplete message: '{}'",
                            String::from_utf8_lossy(&self.buffer)
                        );
                    }
                    self.buffer.clear();
                }
                END_DELIMITER => {
                    let body = std::mem::take(&mut self.buffer);
                    debug!("msg received: '{}'", String::from_utf8_lossy(&body));
                    if let Some(msg) = Self::parse_body(&body) {
                        messages.push(msg);
                    }
                }
                byte => self.buffer.push(byte),
            }
        }
        messages
    }

    /// Parses one frame body. The first three characters identify the
    /// message kind; bodies shorter than four bytes are ignored. Unknown or
    /// malformed bodies are logged and dropped, the stream continues.
    pub fn parse_body(body: &[u8]) -> Option<Message> {
        if body.len() <= MSG_SIZE_IDENTIFIER {
            return None;
        }
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        if text.len() <= MSG_SIZE_IDENTIFIER {
            return None;
        }
        // lossy decoding may leave a multi-byte replacement at the front
        let Some(prefix) = text.get(..MSG_SIZE_IDENTIFIER) else {
            warn!("message ignored (raw data: {})", hex::encode(body));
            return None;
        };
        let rest = &text[MSG_SIZE_IDENTIFIER..];

        let parsed: Result<Message> = match prefix {
            MSG_FANET_RECEIVE => ReceiveEvent::parse(rest).map(Message::PktReceived),
            MSG_FANET_REPLY => GenericReply::parse(rest).map(Message::FanetReply),
            MSG_VERSION_REPLY => Ok(Message::VersionReply(VersionReply::parse(rest))),
            MSG_REGION_REPLY => GenericReply::parse(rest).map(Message::RegionReply),
            _ => {
                warn!("message '{}' ignored (raw data: {})", prefix, hex::encode(body));
                return None;
            }
        };

        match parsed {
            Ok(msg) => Some(msg),
            Err(error) => {
                warn!("failed to parse message '{}': {}", text, error);
                None
            }
        }
    }

    /// Serializes a command into exactly one `#BODY\n` frame.
    pub fn frame(msg: &Message) -> Result<Vec<u8>> {
        let body = msg.serialize()?;
        let mut frame = Vec::with_capacity(body.len() + 2);
        frame.push(START_DELIMITER);
        frame.extend_from_slice(body.as_bytes());
        frame.push(END_DELIMITER);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, Payload, PayloadType};

    #[test]
    fn yields_messages_delimited_by_frames() {
        let mut parser = Parser::new();
        let messages = parser.push(b"#FNR OK\n#DGR OK\n");
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], Message::FanetReply(GenericReply::Ok)));
        assert!(matches!(messages[1], Message::RegionReply(GenericReply::Ok)));
    }

    #[test]
    fn reassembles_split_frames() {
        let mut parser = Parser::new();
        assert!(parser.push(b"#FNR M").is_empty());
        assert!(parser.push(b"SG,1,initial").is_empty());
        let messages = parser.push(b"ized\n");
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            Message::FanetReply(GenericReply::Msg { code, text }) => {
                assert_eq!(*code, 1);
                assert_eq!(text, "initialized");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn ignores_boot_chatter() {
        let mut parser = Parser::new();
        let messages = parser.push(b"#CCCCC\n#FNR OK\n");
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], Message::FanetReply(GenericReply::Ok)));
    }

    #[test]
    fn stray_start_delimiter_discards_partial_frame() {
        let mut parser = Parser::new();
        let messages = parser.push(b"#FNR OK#DGR OK\n");
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], Message::RegionReply(GenericReply::Ok)));
    }

    #[test]
    fn ignores_unknown_and_short_bodies() {
        let mut parser = Parser::new();
        assert!(parser.push(b"#XYZ 1,2,3\n").is_empty());
        assert!(parser.push(b"#FN\n").is_empty());
        assert!(parser.push(b"#\n").is_empty());
    }

    #[test]
    fn malformed_bodies_are_dropped_and_stream_continues() {
        let mut parser = Parser::new();
        // tracking payload with an invalid length, then a valid reply
        let messages = parser.push(b"#FNF 11,5C0B,1,0,1,6,5006FC0A0400\n#FNR OK\n");
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], Message::FanetReply(GenericReply::Ok)));
    }

    #[test]
    fn parses_receive_event_frame() {
        let mut parser = Parser::new();
        let messages = parser.push(b"#FNF 11,5C0B,1,0,2,7,4b6f657373656e\n");
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            Message::PktReceived(event) => {
                assert_eq!(event.sender, Address::new(0x11, 0x5C0B));
                assert_eq!(event.payload.payload_type(), PayloadType::Name);
                assert_eq!(event.payload.name().as_deref(), Some("Koessen"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn version_reply_carries_firmware_id() {
        let mut parser = Parser::new();
        let messages = parser.push(b"#DGV build-202201131742\n");
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            Message::VersionReply(reply) => {
                assert_eq!(reply.version(), Some("202201131742"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn frame_writer_emits_exactly_one_frame() {
        let frame = Parser::frame(&Message::Version).unwrap();
        assert_eq!(frame, b"#DGV\n");

        let frame = Parser::frame(&Message::Transmit {
            addr: Address::BROADCAST,
            payload: Payload::name_payload("K"),
        })
        .unwrap();
        assert_eq!(frame, b"#FNT 2,00,0000,0,0,1,4b\n");
    }
}
