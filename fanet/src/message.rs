use std::fmt::{self, Display};

use crate::{Address, Error, ErrorKind, Payload, PayloadType, Result};

const TXPOWER_MIN: i32 = 2; // dBm
const TXPOWER_MAX: i32 = 20;

const REPLY_OK: &str = "OK";
const REPLY_MSG: &str = "MSG";
const REPLY_ERR: &str = "ERR";
const REPLY_ACK: &str = "ACK";
const REPLY_NACK: &str = "NACK";
const REPLY_CODE_INVALID: i32 = -1;

const VERSION_PREFIX: &str = "build-";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Frequency {
    Mhz868,
    Mhz915,
}

impl Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Mhz868 => write!(f, "868MHz"),
            Frequency::Mhz915 => write!(f, "915MHz"),
        }
    }
}

/// Body of a `FNR`/`DGR` reply: comma separated tokens, the first one names
/// the reply kind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GenericReply {
    Ok,
    Msg { code: i32, text: String },
    Error { code: i32, text: String },
    Ack(Address),
    Nack(Address),
}

impl GenericReply {
    pub fn parse(body: &str) -> Result<GenericReply> {
        let tokens: Vec<&str> = body
            .trim()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        let first = *tokens
            .first()
            .ok_or_else(|| malformed_frame("empty reply body"))?;

        match first {
            REPLY_OK => Ok(GenericReply::Ok),
            REPLY_ACK => Ok(GenericReply::Ack(Address::parse(&tokens[1..].join(","))?)),
            REPLY_NACK => Ok(GenericReply::Nack(Address::parse(&tokens[1..].join(","))?)),
            REPLY_MSG | REPLY_ERR => {
                let code = tokens
                    .get(1)
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(REPLY_CODE_INVALID);
                let text = tokens.get(2..).unwrap_or_default().join(",");
                if first == REPLY_MSG {
                    Ok(GenericReply::Msg { code, text })
                } else {
                    Ok(GenericReply::Error { code, text })
                }
            }
            other => Err(malformed_frame(&format!("unknown reply type '{}'", other))),
        }
    }
}

/// Body of a `DGV` reply: the firmware id prefixed with "build-".
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersionReply {
    data: String,
}

impl VersionReply {
    pub fn parse(body: &str) -> VersionReply {
        VersionReply {
            data: body.trim().to_string(),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.data.strip_prefix(VERSION_PREFIX)
    }
}

/// A packet received over the air, decoded from a `FNF` event body.
#[derive(Clone, Debug)]
pub struct ReceiveEvent {
    pub sender: Address,
    pub broadcast: bool,
    pub signature: String,
    pub payload: Payload,
}

impl ReceiveEvent {
    /// Body tokens: `mm,dddd,broadcast,signature,type_hex,len_hex,payload_hex`.
    pub fn parse(body: &str) -> Result<ReceiveEvent> {
        let tokens: Vec<&str> = body
            .trim()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.len() < 7 {
            return Err(malformed_frame(&format!(
                "receive event too short ({})",
                body.trim()
            )));
        }

        let sender = Address::parse(&format!("{},{}", tokens[0], tokens[1]))?;
        let broadcast = tokens[2] == "1";
        let signature = tokens[3].to_string();
        let raw_type = u8::from_str_radix(tokens[4], 16)
            .map_err(|_| malformed_frame(&format!("bad payload type '{}'", tokens[4])))?;
        let bytes = hex::decode(tokens[6])
            .map_err(|_| malformed_frame(&format!("bad payload hex '{}'", tokens[6])))?;
        let payload = Payload::from_received(PayloadType::from_u8(raw_type), bytes)?;

        Ok(ReceiveEvent {
            sender,
            broadcast,
            signature,
            payload,
        })
    }
}

impl Display for ReceiveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self.sender.to_hex(':');
        let p = &self.payload;
        match p.payload_type() {
            PayloadType::Name => {
                write!(f, "{} -> name: {}", addr, p.name().unwrap_or_default())
            }
            PayloadType::Message => {
                write!(f, "{} -> message: {}", addr, p.message().unwrap_or_default())
            }
            PayloadType::Tracking => write!(
                f,
                "{} -> pos: {}, altitude: {}m, speed: {}km/h, climb: {}m/s, heading: {}deg., aircraft: {}",
                addr,
                p.position().unwrap_or_default(),
                p.altitude(),
                p.speed() as f64 / 10.0,
                p.climb() as f64 / 10.0,
                p.heading(),
                p.aircraft_type(),
            ),
            PayloadType::Thermal => write!(
                f,
                "{} -> Thermal @ pos: {}, quality: {}%, altitude: {}m, avg. climb: {}m/s, avg. wind speed: {}km/h, avg. wind heading: {}deg.",
                addr,
                p.position().unwrap_or_default(),
                p.quality(),
                p.altitude(),
                p.climb() as f64 / 10.0,
                p.speed() as f64 / 10.0,
                p.heading(),
            ),
            PayloadType::GroundTracking => write!(
                f,
                "{} -> pos: {}, type: {}",
                addr,
                p.position().unwrap_or_default(),
                p.ground_tracking_type(),
            ),
            PayloadType::HwInfo | PayloadType::HwInfoOld => write!(
                f,
                "{} -> device: {}, firmware: {}, uptime: {}min.",
                addr,
                p.device_name(self.sender.manufacturer()),
                p.firmware_build().unwrap_or_default(),
                p.uptime(),
            ),
            PayloadType::Service => write!(
                f,
                "{} -> pos: {}, temperature: {} C, direction: {} deg., speed: {} km/h, gusts: {} km/h",
                addr,
                p.position().unwrap_or_default(),
                p.temperature() / 10,
                p.wind_direction(),
                p.wind() / 10,
                p.gusts() / 10,
            ),
            other => write!(f, "{} -> {} payload", addr, other),
        }
    }
}

/// The FANET serial protocol message taxonomy: commands we send, replies and
/// events the module sends back. Commands serialize to a frame body; replies
/// and events are produced by the frame parser.
#[derive(Clone, Debug)]
pub enum Message {
    // commands
    Version,
    Region { tx_power: i32, frequency: Frequency },
    Enable(bool),
    Transmit { addr: Address, payload: Payload },
    // replies
    VersionReply(VersionReply),
    RegionReply(GenericReply),
    FanetReply(GenericReply),
    // events
    PktReceived(ReceiveEvent),
}

impl Message {
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Message::Version | Message::Region { .. } | Message::Enable(_) | Message::Transmit { .. }
        )
    }

    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            Message::VersionReply(_) | Message::RegionReply(_) | Message::FanetReply(_)
        )
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Message::PktReceived(_))
    }

    /// Serializes a command into a frame body. Replies and events are not
    /// serialized by this side of the link.
    pub fn serialize(&self) -> Result<String> {
        match self {
            Message::Version => Ok("DGV".to_string()),
            Message::Region {
                tx_power,
                frequency,
            } => {
                let mut tx_power = *tx_power;
                if tx_power < TXPOWER_MIN {
                    warn!(
                        "tx power ({}dBm) is below minimum, using allowed min. tx power: {}dBm",
                        tx_power, TXPOWER_MIN
                    );
                    tx_power = TXPOWER_MIN;
                }
                if tx_power > TXPOWER_MAX {
                    warn!(
                        "tx power ({}dBm) is above maximum, using allowed max. tx power: {}dBm",
                        tx_power, TXPOWER_MAX
                    );
                    tx_power = TXPOWER_MAX;
                }
                let freq = match frequency {
                    Frequency::Mhz868 => "868",
                    Frequency::Mhz915 => "915",
                };
                Ok(format!("DGL {},{}", freq, tx_power))
            }
            Message::Enable(enable) => Ok(format!("DGP {}", if *enable { '1' } else { '0' })),
            Message::Transmit { addr, payload } => {
                if payload.payload_type() == PayloadType::Invalid {
                    return Err(ErrorKind::MalformedPayload {
                        ptype: PayloadType::Invalid,
                        reason: "refusing to transmit invalid payload".to_string(),
                    }
                    .into());
                }
                // forward and req.-ack for unicast only
                let flag = if addr.is_broadcast() { '0' } else { '1' };
                Ok(format!(
                    "FNT {},{},{},{},{:x},{}",
                    payload.payload_type().as_u8(),
                    addr.to_hex(','),
                    flag,
                    flag,
                    payload.data().len(),
                    hex::encode(payload.data()),
                ))
            }
            _ => Err(ErrorKind::NotACommand.into()),
        }
    }
}

fn malformed_frame(reason: &str) -> Error {
    ErrorKind::MalformedFrame(reason.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_version_command() {
        assert_eq!(Message::Version.serialize().unwrap(), "DGV");
    }

    #[test]
    fn serializes_region_command_with_clamping() {
        let msg = Message::Region {
            tx_power: 14,
            frequency: Frequency::Mhz868,
        };
        assert_eq!(msg.serialize().unwrap(), "DGL 868,14");

        let msg = Message::Region {
            tx_power: 1,
            frequency: Frequency::Mhz915,
        };
        assert_eq!(msg.serialize().unwrap(), "DGL 915,2");

        let msg = Message::Region {
            tx_power: 30,
            frequency: Frequency::Mhz868,
        };
        assert_eq!(msg.serialize().unwrap(), "DGL 868,20");
    }

    #[test]
    fn serializes_enable_command() {
        assert_eq!(Message::Enable(true).serialize().unwrap(), "DGP 1");
        assert_eq!(Message::Enable(false).serialize().unwrap(), "DGP 0");
    }

    #[test]
    fn serializes_broadcast_transmit() {
        let msg = Message::Transmit {
            addr: Address::BROADCAST,
            payload: Payload::name_payload("Koessen"),
        };
        assert_eq!(
            msg.serialize().unwrap(),
            "FNT 2,00,0000,0,0,7,4b6f657373656e"
        );
    }

    #[test]
    fn serializes_unicast_transmit_with_ack_request() {
        let msg = Message::Transmit {
            addr: Address::new(0x11, 0x45AA),
            payload: Payload::message_payload("hi"),
        };
        assert_eq!(msg.serialize().unwrap(), "FNT 3,11,45aa,1,1,3,006869");
    }

    #[test]
    fn replies_do_not_serialize() {
        let msg = Message::FanetReply(GenericReply::Ok);
        assert!(msg.serialize().is_err());
    }

    #[test]
    fn parses_generic_replies() {
        assert_eq!(GenericReply::parse("OK").unwrap(), GenericReply::Ok);
        assert_eq!(
            GenericReply::parse(" MSG,1,initialized").unwrap(),
            GenericReply::Msg {
                code: 1,
                text: "initialized".to_string()
            }
        );
        assert_eq!(
            GenericReply::parse("ERR,12,tx busy,try later").unwrap(),
            GenericReply::Error {
                code: 12,
                text: "tx busy,try later".to_string()
            }
        );
        assert_eq!(
            GenericReply::parse("ACK,11,45aa").unwrap(),
            GenericReply::Ack(Address::new(0x11, 0x45AA))
        );
        assert_eq!(
            GenericReply::parse("NACK,b,32e").unwrap(),
            GenericReply::Nack(Address::new(0x0B, 0x032E))
        );
    }

    #[test]
    fn rejects_unknown_and_incomplete_replies() {
        assert!(GenericReply::parse("HELLO,1,2").is_err());
        assert!(GenericReply::parse("").is_err());
        assert!(GenericReply::parse("ACK").is_err());
    }

    #[test]
    fn reply_without_code_uses_invalid_sentinel() {
        assert_eq!(
            GenericReply::parse("MSG").unwrap(),
            GenericReply::Msg {
                code: -1,
                text: String::new()
            }
        );
    }

    #[test]
    fn version_reply_strips_build_prefix() {
        let reply = VersionReply::parse(" build-202201131742 ");
        assert_eq!(reply.version(), Some("202201131742"));

        let reply = VersionReply::parse("garbage");
        assert_eq!(reply.version(), None);
    }

    #[test]
    fn parses_receive_event() {
        let event = ReceiveEvent::parse("11,5C0B,1,0,1,b,5006FC0A0400AA002846400000").unwrap();
        assert_eq!(event.sender, Address::new(0x11, 0x5C0B));
        assert!(event.broadcast);
        assert_eq!(event.signature, "0");
        assert_eq!(event.payload.payload_type(), PayloadType::Tracking);
        assert_eq!(event.payload.altitude(), 170);
    }

    #[test]
    fn rejects_short_or_broken_receive_events() {
        assert!(ReceiveEvent::parse("11,5C0B,1,0,1,b").is_err());
        assert!(ReceiveEvent::parse("11,5C0B,1,0,zz,b,5006FC0A0400AA002846400000").is_err());
        assert!(ReceiveEvent::parse("11,5C0B,1,0,1,b,50zzFC").is_err());
        // tracking payload too short for its layout
        assert!(ReceiveEvent::parse("11,5C0B,1,0,1,6,5006FC0A0400").is_err());
    }

    #[test]
    fn receive_event_display_describes_tracking() {
        let event = ReceiveEvent::parse("11,5C0B,1,0,1,d,5006FC0A0400AA00284640").unwrap();
        let text = event.to_string();
        assert!(text.starts_with("11:5c0b -> pos:"), "got: {}", text);
        assert!(text.contains("altitude: 170m"), "got: {}", text);
    }
}
