mod address;
mod errors;
mod gpio;
mod message;
mod parser;
mod payload;
mod radio;

#[macro_use]
extern crate log;

pub use crate::address::Address;
pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::gpio::{Gpio, Pin, SharedGpio, LED_BLUE, LED_GREEN, LED_RED};
pub use crate::message::{Frequency, GenericReply, Message, ReceiveEvent, VersionReply};
pub use crate::parser::Parser;
pub use crate::payload::{
    AircraftType, Coordinate, GroundTrackingType, Payload, PayloadType, ServiceHeader,
    TEMPERATURE_INVALID,
};
pub use crate::radio::{PacketReader, Radio, RadioConfig, RadioPort, RadioState};
