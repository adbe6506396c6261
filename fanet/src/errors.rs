use std::fmt::{self, Display};

use crate::PayloadType;

#[derive(Debug)]
pub enum ErrorKind {
    /// An inbound frame body failed format or length checks.
    MalformedFrame(String),
    /// A frame decoded, but the payload bit layout fails its invariants.
    MalformedPayload {
        ptype: PayloadType,
        reason: String,
    },
    InvalidAddress(String),
    /// Serialization was requested for a message that is not a command.
    NotACommand,
    SerialPort(tokio_serial::Error),
    Io(std::io::Error),
    ChannelClosed,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MalformedFrame(reason) => write!(f, "malformed frame: {}", reason),
            ErrorKind::MalformedPayload { ptype, reason } => {
                write!(f, "malformed {} payload: {}", ptype, reason)
            }
            ErrorKind::InvalidAddress(data) => write!(f, "invalid address: '{}'", data),
            ErrorKind::NotACommand => write!(f, "message is not a command"),
            ErrorKind::SerialPort(error) => write!(f, "serial port error: {}", error),
            ErrorKind::Io(error) => write!(f, "IO error: {}", error),
            ErrorKind::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fanet error: {}", self.kind)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(other: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io(other),
        }
    }
}

impl From<tokio_serial::Error> for Error {
    fn from(other: tokio_serial::Error) -> Self {
        Error {
            kind: ErrorKind::SerialPort(other),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
