use std::fmt::{self, Display};

use crate::{Error, ErrorKind, Result};

const MANUFACTURER_ID_INVALID: u8 = 0xFF;
const DEVICE_ID_INVALID: u16 = 0xFFFF;

/// 24-bit FANET address: 8-bit manufacturer ID + 16-bit device ID.
///
/// `(0, 0)` is the broadcast address, `(0xFF, 0xFFFF)` the invalid sentinel.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Address {
    manufacturer: u8,
    device: u16,
}

impl Address {
    pub const BROADCAST: Address = Address {
        manufacturer: 0,
        device: 0,
    };

    pub const INVALID: Address = Address {
        manufacturer: MANUFACTURER_ID_INVALID,
        device: DEVICE_ID_INVALID,
    };

    pub fn new(manufacturer: u8, device: u16) -> Self {
        Self {
            manufacturer,
            device,
        }
    }

    /// Parses the textual form used on the serial line, e.g. "11,45aa" or
    /// "b:32e". Fields are hex with variable width: one or two digits for
    /// the manufacturer, up to four for the device.
    pub fn parse(data: &str) -> Result<Self> {
        let data = data.trim();
        let sep = match (data.find(','), data.find(':')) {
            (Some(a), Some(b)) => a.max(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return Err(invalid(data)),
        };
        if sep == 0 || sep > 2 || data.len() <= sep + 1 {
            return Err(invalid(data));
        }
        let manufacturer = u16::from_str_radix(&data[..sep], 16).map_err(|_| invalid(data))?;
        let device = u16::from_str_radix(&data[sep + 1..], 16).map_err(|_| invalid(data))?;
        Ok(Self {
            manufacturer: (manufacturer & 0xFF) as u8,
            device,
        })
    }

    pub fn from_u32(addr: u32) -> Self {
        Self {
            manufacturer: ((addr & 0x00FF_0000) >> 16) as u8,
            device: (addr & 0x0000_FFFF) as u16,
        }
    }

    pub fn to_u32(self) -> u32 {
        (u32::from(self.manufacturer) << 16) | u32::from(self.device)
    }

    pub fn manufacturer(self) -> u8 {
        self.manufacturer
    }

    pub fn device(self) -> u16 {
        self.device
    }

    pub fn is_valid(self) -> bool {
        self.manufacturer != MANUFACTURER_ID_INVALID && self.device != DEVICE_ID_INVALID
    }

    pub fn is_broadcast(self) -> bool {
        self.manufacturer == 0 && self.device == 0
    }

    /// Fixed-width lowercase hex, e.g. `to_hex(':')` -> "11:45aa".
    pub fn to_hex(self, separator: char) -> String {
        format!("{:02x}{}{:04x}", self.manufacturer, separator, self.device)
    }

    // see protocol.txt
    pub fn manufacturer_name(self) -> &'static str {
        match self.manufacturer {
            0x00 | 0xFF => "reserved/broadcast",
            0x01 => "Skytraxx",
            0x03 => "BitBroker.eu",
            0x04 => "AirWhere",
            0x05 => "Windline",
            0x06 => "Burnair.ch",
            0x07 => "SoftRF",
            0x08 => "GXAircom",
            0x09 => "Airtribune",
            0x0A => "FLARM",
            0x0B => "FlyBeeper",
            0x10 => "alfapilot",
            0x11 => "FANET+",
            0x20 => "XC Tracer",
            0xCB => "Cloudbuddy",
            0xDD | 0xDE | 0xDF | 0xF0 => "reserved (compat.)",
            0xE0 => "OGN Tracker",
            0xE4 => "4aviation",
            0xFA => "Various",
            0xFB => "Espressif based stations",
            0xFC | 0xFD => "Unregistered devices",
            0xFE => "reserved/multicast",
            _ => "Invalid/Unknown",
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::BROADCAST
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex(':'))
    }
}

fn invalid(data: &str) -> Error {
    ErrorKind::InvalidAddress(data.to_string()).into()
}
