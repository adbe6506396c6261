use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex};

/// Status LEDs, available on Raspberry Pi builds only.
pub const LED_GREEN: Pin = Pin::Rpi(11);
pub const LED_RED: Pin = Pin::Rpi(13);
pub const LED_BLUE: Pin = Pin::Rpi(15);

/// A controllable pin: either a UART modem-control line or a pin on the
/// Raspberry Pi J8 header (identified by its header pin number).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Pin {
    None,
    UartCts,
    UartRts,
    UartDtr,
    Rpi(u8),
}

impl Pin {
    /// Parses a pin name from configuration, e.g. "rts", "dtr" or
    /// "rpij8pin11". A leading '!' inverts the pin.
    pub fn parse(text: &str) -> Option<(Pin, bool)> {
        let text = text.trim().to_ascii_lowercase();
        let (invert, name) = match text.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, text.as_str()),
        };
        let pin = match name {
            "cts" => Pin::UartCts,
            "rts" => Pin::UartRts,
            "dtr" => Pin::UartDtr,
            _ => {
                let number: u8 = name.strip_prefix("rpij8pin")?.parse().ok()?;
                if bcm_gpio(number).is_none() {
                    return None;
                }
                Pin::Rpi(number)
            }
        };
        Some((pin, invert))
    }

    pub fn is_modem_line(self) -> bool {
        matches!(self, Pin::UartRts | Pin::UartDtr)
    }
}

impl Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pin::None => write!(f, "none"),
            Pin::UartCts => write!(f, "CTS"),
            Pin::UartRts => write!(f, "RTS"),
            Pin::UartDtr => write!(f, "DTR"),
            Pin::Rpi(number) => write!(f, "RpiJ8Pin{:02}", number),
        }
    }
}

/// BCM GPIO number for a J8 header pin (Raspberry Pi B+ and later).
fn bcm_gpio(header_pin: u8) -> Option<u8> {
    match header_pin {
        3 => Some(2),
        5 => Some(3),
        7 => Some(4),
        8 => Some(14),
        10 => Some(15),
        11 => Some(17),
        12 => Some(18),
        13 => Some(27),
        15 => Some(22),
        16 => Some(23),
        18 => Some(24),
        19 => Some(10),
        21 => Some(9),
        22 => Some(25),
        23 => Some(11),
        24 => Some(8),
        26 => Some(7),
        29 => Some(5),
        31 => Some(6),
        32 => Some(12),
        33 => Some(13),
        35 => Some(19),
        36 => Some(16),
        37 => Some(26),
        38 => Some(20),
        40 => Some(21),
        _ => None,
    }
}

/// Output-pin capability. SoC pins are driven through rppal when the
/// `rpi-gpio` feature is enabled and logged no-ops otherwise; modem-control
/// pins are driven by whoever owns the serial port, using `level()` to apply
/// the invert flag.
#[derive(Default)]
pub struct Gpio {
    invert: HashMap<Pin, bool>,
    #[cfg(feature = "rpi-gpio")]
    outputs: HashMap<Pin, rppal::gpio::OutputPin>,
}

pub type SharedGpio = Arc<Mutex<Gpio>>;

impl Gpio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedGpio {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn init_pin(&mut self, pin: Pin, invert: bool) {
        debug!(
            "configuring pin {} as output{}",
            pin,
            if invert { " (inverted)" } else { "" }
        );
        self.invert.insert(pin, invert);

        #[cfg(feature = "rpi-gpio")]
        if let Pin::Rpi(number) = pin {
            match bcm_gpio(number).map(|bcm| {
                rppal::gpio::Gpio::new().and_then(|gpio| Ok(gpio.get(bcm)?.into_output()))
            }) {
                Some(Ok(output)) => {
                    self.outputs.insert(pin, output);
                }
                Some(Err(error)) => error!("failed to configure pin {}: {}", pin, error),
                None => error!("pin {} has no gpio function", pin),
            }
        }
    }

    pub fn is_inverted(&self, pin: Pin) -> bool {
        self.invert.get(&pin).copied().unwrap_or(false)
    }

    /// The electrical level for a logical value, with the invert flag
    /// applied.
    pub fn level(&self, pin: Pin, value: bool) -> bool {
        self.is_inverted(pin) ^ value
    }

    /// Drives an SoC pin. Modem-control pins cannot be driven here, they
    /// belong to the serial port owner.
    pub fn set(&mut self, pin: Pin, value: bool) {
        if pin.is_modem_line() {
            warn!("pin {} is a modem-control line, ignored", pin);
            return;
        }
        let level = self.level(pin, value);
        debug!("setting gpio {} to {}", pin, level);

        #[cfg(feature = "rpi-gpio")]
        if let Some(output) = self.outputs.get_mut(&pin) {
            if level {
                output.set_high();
            } else {
                output.set_low();
            }
        }
        #[cfg(not(feature = "rpi-gpio"))]
        let _ = level;
    }

    pub fn clear(&mut self, pin: Pin) {
        self.set(pin, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modem_lines() {
        assert_eq!(Pin::parse("rts"), Some((Pin::UartRts, false)));
        assert_eq!(Pin::parse("DTR"), Some((Pin::UartDtr, false)));
        assert_eq!(Pin::parse("!rts"), Some((Pin::UartRts, true)));
    }

    #[test]
    fn parses_header_pins() {
        assert_eq!(Pin::parse("rpij8pin11"), Some((Pin::Rpi(11), false)));
        assert_eq!(Pin::parse("!RpiJ8Pin40"), Some((Pin::Rpi(40), true)));
        // header pins without a gpio function
        assert_eq!(Pin::parse("rpij8pin01"), None);
        assert_eq!(Pin::parse("rpij8pin09"), None);
        assert_eq!(Pin::parse("bogus"), None);
    }

    #[test]
    fn invert_flag_flips_levels() {
        let mut gpio = Gpio::new();
        gpio.init_pin(Pin::UartRts, true);
        gpio.init_pin(Pin::UartDtr, false);
        assert!(!gpio.level(Pin::UartRts, true));
        assert!(gpio.level(Pin::UartRts, false));
        assert!(gpio.level(Pin::UartDtr, true));
        // unconfigured pins default to non-inverted
        assert!(gpio.level(Pin::Rpi(11), true));
    }
}
