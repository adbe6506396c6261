use std::fmt::{self, Display};
use std::path::Path;

use fanet::{Coordinate, Frequency, Pin, RadioConfig};
use serde::Deserialize;

// compiled configuration format version; the file's major must match, its
// minor must be at least this
const CONFIG_VER_MAJOR: u32 = 1;
const CONFIG_VER_MINOR: u32 = 0;

const TXPOWER_MIN: i32 = 2; // dBm
const TXPOWER_MAX: i32 = 20;

#[derive(Debug)]
pub struct ConfigError(String);

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    version: String,
    #[serde(default)]
    pub radio: RadioSection,
    #[serde(default)]
    pub fanet: FanetSection,
    #[serde(default)]
    pub stations: Vec<StationSection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: format!("{}.{}", CONFIG_VER_MAJOR, CONFIG_VER_MINOR),
            radio: RadioSection::default(),
            fanet: FanetSection::default(),
            stations: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|error| ConfigError(format!("failed to open config file: {}", error)))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text)
            .map_err(|error| ConfigError(format!("failed to parse config: {}", error)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (major, minor) = self.parse_version()?;
        if major != CONFIG_VER_MAJOR || minor < CONFIG_VER_MINOR {
            return Err(ConfigError(format!(
                "config version mismatch (expected version: {}.{}, got version: {}.{})",
                CONFIG_VER_MAJOR, CONFIG_VER_MINOR, major, minor
            )));
        }

        self.radio_config()?;

        for station in &self.stations {
            if station.kind == StationKind::HolfuyApi && station.api_key.is_empty() {
                return Err(ConfigError(format!(
                    "station #{}: holfuyapi requires an api_key",
                    station.id
                )));
            }
        }
        Ok(())
    }

    fn parse_version(&self) -> Result<(u32, u32), ConfigError> {
        let error = || {
            ConfigError(format!(
                "failed to parse version number: '{}'",
                self.version
            ))
        };
        let (major, minor) = self.version.split_once('.').ok_or_else(error)?;
        Ok((
            major.parse().map_err(|_| error())?,
            minor.parse().map_err(|_| error())?,
        ))
    }

    pub fn radio_config(&self) -> Result<RadioConfig, ConfigError> {
        let radio = &self.radio;
        if radio.uart.is_empty() {
            return Err(ConfigError("uart device empty".to_string()));
        }
        if radio.txpower < TXPOWER_MIN || radio.txpower > TXPOWER_MAX {
            return Err(ConfigError(format!(
                "txpower out of range: {} (expected: {} - {})",
                radio.txpower, TXPOWER_MIN, TXPOWER_MAX
            )));
        }
        let frequency = match radio.frequency {
            868 => Frequency::Mhz868,
            915 => Frequency::Mhz915,
            other => {
                return Err(ConfigError(format!(
                    "failed to parse frequency: '{}' (expected '868' or '915')",
                    other
                )))
            }
        };
        let (pin_boot, invert_boot) = Pin::parse(&radio.pin_boot)
            .ok_or_else(|| ConfigError(format!("failed to parse pin 'boot': '{}'", radio.pin_boot)))?;
        let (pin_reset, invert_reset) = Pin::parse(&radio.pin_reset).ok_or_else(|| {
            ConfigError(format!("failed to parse pin 'reset': '{}'", radio.pin_reset))
        })?;

        Ok(RadioConfig {
            uart: radio.uart.clone(),
            tx_power: radio.txpower,
            frequency,
            pin_boot,
            pin_reset,
            invert_boot,
            invert_reset,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RadioSection {
    pub uart: String,
    pub txpower: i32,
    pub frequency: u32,
    pub pin_boot: String,
    pub pin_reset: String,
}

impl Default for RadioSection {
    fn default() -> Self {
        Self {
            uart: "/dev/ttyAMA0".to_string(),
            txpower: 14,
            frequency: 868,
            pin_boot: "dtr".to_string(),
            pin_reset: "rts".to_string(),
        }
    }
}

/// Broadcast cadences and the activity gate, all in seconds. A zero
/// interval disables the respective feature.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FanetSection {
    pub tx_interval_weather: u64,
    pub tx_interval_names: u64,
    pub inactivity_timeout: u64,
    pub weather_data_max_age: u64,
}

impl Default for FanetSection {
    fn default() -> Self {
        Self {
            tx_interval_weather: 40,
            tx_interval_names: 300,
            inactivity_timeout: 3600,
            weather_data_max_age: 600,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StationKind {
    HolfuyApi,
    HolfuyWidget,
    Windbird,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationSection {
    #[serde(rename = "type")]
    pub kind: StationKind,
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
}

fn default_update_interval() -> u64 {
    60
}

impl StationSection {
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude, self.altitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        version = "1.0"

        [radio]
        uart = "/dev/ttyUSB0"
        txpower = 14
        frequency = 868
        pin_boot = "dtr"
        pin_reset = "!rts"

        [fanet]
        tx_interval_weather = 40
        tx_interval_names = 240
        inactivity_timeout = 600
        weather_data_max_age = 120

        [[stations]]
        type = "holfuyapi"
        id = 101
        name = "Koessen"
        api_key = "secret"
        latitude = 47.5
        longitude = 10.25
        altitude = 720.0
        update_interval = 60

        [[stations]]
        type = "windbird"
        id = 1333
        latitude = 45.2
        longitude = 6.3
    "#;

    #[test]
    fn parses_a_full_config() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.fanet.tx_interval_weather, 40);
        assert_eq!(config.fanet.weather_data_max_age, 120);
        assert_eq!(config.stations.len(), 2);
        assert_eq!(config.stations[0].name, "Koessen");
        assert_eq!(config.stations[1].update_interval, 60);

        let radio = config.radio_config().unwrap();
        assert_eq!(radio.uart, "/dev/ttyUSB0");
        assert_eq!(radio.frequency, Frequency::Mhz868);
        assert_eq!(radio.pin_reset, Pin::UartRts);
        assert!(radio.invert_reset);
        assert!(!radio.invert_boot);
    }

    #[test]
    fn rejects_version_mismatch() {
        assert!(Config::parse("version = \"2.0\"").is_err());
        assert!(Config::parse("version = \"1\"").is_err());
        assert!(Config::parse("").is_err());
        assert!(Config::parse("version = \"1.0\"").is_ok());
        // newer minor versions are accepted
        assert!(Config::parse("version = \"1.7\"").is_ok());
    }

    #[test]
    fn rejects_out_of_range_radio_settings() {
        let config = "version = \"1.0\"\n[radio]\ntxpower = 1";
        assert!(Config::parse(config).is_err());
        let config = "version = \"1.0\"\n[radio]\ntxpower = 21";
        assert!(Config::parse(config).is_err());
        let config = "version = \"1.0\"\n[radio]\nfrequency = 433";
        assert!(Config::parse(config).is_err());
        let config = "version = \"1.0\"\n[radio]\npin_boot = \"bogus\"";
        assert!(Config::parse(config).is_err());
    }

    #[test]
    fn requires_api_key_for_holfuy_api() {
        let config = r#"
            version = "1.0"
            [[stations]]
            type = "holfuyapi"
            id = 101
            latitude = 47.5
            longitude = 10.25
        "#;
        assert!(Config::parse(config).is_err());
    }

    #[test]
    fn defaults_are_complete() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.radio_config().unwrap().tx_power, 14);
        assert_eq!(config.fanet.tx_interval_weather, 40);
    }
}
