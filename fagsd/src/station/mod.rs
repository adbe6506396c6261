mod holfuy_api;
mod holfuy_widget;
mod windbird;

use std::fmt::{self, Display};

use bitflags::bitflags;
use chrono::{DateTime, Utc};

use crate::config::{StationKind, StationSection};
pub use holfuy_api::HolfuyApi;
pub use holfuy_widget::HolfuyWidget;
pub use windbird::Windbird;

pub const NETWORK_TIMEOUT_SECS: u64 = 15;

bitflags! {
    /// Which fields of an observation carry real data.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct WeatherData: u8 {
        const WIND_SPEED = 0x01;
        const WIND_GUSTS = 0x02;
        const WIND_DIRECTION = 0x04;
        const TEMPERATURE = 0x08;
        const HUMIDITY = 0x10;
    }
}

/// One weather sample from an upstream provider. Wind speeds in km/h×10,
/// temperature in °C×10, direction in whole degrees.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Station display name from the feed, if the provider reports one.
    pub station_name: Option<String>,
    pub last_update: DateTime<Utc>,
    pub wind_direction: i32,
    pub wind_speed: i32,
    pub wind_gusts: i32,
    pub temperature: i32,
    pub humidity: Option<i32>,
    pub available: WeatherData,
}

#[derive(Debug)]
pub struct StationError(pub String);

impl Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StationError {}

impl From<reqwest::Error> for StationError {
    fn from(error: reqwest::Error) -> Self {
        StationError(format!("request failed: {}", error))
    }
}

/// A weather station provider adapter. Each variant fetches and parses one
/// provider's live data into an `Observation`.
#[derive(Clone, Debug)]
pub enum Station {
    HolfuyApi(HolfuyApi),
    HolfuyWidget(HolfuyWidget),
    Windbird(Windbird),
}

impl Station {
    pub fn from_config(config: &StationSection) -> Station {
        match config.kind {
            StationKind::HolfuyApi => {
                Station::HolfuyApi(HolfuyApi::new(config.id, &config.api_key))
            }
            StationKind::HolfuyWidget => Station::HolfuyWidget(HolfuyWidget::new(config.id)),
            StationKind::Windbird => {
                // the OpenWindMap API community licence requires this notice
                info!(
                    "Wind data (c) contributors of the OpenWindMap wind network <https://openwindmap.org>"
                );
                Station::Windbird(Windbird::new(config.id))
            }
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Station::HolfuyApi(station) => station.id(),
            Station::HolfuyWidget(station) => station.id(),
            Station::Windbird(station) => station.id(),
        }
    }

    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Observation, StationError> {
        match self {
            Station::HolfuyApi(station) => station.fetch(client).await,
            Station::HolfuyWidget(station) => station.fetch(client).await,
            Station::Windbird(station) => station.fetch(client).await,
        }
    }
}

/// Fetches a body with an upper size bound; oversized replies are refused
/// rather than half-parsed.
async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    size_max: usize,
) -> Result<String, StationError> {
    let response = client.get(url).send().await?;
    let body = response.text().await?;
    if body.len() > size_max {
        return Err(StationError(format!(
            "reply too large ({} bytes, limit {})",
            body.len(),
            size_max
        )));
    }
    Ok(body)
}
