use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{fetch_text, Observation, StationError, WeatherData};
use fanet::TEMPERATURE_INVALID;

const REPLY_SIZE_MAX: usize = 2048;

const API_URL: &str = "http://api.pioupiou.fr/v1/live/{id}";

/// Windbird/Pioupiou anemometers from the OpenWindMap network. Wind only,
/// no temperature sensor.
#[derive(Clone, Debug)]
pub struct Windbird {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct LiveReply {
    data: ReplyData,
}

#[derive(Debug, Deserialize)]
struct ReplyData {
    #[serde(default)]
    meta: Option<ReplyMeta>,
    measurements: Measurements,
}

#[derive(Debug, Deserialize)]
struct ReplyMeta {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Measurements {
    date: String,
    #[serde(default)]
    wind_heading: Option<f64>,
    #[serde(default)]
    wind_speed_avg: Option<f64>,
    #[serde(default)]
    wind_speed_max: Option<f64>,
}

impl Windbird {
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Observation, StationError> {
        let url = API_URL.replace("{id}", &self.id.to_string());
        let body = fetch_text(client, &url, REPLY_SIZE_MAX).await?;
        debug!("windbird-{}: json data: {}", self.id, body);
        parse_reply(&body)
    }
}

fn parse_reply(body: &str) -> Result<Observation, StationError> {
    let reply: LiveReply = serde_json::from_str(body)
        .map_err(|error| StationError(format!("failed to parse json data: {}", error)))?;
    let measurements = reply.data.measurements;

    let last_update = DateTime::parse_from_rfc3339(&measurements.date)
        .map_err(|error| {
            StationError(format!(
                "failed to parse timestamp '{}': {}",
                measurements.date, error
            ))
        })?
        .with_timezone(&Utc);

    Ok(Observation {
        station_name: reply
            .data
            .meta
            .and_then(|meta| meta.name)
            .filter(|name| !name.is_empty()),
        last_update,
        wind_direction: measurements.wind_heading.map(|v| v.round() as i32).unwrap_or(0),
        wind_speed: measurements
            .wind_speed_avg
            .map(|v| (v * 10.0).round() as i32)
            .unwrap_or(0),
        wind_gusts: measurements
            .wind_speed_max
            .map(|v| (v * 10.0).round() as i32)
            .unwrap_or(0),
        temperature: TEMPERATURE_INVALID * 10,
        humidity: None,
        available: WeatherData::WIND_DIRECTION
            | WeatherData::WIND_SPEED
            | WeatherData::WIND_GUSTS,
    })
}
