use chrono::NaiveDateTime;
use serde::Deserialize;

use super::{fetch_text, Observation, StationError, WeatherData};

const REPLY_SIZE_MAX: usize = 1024;
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const WIND_UNIT: &str = "km/h";

// newest station data; avg=1 would select the 15 min average instead
const API_URL: &str = "http://api.holfuy.com/live/?s={id}&pw={key}&m=JSON&tu=C&su=km/h&avg=0&utc";

#[derive(Clone, Debug)]
pub struct HolfuyApi {
    id: u32,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct LiveReply {
    #[serde(rename = "stationName", default)]
    station_name: Option<String>,
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(default)]
    temperature: Option<f64>,
    wind: WindReply,
}

#[derive(Debug, Deserialize)]
struct WindReply {
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    gust: Option<f64>,
    #[serde(default)]
    direction: Option<i32>,
    #[serde(default)]
    unit: Option<String>,
}

impl HolfuyApi {
    pub fn new(id: u32, api_key: &str) -> Self {
        Self {
            id,
            api_key: api_key.to_string(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Observation, StationError> {
        let url = API_URL
            .replace("{id}", &self.id.to_string())
            .replace("{key}", &self.api_key);
        let body = fetch_text(client, &url, REPLY_SIZE_MAX).await?;
        debug!("holfuy-{}: json data: {}", self.id, body);
        parse_reply(&body)
    }
}

fn parse_reply(body: &str) -> Result<Observation, StationError> {
    let reply: LiveReply = serde_json::from_str(body)
        .map_err(|error| StationError(format!("failed to parse json data: {}", error)))?;

    let unit = reply.wind.unit.as_deref().unwrap_or("");
    if unit != WIND_UNIT {
        return Err(StationError(format!(
            "wrong unit for wind (expected '{}', got '{}')",
            WIND_UNIT, unit
        )));
    }

    let last_update = NaiveDateTime::parse_from_str(&reply.date_time, DATETIME_FORMAT)
        .map_err(|error| {
            StationError(format!(
                "failed to parse timestamp '{}': {}",
                reply.date_time, error
            ))
        })?
        .and_utc();

    Ok(Observation {
        station_name: reply.station_name.filter(|name| !name.is_empty()),
        last_update,
        wind_direction: reply.wind.direction.unwrap_or(0),
        wind_speed: reply.wind.speed.map(|v| (v * 10.0) as i32).unwrap_or(0),
        wind_gusts: reply.wind.gust.map(|v| (v * 10.0) as i32).unwrap_or(0),
        temperature: reply.temperature.map(|v| (v * 10.0) as i32).unwrap_or(0),
        humidity: None,
        available: WeatherData::WIND_DIRECTION
            | WeatherData::WIND_SPEED
            | WeatherData::WIND_GUSTS
            | WeatherData::TEMPERATURE,
    })
}
