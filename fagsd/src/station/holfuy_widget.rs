use chrono::{NaiveTime, Utc};

use super::{fetch_text, Observation, StationError, WeatherData};

const REPLY_SIZE_MAX: usize = 5120;

const WIDGET_URL: &str =
    "https://widget.holfuy.com/?station={id}&su=km/h&t=C&lang=en&mode=rose&size=160";
const DATA_DELIMITER_START: &str = "newWind(";
const DATA_DELIMITER_STOP: &str = ");";

/// Scrapes the Holfuy widget page for stations without API access.
#[derive(Clone, Debug)]
pub struct HolfuyWidget {
    id: u32,
}

impl HolfuyWidget {
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Observation, StationError> {
        let url = WIDGET_URL.replace("{id}", &self.id.to_string());
        let html = fetch_text(client, &url, REPLY_SIZE_MAX).await?;
        parse_page(&html)
    }
}

/// The page embeds `newWind(<dir>,<wind>,<temperature>,<gusts>,'HH:MM');`.
fn parse_page(html: &str) -> Result<Observation, StationError> {
    let start = html
        .find(DATA_DELIMITER_START)
        .ok_or_else(|| StationError("reply contains no weather data".to_string()))?
        + DATA_DELIMITER_START.len();
    let stop = html[start..]
        .find(DATA_DELIMITER_STOP)
        .ok_or_else(|| StationError("reply contains no weather data".to_string()))?
        + start;
    let raw = &html[start..stop];
    parse_values(raw)
        .ok_or_else(|| {
            StationError(format!(
                "failed to parse weather station data from string: '{}'",
                raw
            ))
        })
}

fn parse_values(raw: &str) -> Option<Observation> {
    let fields: Vec<&str> = raw.split(',').filter(|f| !f.trim().is_empty()).collect();
    if fields.len() < 5 {
        return None;
    }
    let direction: i32 = fields[0].trim().parse().ok()?;
    let wind: i32 = fields[1].trim().parse::<i32>().ok()? * 10;
    let temperature = (fields[2].trim().parse::<f64>().ok()? * 10.0) as i32;
    let gusts: i32 = fields[3].trim().parse::<i32>().ok()? * 10;
    let quoted = fields[4].trim();
    let time = NaiveTime::parse_from_str(quoted.get(1..6)?, "%H:%M").ok()?;

    // the page only carries a time of day; assume today
    let last_update = Utc::now().date_naive().and_time(time).and_utc();

    Some(Observation {
        station_name: None,
        last_update,
        wind_direction: direction,
        wind_speed: wind,
        wind_gusts: gusts,
        temperature,
        humidity: None,
        available: WeatherData::WIND_DIRECTION
            | WeatherData::WIND_SPEED
            | WeatherData::WIND_GUSTS
            | WeatherData::TEMPERATURE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_embedded_wind_call() {
        let html = "<html>...rose();newWind(173,3,6.2,4,'02:09');...</html>";
        let obs = parse_page(html).unwrap();
        assert_eq!(obs.wind_direction, 173);
        assert_eq!(obs.wind_speed, 30);
        assert_eq!(obs.temperature, 62);
        assert_eq!(obs.wind_gusts, 40);
        assert_eq!(obs.last_update.hour(), 2);
        assert_eq!(obs.last_update.minute(), 9);
    }

    #[test]
    fn rejects_pages_without_data() {
        assert!(parse_page("<html>nothing here</html>").is_err());
        assert!(parse_page("newWind(173,3);").is_err());
        assert!(parse_page("newWind(173,x,6.2,4,'02:09');").is_err());
    }
}
