use async_trait::async_trait;
use reqwest::Client;

use crate::{WeatherError, WeatherResponse, model::Coordinates};

use super::WeatherProvider;

pub const BASE_URL: &str = "https://api.openweathermap.org/data/";
pub const METRIC_UNIT: &str = "metric";
const CURRENT_WEATHER_PATH: &str = "2.5/weather";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    units: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            units: METRIC_UNIT.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_units(mut self, units: String) -> Self {
        self.units = units;
        self
    }

    fn current_weather_url(&self) -> String {
        let mut url = self.base_url.clone();
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str(CURRENT_WEATHER_PATH);
        url
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_weather(&self, coords: Coordinates) -> Result<WeatherResponse, WeatherError> {
        let url = self.current_weather_url();
        tracing::debug!(%url, lat = coords.latitude, lon = coords.longitude, "requesting current weather");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
                ("units", self.units.clone()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            tracing::debug!(%status, body = %truncate_body(&body), "OpenWeather returned an error");
            return Err(WeatherError::http(status));
        }

        let parsed: WeatherResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
