use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{WeatherError, model::Coordinates};

use super::{LocationSource, Priority};

pub const DEFAULT_LOOKUP_URL: &str = "http://ip-api.com/json";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Network-based fix derived from the machine's public IP address.
#[derive(Debug, Clone)]
pub struct IpLocation {
    url: String,
    http: Client,
}

impl IpLocation {
    pub fn new(url: String) -> Result<Self, WeatherError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { url, http })
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

#[async_trait]
impl LocationSource for IpLocation {
    async fn request_fix(&self, priority: Priority) -> Result<Coordinates, WeatherError> {
        tracing::debug!(?priority, url = %self.url, "requesting IP-based fix");

        let res = self.http.get(&self.url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(WeatherError::Location(format!(
                "IP lookup failed with status {status}"
            )));
        }

        let parsed: IpApiResponse = res.json().await?;
        match (parsed.status.as_str(), parsed.lat, parsed.lon) {
            ("success", Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(WeatherError::Location(format!(
                "IP lookup returned no position: {}",
                parsed.message.unwrap_or(parsed.status)
            ))),
        }
    }
}
