use serde::{Deserialize, Serialize};

/// A single resolved location fix, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Current weather as returned by the OpenWeather `weather` endpoint.
///
/// Blocks missing from the payload fall back to their defaults so that a
/// partial answer still parses. The same shape is what gets written to the
/// cache.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherResponse {
    pub coord: Coord,
    pub weather: Vec<Weather>,
    pub base: String,
    pub main: Main,
    pub visibility: i64,
    pub wind: Wind,
    pub clouds: Clouds,
    pub dt: i64,
    pub sys: Sys,
    pub timezone: i64,
    pub id: i64,
    pub name: String,
    pub cod: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Weather {
    pub id: i64,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Main {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: i64,
    pub humidity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sea_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grnd_level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Wind {
    pub speed: f64,
    pub deg: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Clouds {
    pub all: i64,
}

/// Country and sun times; `sunrise`/`sunset` are epoch seconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sys {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<f64>,
    pub country: String,
    pub sunrise: i64,
    pub sunset: i64,
}

#[cfg(test)]
pub(crate) const SAMPLE_RESPONSE: &str = r#"{
  "coord": {"lon": 16.44, "lat": 43.51},
  "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
  "base": "stations",
  "main": {"temp": 21.5, "feels_like": 21.1, "temp_min": 19.8, "temp_max": 23.2, "pressure": 1016, "humidity": 56},
  "visibility": 10000,
  "wind": {"speed": 3.6, "deg": 120},
  "clouds": {"all": 0},
  "dt": 1697709600,
  "sys": {"type": 2, "id": 2035423, "country": "HR", "sunrise": 1697692052, "sunset": 1697731262},
  "timezone": 7200,
  "id": 3190261,
  "name": "Split",
  "cod": 200
}"#;
