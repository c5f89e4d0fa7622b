//! Turns the cached response into display strings.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

use crate::{WeatherError, WeatherResponse, cache::WeatherCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Sunny,
    Cloud,
    Rain,
    Storm,
    Snowflake,
}

impl Icon {
    pub fn glyph(&self) -> &'static str {
        match self {
            Icon::Sunny => "☀",
            Icon::Cloud => "☁",
            Icon::Rain => "☂",
            Icon::Storm => "⚡",
            Icon::Snowflake => "❄",
        }
    }
}

const ICONS: &[(&str, Icon)] = &[
    ("01d", Icon::Sunny),
    ("02d", Icon::Cloud),
    ("03d", Icon::Cloud),
    ("04d", Icon::Cloud),
    ("04n", Icon::Cloud),
    ("10d", Icon::Rain),
    ("11d", Icon::Storm),
    ("13d", Icon::Snowflake),
    ("01n", Icon::Cloud),
    ("02n", Icon::Cloud),
    ("03n", Icon::Cloud),
    ("10n", Icon::Cloud),
    ("11n", Icon::Rain),
    ("13n", Icon::Snowflake),
];

pub fn icon_for(code: &str) -> Option<Icon> {
    ICONS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, icon)| *icon)
}

/// Regions whose locale string selects Fahrenheit.
const FAHRENHEIT_REGIONS: &[&str] = &["US", "LR", "MM"];

pub const CELSIUS: &str = "°C";
pub const FAHRENHEIT: &str = "°F";

/// Unit suffix for a locale configuration string such as `en_US.UTF-8`.
///
/// Only the suffix changes; the temperature value is shown as stored.
pub fn temperature_unit(locale_config: &str) -> &'static str {
    if FAHRENHEIT_REGIONS
        .iter()
        .any(|region| locale_config.contains(region))
    {
        FAHRENHEIT
    } else {
        CELSIUS
    }
}

const SECS_PER_DAY: i64 = 86_400;

/// `HH:mm` on a 24-hour clock in `tz`.
///
/// Epochs outside chrono's range are clamped a day inside it, so the result
/// always has the `HH:mm` shape.
pub fn format_clock<Tz>(epoch_secs: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let min = DateTime::<Utc>::MIN_UTC.timestamp() + SECS_PER_DAY;
    let max = DateTime::<Utc>::MAX_UTC.timestamp() - SECS_PER_DAY;
    let clamped = epoch_secs.clamp(min, max);
    if clamped != epoch_secs {
        tracing::warn!(epoch_secs, "timestamp out of range, clamped");
    }

    let Some(utc) = DateTime::from_timestamp(clamped, 0) else {
        return "00:00".to_string();
    };
    utc.with_timezone(tz).format("%H:%M").to_string()
}

/// Everything the weather screen shows. Starts out empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherView {
    pub main: String,
    pub description: String,
    pub temp: String,
    pub sunrise: String,
    pub sunset: String,
    pub humidity: String,
    pub min: String,
    pub max: String,
    pub speed: String,
    pub name: String,
    pub country: String,
    pub icon: Option<Icon>,
}

impl WeatherView {
    pub fn is_empty(&self) -> bool {
        *self == WeatherView::default()
    }
}

impl fmt::Display for WeatherView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let glyph = self.icon.map(|icon| icon.glyph()).unwrap_or(" ");
        writeln!(f, "{glyph}  {} ({})", self.main, self.description)?;
        writeln!(f, "   {}  [{}, {}]", self.temp, self.min, self.max)?;
        writeln!(f, "   Humidity: {}", self.humidity)?;
        writeln!(f, "   Wind:     {}", self.speed)?;
        writeln!(f, "   Sunrise:  {}   Sunset: {}", self.sunrise, self.sunset)?;
        write!(f, "   {}, {}", self.name, self.country)
    }
}

/// Renders the cached response into a [`WeatherView`].
#[derive(Debug, Clone)]
pub struct Renderer<Tz> {
    locale_config: String,
    tz: Tz,
}

impl<Tz> Renderer<Tz>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    pub fn new(locale_config: impl Into<String>, tz: Tz) -> Self {
        Self {
            locale_config: locale_config.into(),
            tz,
        }
    }

    /// Re-read the cache and update `view`. Returns `false` when nothing is cached.
    pub fn render(&self, cache: &WeatherCache, view: &mut WeatherView) -> Result<bool, WeatherError> {
        let Some(response) = cache.load()? else {
            return Ok(false);
        };

        // One screen, so each condition entry overwrites the previous one.
        for index in 0..response.weather.len() {
            self.apply(&response, index, view);
        }
        Ok(!response.weather.is_empty())
    }

    fn apply(&self, response: &WeatherResponse, index: usize, view: &mut WeatherView) {
        let condition = &response.weather[index];
        let unit = temperature_unit(&self.locale_config);

        view.main = condition.main.clone();
        view.description = condition.description.clone();
        view.temp = format!("{}{unit}", response.main.temp);
        view.sunrise = format_clock(response.sys.sunrise, &self.tz);
        view.sunset = format_clock(response.sys.sunset, &self.tz);
        view.humidity = format!("{} percent", response.main.humidity);
        view.min = format!("{} min", response.main.temp_min);
        view.max = format!("{} max", response.main.temp_max);
        view.speed = response.wind.speed.to_string();
        view.name = response.name.clone();
        view.country = response.sys.country.clone();

        if let Some(icon) = icon_for(&condition.icon) {
            view.icon = Some(icon);
        }
    }
}
