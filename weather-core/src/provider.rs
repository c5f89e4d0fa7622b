use crate::{
    Config, WeatherError, WeatherResponse, model::Coordinates,
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions at `coords`.
    async fn current_weather(&self, coords: Coordinates) -> Result<WeatherResponse, WeatherError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    provider_from_config_with(config, |name| std::env::var(name).ok())
}

/// Like [`provider_from_config`], reading the API key fallback through `env`.
pub fn provider_from_config_with(
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.api_key_with(env)?;

    let provider = OpenWeatherProvider::new(api_key)
        .with_base_url(config.base_url.clone())
        .with_units(config.units.clone());

    Ok(Box::new(provider))
}
