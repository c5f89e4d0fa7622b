//! One-shot location fixes.
//!
//! A fix is requested once per pipeline run and awaited with a deadline, so a
//! source that never answers ends the run instead of stalling it.

use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};
use tokio::sync::{mpsc, oneshot};

use crate::{Config, WeatherError, model::Coordinates};

pub mod ip;

pub use ip::IpLocation;

/// Accuracy asked of a location source. The pipeline always asks for
/// `HighAccuracy`; sources behind a channel receive whatever the caller chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    HighAccuracy,
    Balanced,
}

#[async_trait]
pub trait LocationSource: Send + Sync + Debug {
    async fn request_fix(&self, priority: Priority) -> Result<Coordinates, WeatherError>;
}

/// Request a single fix, giving up after `timeout`.
pub async fn acquire_fix(
    source: &dyn LocationSource,
    priority: Priority,
    timeout: Duration,
) -> Result<Coordinates, WeatherError> {
    match tokio::time::timeout(timeout, source.request_fix(priority)).await {
        Ok(result) => result,
        Err(_) => Err(WeatherError::LocationTimeout(timeout)),
    }
}

/// Coordinates the user pinned; always answers immediately.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coords: Coordinates,
}

impl FixedLocation {
    pub fn new(coords: Coordinates) -> Self {
        Self { coords }
    }
}

#[async_trait]
impl LocationSource for FixedLocation {
    async fn request_fix(&self, _priority: Priority) -> Result<Coordinates, WeatherError> {
        Ok(self.coords)
    }
}

/// A pending fix request handed to whoever drives a [`ChannelLocation`].
#[derive(Debug)]
pub struct FixRequest {
    pub priority: Priority,
    pub reply: oneshot::Sender<Coordinates>,
}

/// Callback-style source: each request travels over a channel and the fix
/// comes back on a oneshot.
#[derive(Debug, Clone)]
pub struct ChannelLocation {
    requests: mpsc::Sender<FixRequest>,
}

impl ChannelLocation {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<FixRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { requests: tx }, rx)
    }
}

#[async_trait]
impl LocationSource for ChannelLocation {
    async fn request_fix(&self, priority: Priority) -> Result<Coordinates, WeatherError> {
        let (reply, fix) = oneshot::channel();
        self.requests
            .send(FixRequest { priority, reply })
            .await
            .map_err(|_| WeatherError::Location("location source has shut down".into()))?;

        fix.await
            .map_err(|_| WeatherError::Location("location request dropped without a fix".into()))
    }
}

/// Stands in when every provider is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProvider;

#[async_trait]
impl LocationSource for NoProvider {
    async fn request_fix(&self, _priority: Priority) -> Result<Coordinates, WeatherError> {
        Err(WeatherError::LocationDisabled)
    }
}

/// Pick the best configured source: pinned coordinates first, then IP lookup.
pub fn source_from_config(config: &Config) -> Box<dyn LocationSource> {
    if let Some(coords) = config.fixed_coordinates() {
        return Box::new(FixedLocation::new(coords));
    }

    if config.location.ip_lookup {
        match IpLocation::new(config.location.ip_lookup_url.clone()) {
            Ok(source) => return Box::new(source),
            Err(err) => tracing::warn!(error = %err, "IP lookup unavailable"),
        }
    }

    Box::new(NoProvider)
}
