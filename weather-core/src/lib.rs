//! Core library for the `checkweather` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - The location-service and permission gate
//! - One-shot location fixes with a deadline
//! - The OpenWeather client and the single-blob response cache
//! - Rendering of the cached response for display
//!
//! [`pipeline::Pipeline`] strings these together; the binary only supplies
//! terminal implementations of the UI traits.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod gate;
pub mod location;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod render;

pub use cache::WeatherCache;
pub use config::Config;
pub use error::WeatherError;
pub use model::{Coordinates, WeatherResponse};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineParts};
pub use provider::WeatherProvider;
