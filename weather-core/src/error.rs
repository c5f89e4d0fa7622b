use std::{fmt, time::Duration};

use reqwest::StatusCode;
use thiserror::Error;

/// How a non-2xx answer from the weather API is reported in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorCategory {
    BadRequest,
    NotFound,
    Other,
}

impl HttpErrorCategory {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            400 => HttpErrorCategory::BadRequest,
            404 => HttpErrorCategory::NotFound,
            _ => HttpErrorCategory::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HttpErrorCategory::BadRequest => "Bad Connection",
            HttpErrorCategory::NotFound => "Not Found",
            HttpErrorCategory::Other => "Generic Error",
        }
    }
}

impl fmt::Display for HttpErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every way a single pass through the pipeline can fail.
///
/// None of these are fatal; the pipeline turns each one into an outcome and
/// returns to idle.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("no location provider is enabled")]
    LocationDisabled,

    #[error("location permission denied (permanent: {permanent})")]
    PermissionDenied { permanent: bool },

    #[error("no internet connection")]
    NoConnectivity,

    #[error("weather request failed with status {status} ({category})")]
    Http {
        status: StatusCode,
        category: HttpErrorCategory,
    },

    #[error("weather request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to parse weather data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no location fix received within {0:?}")]
    LocationTimeout(Duration),

    #[error("location source failed: {0}")]
    Location(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl WeatherError {
    pub fn http(status: StatusCode) -> Self {
        WeatherError::Http {
            status,
            category: HttpErrorCategory::from_status(status),
        }
    }
}
