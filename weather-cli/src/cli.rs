use anyhow::{Context, Result};
use checkweather_core::{
    Config, Coordinates, Pipeline, PipelineOutcome, PipelineParts, WeatherCache,
    cache::{FileStore, PREFERENCE_NAME},
    config::PermissionState,
    connectivity::TcpProbe,
    gate::Permission,
    location::{FixedLocation, LocationSource, source_from_config},
    provider::provider_from_config,
    render::{Renderer, WeatherView},
};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, CustomType, Select, Text};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::terminal::{ConfigLocationServices, TerminalPresenter, TerminalPrompter};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "checkweather", version, about = "Current weather for where you are")]
pub struct Cli {
    #[command(flatten)]
    pub location: LocationArgs,

    /// Without a subcommand: show the cached weather, check location access, then fetch.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Args)]
pub struct LocationArgs {
    /// Latitude to use instead of the configured location source.
    #[arg(long, global = true, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude to use instead of the configured location source.
    #[arg(long, global = true, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,
}

impl LocationArgs {
    fn pinned(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Get a new location fix and fetch the weather for it.
    Refresh,

    /// Show the last fetched weather without going online.
    Show,

    /// Set the API key, location source, locale and permissions.
    Configure,

    /// Forget the cached weather.
    Clear,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = Config::config_file_path()?;
        let config = Config::load_from(&config_path)?;
        let pinned = self.location.pinned();

        match self.command {
            None => {
                let pipeline = build_pipeline(config, config_path, pinned)?;
                report(pipeline.start().await);
            }
            Some(Command::Refresh) => {
                let pipeline = build_pipeline(config, config_path, pinned)?;
                report(pipeline.refresh().await);
            }
            Some(Command::Show) => {
                let cache = open_cache()?;
                let renderer = Renderer::new(config.locale_config(), Local);
                let mut view = WeatherView::default();
                if renderer.render(&cache, &mut view)? {
                    println!("{view}");
                } else {
                    println!("No weather cached yet. Run `checkweather refresh`.");
                }
            }
            Some(Command::Configure) => configure(config, &config_path)?,
            Some(Command::Clear) => {
                open_cache()?.clear()?;
                println!("Cached weather cleared.");
            }
        }

        Ok(())
    }
}

fn open_cache() -> Result<WeatherCache> {
    let dir = Config::data_dir()?;
    Ok(WeatherCache::new(Box::new(FileStore::open(&dir, PREFERENCE_NAME))))
}

fn build_pipeline(
    config: Config,
    config_path: PathBuf,
    pinned: Option<Coordinates>,
) -> Result<Pipeline<Local>> {
    let provider = provider_from_config(&config)?;
    let connectivity = TcpProbe::for_url(&config.base_url, PROBE_TIMEOUT)?;
    let location: Box<dyn LocationSource> = match pinned {
        Some(coords) => Box::new(FixedLocation::new(coords)),
        None => source_from_config(&config),
    };
    let renderer = Renderer::new(config.locale_config(), Local);
    let location_timeout = config.location_timeout();

    Ok(Pipeline::new(PipelineParts {
        services: Box::new(ConfigLocationServices::new(
            config,
            config_path.clone(),
            pinned,
        )),
        prompter: Box::new(TerminalPrompter::new(config_path)),
        presenter: Box::new(TerminalPresenter),
        location,
        connectivity: Box::new(connectivity),
        provider,
        cache: open_cache()?,
        renderer,
        location_timeout,
    }))
}

fn report(outcome: PipelineOutcome) {
    tracing::debug!(?outcome, "pipeline finished");
}

fn configure(mut config: Config, config_path: &Path) -> Result<()> {
    let key = Text::new("OpenWeather API key:")
        .with_default(config.api_key.as_deref().unwrap_or_default())
        .prompt()
        .context("API key prompt aborted")?;
    if !key.trim().is_empty() {
        config.set_api_key(key.trim().to_string());
    }

    let pin = Confirm::new("Pin a fixed location?")
        .with_default(config.fixed_coordinates().is_some())
        .prompt()
        .context("Location prompt aborted")?;
    if pin {
        let current = config.fixed_coordinates();
        let latitude = CustomType::<f64>::new("Latitude:")
            .with_default(current.map(|c| c.latitude).unwrap_or_default())
            .prompt()
            .context("Latitude prompt aborted")?;
        let longitude = CustomType::<f64>::new("Longitude:")
            .with_default(current.map(|c| c.longitude).unwrap_or_default())
            .prompt()
            .context("Longitude prompt aborted")?;
        config.set_fixed_coordinates(Some(Coordinates::new(latitude, longitude)));
    } else {
        config.set_fixed_coordinates(None);
    }

    config.location.ip_lookup = Confirm::new("Allow locating you by IP address?")
        .with_default(config.location.ip_lookup)
        .prompt()
        .context("IP lookup prompt aborted")?;

    let locale = Text::new("Locale override (empty to use the environment):")
        .with_default(config.locale.as_deref().unwrap_or_default())
        .prompt()
        .context("Locale prompt aborted")?;
    config.locale = Some(locale.trim().to_string()).filter(|l| !l.is_empty());

    for permission in [Permission::CoarseLocation, Permission::FineLocation] {
        let options = vec!["Granted", "Denied", "Ask me next time"];
        let prompt = format!("Permission for {}:", permission.as_str());
        let state = match Select::new(&prompt, options)
            .prompt()
            .context("Permission prompt aborted")?
        {
            "Granted" => PermissionState::Granted,
            "Denied" => PermissionState::NeverAsk,
            _ => PermissionState::Undecided,
        };
        config.permissions.set(permission, state);
    }

    config.save_to(config_path)?;
    println!("Saved configuration to {}", config_path.display());
    Ok(())
}
