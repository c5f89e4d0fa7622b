//! Gate → location fix → fetch → cache → render.

use chrono::TimeZone;
use parking_lot::Mutex;
use std::{fmt, time::Duration};

use crate::{
    WeatherError,
    cache::WeatherCache,
    connectivity::Connectivity,
    error::HttpErrorCategory,
    gate::{Gate, GateOutcome, LocationServices, Prompter},
    location::{LocationSource, Priority, acquire_fix},
    model::Coordinates,
    provider::WeatherProvider,
    render::{Renderer, WeatherView},
};

pub const NO_CONNECTION_MESSAGE: &str = "no internet connection";
pub const NO_FIX_MESSAGE: &str = "Could not determine your location.";

/// UI hooks the fetch step drives besides plain messages.
pub trait Presenter: fmt::Debug {
    fn show_progress(&self);

    fn hide_progress(&self);

    fn display(&self, view: &WeatherView);
}

/// How one pass through the pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Rendered,
    /// Fetched and cached, but the response had no conditions to show.
    NothingToRender,
    GateClosed(GateOutcome),
    LocationUnavailable,
    NoConnectivity,
    HttpError(HttpErrorCategory),
    TransportFailed,
    StorageFailed,
}

#[derive(Debug)]
pub struct Pipeline<Tz: TimeZone> {
    services: Box<dyn LocationServices>,
    prompter: Box<dyn Prompter>,
    presenter: Box<dyn Presenter>,
    location: Box<dyn LocationSource>,
    connectivity: Box<dyn Connectivity>,
    provider: Box<dyn WeatherProvider>,
    cache: WeatherCache,
    renderer: Renderer<Tz>,
    location_timeout: Duration,
    view: Mutex<WeatherView>,
    in_flight: tokio::sync::Mutex<()>,
}

/// Collaborators a [`Pipeline`] is assembled from.
#[derive(Debug)]
pub struct PipelineParts<Tz: TimeZone> {
    pub services: Box<dyn LocationServices>,
    pub prompter: Box<dyn Prompter>,
    pub presenter: Box<dyn Presenter>,
    pub location: Box<dyn LocationSource>,
    pub connectivity: Box<dyn Connectivity>,
    pub provider: Box<dyn WeatherProvider>,
    pub cache: WeatherCache,
    pub renderer: Renderer<Tz>,
    pub location_timeout: Duration,
}

impl<Tz> Pipeline<Tz>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    pub fn new(parts: PipelineParts<Tz>) -> Self {
        Self {
            services: parts.services,
            prompter: parts.prompter,
            presenter: parts.presenter,
            location: parts.location,
            connectivity: parts.connectivity,
            provider: parts.provider,
            cache: parts.cache,
            renderer: parts.renderer,
            location_timeout: parts.location_timeout,
            view: Mutex::new(WeatherView::default()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    /// Snapshot of what is currently on screen.
    pub fn view(&self) -> WeatherView {
        self.view.lock().clone()
    }

    /// Start-up: show whatever is cached, then run the gate and fetch if it opens.
    pub async fn start(&self) -> PipelineOutcome {
        self.render();

        let gate = Gate::new(self.services.as_ref(), self.prompter.as_ref());
        match gate.run() {
            GateOutcome::Granted => self.refresh().await,
            closed => {
                tracing::info!(outcome = ?closed, "location gate closed");
                PipelineOutcome::GateClosed(closed)
            }
        }
    }

    /// Acquire a fresh fix and fetch for it. Overlapping calls run one after another.
    pub async fn refresh(&self) -> PipelineOutcome {
        let _running = self.in_flight.lock().await;

        let coords = match acquire_fix(
            self.location.as_ref(),
            Priority::HighAccuracy,
            self.location_timeout,
        )
        .await
        {
            Ok(coords) => coords,
            Err(err) => {
                tracing::warn!(error = %err, "no location fix");
                self.prompter.show_message(NO_FIX_MESSAGE);
                return PipelineOutcome::LocationUnavailable;
            }
        };

        self.fetch_and_render(coords).await
    }

    async fn fetch_and_render(&self, coords: Coordinates) -> PipelineOutcome {
        if !self.connectivity.is_network_available().await {
            self.prompter.show_message(NO_CONNECTION_MESSAGE);
            return PipelineOutcome::NoConnectivity;
        }

        self.presenter.show_progress();
        let result = self.provider.current_weather(coords).await;
        self.presenter.hide_progress();

        match result {
            Ok(response) => {
                if let Err(err) = self.cache.save(&response) {
                    tracing::error!(error = %err, "failed to cache weather response");
                    return PipelineOutcome::StorageFailed;
                }
                if self.render() {
                    PipelineOutcome::Rendered
                } else {
                    PipelineOutcome::NothingToRender
                }
            }
            Err(WeatherError::Http { status, category }) => {
                tracing::error!(%status, "{category}");
                PipelineOutcome::HttpError(category)
            }
            Err(err) => {
                tracing::warn!(error = %err, "weather request failed");
                PipelineOutcome::TransportFailed
            }
        }
    }

    /// Re-read the cache and push the result to the presenter.
    pub fn render(&self) -> bool {
        let mut view = self.view.lock();
        match self.renderer.render(&self.cache, &mut view) {
            Ok(true) => {
                self.presenter.display(&view);
                true
            }
            Ok(false) => false,
            Err(err) => {
                tracing::warn!(error = %err, "cached weather could not be rendered");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        WeatherResponse,
        gate::{
            PERMANENTLY_DENIED_MESSAGE, PermissionReport, ProviderKind,
            testing::{FakeServices, RecordingPrompter},
        },
        location::{ChannelLocation, FixedLocation},
        model::SAMPLE_RESPONSE,
        provider::openweather::OpenWeatherProvider,
        render::Icon,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug)]
    struct Online(bool);

    #[async_trait]
    impl Connectivity for Online {
        async fn is_network_available(&self) -> bool {
            self.0
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Screen {
        shown: Arc<AtomicUsize>,
        hidden: Arc<AtomicUsize>,
        displayed: Arc<AtomicUsize>,
    }

    impl Presenter for Screen {
        fn show_progress(&self) {
            self.shown.fetch_add(1, Ordering::SeqCst);
        }

        fn hide_progress(&self) {
            self.hidden.fetch_add(1, Ordering::SeqCst);
        }

        fn display(&self, _view: &WeatherView) {
            self.displayed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, Clone, Default)]
    struct SharedPrompter(Arc<RecordingPrompter>);

    impl Prompter for SharedPrompter {
        fn show_message(&self, message: &str) {
            self.0.show_message(message)
        }

        fn open_location_settings(&self) {
            self.0.open_location_settings()
        }

        fn open_app_settings(&self) -> std::io::Result<()> {
            self.0.open_app_settings()
        }

        fn rationale_dialog(&self, message: &str) -> crate::gate::RationaleChoice {
            self.0.rationale_dialog(message)
        }
    }

    /// Counts how many fetches overlap.
    #[derive(Debug, Default)]
    struct SlowProvider {
        active: AtomicUsize,
        peak: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WeatherProvider for SlowProvider {
        async fn current_weather(
            &self,
            _coords: Coordinates,
        ) -> Result<WeatherResponse, WeatherError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(serde_json::from_str(SAMPLE_RESPONSE)?)
        }
    }

    struct Harness {
        screen: Screen,
        prompter: SharedPrompter,
    }

    fn build(
        services: FakeServices,
        location: Box<dyn LocationSource>,
        online: bool,
        provider: Box<dyn WeatherProvider>,
        cache: WeatherCache,
    ) -> (Pipeline<Utc>, Harness) {
        let screen = Screen::default();
        let prompter = SharedPrompter::default();
        let pipeline = Pipeline::new(PipelineParts {
            services: Box::new(services),
            prompter: Box::new(prompter.clone()),
            presenter: Box::new(screen.clone()),
            location,
            connectivity: Box::new(Online(online)),
            provider,
            cache,
            renderer: Renderer::new("en_GB", Utc),
            location_timeout: Duration::from_millis(100),
        });
        (pipeline, Harness { screen, prompter })
    }

    fn here() -> Box<dyn LocationSource> {
        Box::new(FixedLocation::new(Coordinates::new(43.51, 16.44)))
    }

    async fn mock_weather(status: u16, body: &str) -> (MockServer, Box<dyn WeatherProvider>) {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        let provider = OpenWeatherProvider::new("KEY".into())
            .with_base_url(format!("{}/data/", mock_server.uri()));
        (mock_server, Box::new(provider))
    }

    #[tokio::test]
    async fn successful_fetch_caches_blob_and_renders() {
        let (_server, provider) = mock_weather(200, SAMPLE_RESPONSE).await;
        let (pipeline, harness) =
            build(FakeServices::granted(), here(), true, provider, WeatherCache::in_memory());

        assert_eq!(pipeline.start().await, PipelineOutcome::Rendered);

        let expected: WeatherResponse = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        assert_eq!(
            pipeline.cache().blob().unwrap(),
            Some(serde_json::to_string(&expected).unwrap())
        );

        let view = pipeline.view();
        assert_eq!(view.name, "Split");
        assert_eq!(view.country, "HR");
        assert_eq!(view.humidity, "56 percent");
        assert_eq!(view.icon, Some(Icon::Sunny));
        assert_eq!(harness.screen.shown.load(Ordering::SeqCst), 1);
        assert_eq!(harness.screen.hidden.load(Ordering::SeqCst), 1);
        assert_eq!(harness.screen.displayed.load(Ordering::SeqCst), 1);
        assert!(harness.prompter.0.messages.lock().is_empty());
    }

    #[tokio::test]
    async fn not_found_keeps_previous_blob_and_stays_quiet() {
        let (_server, provider) = mock_weather(404, r#"{"cod":"404"}"#).await;
        let cache = WeatherCache::in_memory();
        let mut previous: WeatherResponse = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        previous.name = "Earlier".into();
        cache.save(&previous).unwrap();
        let before = cache.blob().unwrap();

        let (pipeline, harness) = build(FakeServices::granted(), here(), true, provider, cache);

        assert_eq!(
            pipeline.refresh().await,
            PipelineOutcome::HttpError(HttpErrorCategory::NotFound)
        );
        assert_eq!(pipeline.cache().blob().unwrap(), before);
        assert!(harness.prompter.0.messages.lock().is_empty());
        assert_eq!(harness.screen.hidden.load(Ordering::SeqCst), 1);
        assert_eq!(harness.screen.displayed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn offline_shows_message_and_skips_request() {
        let (server, provider) = mock_weather(200, SAMPLE_RESPONSE).await;
        let (pipeline, harness) =
            build(FakeServices::granted(), here(), false, provider, WeatherCache::in_memory());

        assert_eq!(pipeline.refresh().await, PipelineOutcome::NoConnectivity);
        assert_eq!(
            *harness.prompter.0.messages.lock(),
            vec![NO_CONNECTION_MESSAGE.to_string()]
        );
        assert_eq!(harness.screen.shown.load(Ordering::SeqCst), 0);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_silent_transport_failure() {
        let provider = OpenWeatherProvider::new("KEY".into())
            .with_base_url("http://127.0.0.1:9/data/".into());
        let (pipeline, harness) = build(
            FakeServices::granted(),
            here(),
            true,
            Box::new(provider),
            WeatherCache::in_memory(),
        );

        assert_eq!(pipeline.refresh().await, PipelineOutcome::TransportFailed);
        assert_eq!(harness.screen.hidden.load(Ordering::SeqCst), 1);
        assert!(harness.prompter.0.messages.lock().is_empty());
        assert!(pipeline.cache().blob().unwrap().is_none());
    }

    #[tokio::test]
    async fn closed_gate_never_fetches() {
        let (server, provider) = mock_weather(200, SAMPLE_RESPONSE).await;
        let services = FakeServices {
            enabled: vec![ProviderKind::Network],
            report: PermissionReport {
                permanently_denied: vec![crate::gate::Permission::FineLocation],
                ..PermissionReport::default()
            },
            ..FakeServices::default()
        };
        let (pipeline, harness) =
            build(services, here(), true, provider, WeatherCache::in_memory());

        assert_eq!(
            pipeline.start().await,
            PipelineOutcome::GateClosed(GateOutcome::PermanentlyDenied)
        );
        assert_eq!(
            *harness.prompter.0.messages.lock(),
            vec![PERMANENTLY_DENIED_MESSAGE.to_string()]
        );
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn start_renders_cached_weather_before_the_gate() {
        let cache = WeatherCache::in_memory();
        cache
            .save(&serde_json::from_str(SAMPLE_RESPONSE).unwrap())
            .unwrap();
        let (_server, provider) = mock_weather(500, "").await;
        let (pipeline, harness) =
            build(FakeServices::default(), here(), true, provider, cache);

        assert_eq!(
            pipeline.start().await,
            PipelineOutcome::GateClosed(GateOutcome::ProviderDisabled)
        );
        assert_eq!(pipeline.view().name, "Split");
        assert_eq!(harness.screen.displayed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn silent_location_source_times_out() {
        let (source, requests) = ChannelLocation::new(1);
        let (_server, provider) = mock_weather(200, SAMPLE_RESPONSE).await;
        let (pipeline, harness) = build(
            FakeServices::granted(),
            Box::new(source),
            true,
            provider,
            WeatherCache::in_memory(),
        );

        let outcome = pipeline.refresh().await;
        drop(requests);

        assert_eq!(outcome, PipelineOutcome::LocationUnavailable);
        assert_eq!(
            *harness.prompter.0.messages.lock(),
            vec![NO_FIX_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn empty_cache_renders_nothing() {
        let (_server, provider) = mock_weather(200, SAMPLE_RESPONSE).await;
        let (pipeline, harness) =
            build(FakeServices::default(), here(), true, provider, WeatherCache::in_memory());

        assert!(!pipeline.render());
        assert!(pipeline.view().is_empty());
        assert_eq!(harness.screen.displayed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn overlapping_refreshes_run_one_at_a_time() {
        let provider = SlowProvider::default();
        let peak = provider.peak.clone();
        let calls = provider.calls.clone();
        let (pipeline, _harness) = build(
            FakeServices::granted(),
            here(),
            true,
            Box::new(provider),
            WeatherCache::in_memory(),
        );

        let (first, second) = tokio::join!(pipeline.refresh(), pipeline.refresh());

        assert_eq!(first, PipelineOutcome::Rendered);
        assert_eq!(second, PipelineOutcome::Rendered);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
