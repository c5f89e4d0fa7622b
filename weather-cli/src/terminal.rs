//! Terminal stand-ins for the platform services the pipeline talks to.

use checkweather_core::{
    Config, Coordinates,
    config::{PermissionState, PermissionsConfig},
    gate::{LocationServices, Permission, PermissionReport, Prompter, ProviderKind, RationaleChoice},
    pipeline::Presenter,
    render::WeatherView,
};
use inquire::{InquireError, Select};
use std::{cell::RefCell, fmt, path::PathBuf};
use tokio::runtime::{Handle, RuntimeFlavor};

const GO_TO_SETTINGS: &str = "GO TO SETTINGS";
const CANCEL: &str = "Cancel";

const ALLOW: &str = "Allow";
const DENY: &str = "Deny";
const NEVER_ASK: &str = "Deny and don't ask again";

/// Run a blocking terminal prompt from inside the async pipeline.
///
/// On a multi-threaded runtime the worker is handed off first so other tasks
/// keep running; anywhere else the prompt simply runs in place.
pub fn blocking_prompt<T>(prompt: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(prompt)
        }
        _ => prompt(),
    }
}

/// Turn stored answers into a permission report, asking about undecided ones.
///
/// A permission answered "Deny" before is not asked again; the report asks
/// for the rationale instead. Returns whether any stored answer changed.
pub fn resolve_permissions(
    stored: &mut PermissionsConfig,
    requested: &[Permission],
    mut ask: impl FnMut(Permission) -> PermissionState,
) -> (PermissionReport, bool) {
    let mut report = PermissionReport::default();
    let mut changed = false;

    for &permission in requested {
        let state = match stored.get(permission) {
            PermissionState::Undecided => {
                let answer = ask(permission);
                if answer != PermissionState::Undecided {
                    stored.set(permission, answer);
                    changed = true;
                }
                answer
            }
            PermissionState::Denied => {
                report.rationale_needed = true;
                PermissionState::Denied
            }
            other => other,
        };

        match state {
            PermissionState::Granted => report.granted.push(permission),
            PermissionState::NeverAsk => report.permanently_denied.push(permission),
            PermissionState::Denied | PermissionState::Undecided => {
                report.denied.push(permission)
            }
        }
    }

    (report, changed)
}

fn ask_in_terminal(permission: Permission) -> PermissionState {
    let prompt = format!("Allow checkweather to use your {}?", permission.as_str());
    match blocking_prompt(|| Select::new(&prompt, vec![ALLOW, DENY, NEVER_ASK]).prompt()) {
        Ok(ALLOW) => PermissionState::Granted,
        Ok(NEVER_ASK) => PermissionState::NeverAsk,
        Ok(_) => PermissionState::Denied,
        Err(err) => {
            tracing::debug!(error = %err, "permission prompt unavailable");
            PermissionState::Undecided
        }
    }
}

type Asker = Box<dyn Fn(Permission) -> PermissionState>;

/// Location providers and permission prompts backed by the config file.
///
/// Coordinates given on the command line count as an enabled high-accuracy
/// provider for this run only.
pub struct ConfigLocationServices {
    config: RefCell<Config>,
    config_path: PathBuf,
    pinned: Option<Coordinates>,
    ask: Asker,
}

impl fmt::Debug for ConfigLocationServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLocationServices")
            .field("config_path", &self.config_path)
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}

impl ConfigLocationServices {
    pub fn new(config: Config, config_path: PathBuf, pinned: Option<Coordinates>) -> Self {
        Self::with_asker(config, config_path, pinned, Box::new(ask_in_terminal))
    }

    pub fn with_asker(
        config: Config,
        config_path: PathBuf,
        pinned: Option<Coordinates>,
        ask: Asker,
    ) -> Self {
        Self {
            config: RefCell::new(config),
            config_path,
            pinned,
            ask,
        }
    }
}

impl LocationServices for ConfigLocationServices {
    fn is_provider_enabled(&self, kind: ProviderKind) -> bool {
        let config = self.config.borrow();
        match kind {
            ProviderKind::Satellite => {
                self.pinned.is_some() || config.fixed_coordinates().is_some()
            }
            ProviderKind::Network => config.location.ip_lookup,
        }
    }

    fn request_permissions(&self, permissions: &[Permission]) -> PermissionReport {
        let mut config = self.config.borrow_mut();
        let (report, changed) =
            resolve_permissions(&mut config.permissions, permissions, |p| (self.ask)(p));

        if changed {
            if let Err(err) = config.save_to(&self.config_path) {
                tracing::warn!(error = %err, "could not persist permission answers");
            }
        }

        report
    }
}

/// Messages on stdout, dialogs through `inquire`.
#[derive(Debug)]
pub struct TerminalPrompter {
    config_path: PathBuf,
}

impl TerminalPrompter {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

impl Prompter for TerminalPrompter {
    fn show_message(&self, message: &str) {
        println!("{message}");
    }

    fn open_location_settings(&self) {
        println!(
            "Location settings: set [location] latitude/longitude or ip_lookup = true in {}",
            self.config_path.display()
        );
    }

    fn open_app_settings(&self) -> std::io::Result<()> {
        println!(
            "App settings: run `checkweather configure` or edit [permissions] in {}",
            self.config_path.display()
        );
        Ok(())
    }

    fn rationale_dialog(&self, message: &str) -> RationaleChoice {
        match blocking_prompt(|| Select::new(message, vec![GO_TO_SETTINGS, CANCEL]).prompt()) {
            Ok(GO_TO_SETTINGS) => RationaleChoice::GoToSettings,
            Ok(_) | Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                RationaleChoice::Cancel
            }
            Err(err) => {
                tracing::debug!(error = %err, "rationale dialog unavailable");
                RationaleChoice::Cancel
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn show_progress(&self) {
        eprintln!("Please wait...");
    }

    fn hide_progress(&self) {}

    fn display(&self, view: &WeatherView) {
        println!("{view}");
    }
}
