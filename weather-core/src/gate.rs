//! Location-service and permission checks that run before a fix is requested.
//!
//! The platform side (which providers exist, how permissions are asked for,
//! how dialogs look) sits behind [`LocationServices`] and [`Prompter`]. The
//! gate itself only sequences the calls and never remembers a decision:
//! every check asks the platform again.

use std::fmt::Debug;

pub const PROVIDER_DISABLED_MESSAGE: &str =
    "Your location provider is turned off. Please turn it on.";
pub const PERMANENTLY_DENIED_MESSAGE: &str = "You have denied location permission. \
     Please enable them as it is mandatory for the app to work.";
pub const RATIONALE_MESSAGE: &str = "Enable permissions in app settings.";

/// A source of location fixes the platform can switch on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// High-accuracy source (GPS on a phone, pinned coordinates on a desktop).
    Satellite,
    Network,
}

impl ProviderKind {
    pub const fn all() -> &'static [ProviderKind] {
        &[ProviderKind::Satellite, ProviderKind::Network]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    CoarseLocation,
    FineLocation,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CoarseLocation => "coarse location",
            Permission::FineLocation => "fine location",
        }
    }
}

/// Both permissions are requested together.
pub const LOCATION_PERMISSIONS: [Permission; 2] =
    [Permission::CoarseLocation, Permission::FineLocation];

/// Result of one permission request round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionReport {
    pub granted: Vec<Permission>,
    pub denied: Vec<Permission>,
    pub permanently_denied: Vec<Permission>,
    /// The platform wants the app to explain itself before asking again.
    pub rationale_needed: bool,
}

impl PermissionReport {
    pub fn all_granted(&self, requested: &[Permission]) -> bool {
        requested.iter().all(|p| self.granted.contains(p))
    }

    pub fn any_permanently_denied(&self) -> bool {
        !self.permanently_denied.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RationaleChoice {
    GoToSettings,
    Cancel,
}

pub trait LocationServices: Debug {
    fn is_provider_enabled(&self, kind: ProviderKind) -> bool;

    fn request_permissions(&self, permissions: &[Permission]) -> PermissionReport;
}

/// User-facing side effects the gate and pipeline can trigger.
pub trait Prompter: Debug {
    fn show_message(&self, message: &str);

    fn open_location_settings(&self);

    fn open_app_settings(&self) -> std::io::Result<()>;

    fn rationale_dialog(&self, message: &str) -> RationaleChoice;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    ProviderDisabled,
    Granted,
    Denied,
    PermanentlyDenied,
    RationaleShown,
}

#[derive(Debug, Clone, Copy)]
pub struct Gate<'a> {
    services: &'a dyn LocationServices,
    prompter: &'a dyn Prompter,
}

impl<'a> Gate<'a> {
    pub fn new(services: &'a dyn LocationServices, prompter: &'a dyn Prompter) -> Self {
        Self { services, prompter }
    }

    pub fn is_location_enabled(&self) -> bool {
        ProviderKind::all()
            .iter()
            .any(|kind| self.services.is_provider_enabled(*kind))
    }

    /// Tells the user and opens location settings when every provider is off.
    pub fn check_location_service(&self) -> bool {
        if self.is_location_enabled() {
            return true;
        }

        tracing::info!("no location provider enabled");
        self.prompter.show_message(PROVIDER_DISABLED_MESSAGE);
        self.prompter.open_location_settings();
        false
    }

    pub fn check_permissions(&self) -> GateOutcome {
        if !self.is_location_enabled() {
            return GateOutcome::ProviderDisabled;
        }

        let report = self.services.request_permissions(&LOCATION_PERMISSIONS);
        tracing::debug!(?report, "location permission report");

        if report.rationale_needed {
            self.show_rationale_dialog();
            return GateOutcome::RationaleShown;
        }

        if report.any_permanently_denied() {
            self.prompter.show_message(PERMANENTLY_DENIED_MESSAGE);
        }

        if report.all_granted(&LOCATION_PERMISSIONS) {
            GateOutcome::Granted
        } else if report.any_permanently_denied() {
            GateOutcome::PermanentlyDenied
        } else {
            GateOutcome::Denied
        }
    }

    /// Location-service check followed by the permission request.
    pub fn run(&self) -> GateOutcome {
        if !self.check_location_service() {
            return GateOutcome::ProviderDisabled;
        }
        self.check_permissions()
    }

    fn show_rationale_dialog(&self) {
        match self.prompter.rationale_dialog(RATIONALE_MESSAGE) {
            RationaleChoice::GoToSettings => {
                if let Err(err) = self.prompter.open_app_settings() {
                    tracing::warn!(error = %err, "could not open app settings");
                }
            }
            RationaleChoice::Cancel => {}
        }
    }
}
