//! Provisioning lifecycle bookkeeping
//!
//! The controller follows the provisioning manager through a session and keeps
//! the credential retry counter. It never persists credentials itself; the
//! manager applies and stores them.

use std::sync::Arc;

use log::{error, info, warn};
use wifiprov_proto::{Credentials, FailureReason};

use crate::provisioning::{ProvisioningScheme, ProvisioningSubsystem, SessionRequest};

/// Whether a provisioning session is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerPhase {
    #[default]
    Idle,
    Active,
}

pub struct ProvisioningController<P> {
    provisioning: Arc<P>,
    phase: ControllerPhase,
    retries: u32,
    /// Manager has been initialized and not released since
    manager_up: bool,
}

impl<P: ProvisioningSubsystem> ProvisioningController<P> {
    pub fn new(provisioning: Arc<P>) -> Self {
        Self {
            provisioning,
            phase: ControllerPhase::Idle,
            retries: 0,
            manager_up: false,
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Credential failures since the last success. Tracked only; nothing acts
    /// on it.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_manager_up(&self) -> bool {
        self.manager_up
    }

    /// Initialize the manager unless it is already up
    pub fn ensure_manager(&mut self, scheme: ProvisioningScheme) -> Result<(), P::Error> {
        if !self.manager_up {
            self.provisioning.init(scheme)?;
            self.manager_up = true;
        }
        Ok(())
    }

    /// Release the manager (and any session it still holds)
    pub fn release_manager(&mut self) {
        if self.manager_up {
            self.provisioning.deinit();
            self.manager_up = false;
        }
        self.phase = ControllerPhase::Idle;
    }

    /// Start a session. It counts as running from the request on, so the
    /// state reads as provisioning before the manager reports it started.
    pub fn start_session(&mut self, request: &SessionRequest) -> Result<(), P::Error> {
        self.phase = ControllerPhase::Active;
        if let Err(e) = self.provisioning.start_session(request) {
            self.phase = ControllerPhase::Idle;
            return Err(e);
        }
        Ok(())
    }

    pub fn on_start(&mut self) {
        info!("Provisioning started");
        self.phase = ControllerPhase::Active;
    }

    pub fn on_credentials_received(&mut self, credentials: &Credentials) {
        info!("Received Wi-Fi credentials: {credentials}");
    }

    pub fn on_credential_failure(&mut self, reason: FailureReason) {
        self.retries = self.retries.saturating_add(1);
        warn!(
            "Provisioning failed ({reason}), attempt {}; waiting for the operator to retry",
            self.retries
        );

        match reason {
            FailureReason::AuthError => {
                // Let the running session take new credentials
                if let Err(e) = self.provisioning.reset_state_on_failure() {
                    error!("Failed to reset provisioning state after failure: {e}");
                }
            }
            FailureReason::ApNotFound => {}
        }
    }

    pub fn on_credential_success(&mut self) {
        info!("Provisioning successful");
        self.retries = 0;
    }

    pub fn on_end(&mut self) {
        info!("Provisioning ended, releasing provisioning manager");
        self.release_manager();
    }
}
