//! wifiprov protocol types - events, credentials and service names
//!
//! Events arrive from three independent sources: the provisioning manager,
//! the Wi-Fi driver and the IP layer. Each source is an [`EventDomain`] and
//! each domain has its own event enum. Event ids a source emits that the
//! state machine has no use for are carried as `Other(id)` so they can be
//! logged and dropped.

use std::fmt;
use std::net::Ipv4Addr;

mod identity;

pub use identity::{
    MacAddress, MacParseError, SERVICE_NAME_BUF_LEN, SERVICE_NAME_LEN, SERVICE_NAME_PREFIX,
    ServiceName, ServiceNameError,
};

/// Source an event comes from. Handlers are registered per domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventDomain {
    /// Provisioning manager lifecycle events
    Provisioning,
    /// Wi-Fi driver link events (station and soft-AP)
    DriverLink,
    /// IP address assignment (DHCP) events
    AddressAssignment,
}

impl EventDomain {
    pub const ALL: [EventDomain; 3] = [
        EventDomain::Provisioning,
        EventDomain::DriverLink,
        EventDomain::AddressAssignment,
    ];
}

/// An inbound event, tagged by domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Provisioning(ProvisioningEvent),
    Driver(DriverEvent),
    Address(AddressEvent),
}

impl Event {
    pub fn domain(&self) -> EventDomain {
        match self {
            Event::Provisioning(_) => EventDomain::Provisioning,
            Event::Driver(_) => EventDomain::DriverLink,
            Event::Address(_) => EventDomain::AddressAssignment,
        }
    }
}

impl From<ProvisioningEvent> for Event {
    fn from(e: ProvisioningEvent) -> Self {
        Event::Provisioning(e)
    }
}

impl From<DriverEvent> for Event {
    fn from(e: DriverEvent) -> Self {
        Event::Driver(e)
    }
}

impl From<AddressEvent> for Event {
    fn from(e: AddressEvent) -> Self {
        Event::Address(e)
    }
}

/// Provisioning manager lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningEvent {
    /// Session started, soft-AP is up
    Started,
    /// Operator sent station credentials
    CredentialsReceived(Credentials),
    /// Station could not connect with the received credentials
    CredentialFailure(FailureReason),
    /// Station connected with the received credentials
    CredentialSuccess,
    /// Session finished, manager may be released
    Ended,
    /// Any other provisioning event id
    Other(i32),
}

/// Why a provisioned station failed to connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Wrong password
    AuthError,
    /// No access point with the given SSID
    ApNotFound,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::AuthError => "Wi-Fi station authentication failed",
            FailureReason::ApNotFound => "Wi-Fi access-point not found",
        })
    }
}

/// Wi-Fi driver events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// Station interface started
    StationStarted,
    /// Station lost (or never got) its association
    StationDisconnected,
    /// A client joined the soft-AP
    PeerJoined(MacAddress),
    /// A client left the soft-AP
    PeerLeft(MacAddress),
    /// Any other driver event id
    Other(i32),
}

/// IP layer events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressEvent {
    /// Station got an address
    Assigned(Ipv4Addr),
    /// Any other IP event id
    Other(i32),
}

/// Station credentials received during provisioning.
///
/// `Debug` and `Display` never print the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: String,
    password: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

const REDACTED: &str = "<redacted>";

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &REDACTED)
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SSID {:?}, password {REDACTED}", self.ssid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_never_print_password() {
        let creds = Credentials::new("home", "secret");
        assert_eq!(creds.password(), "secret");
        assert!(!format!("{creds:?}").contains("secret"));
        assert!(!format!("{creds}").contains("secret"));
        assert!(format!("{creds}").contains("home"));
    }

    #[test]
    fn events_know_their_domain() {
        assert_eq!(
            Event::from(ProvisioningEvent::Started).domain(),
            EventDomain::Provisioning
        );
        assert_eq!(
            Event::from(DriverEvent::StationDisconnected).domain(),
            EventDomain::DriverLink
        );
        assert_eq!(
            Event::from(AddressEvent::Assigned(Ipv4Addr::new(10, 0, 0, 5))).domain(),
            EventDomain::AddressAssignment
        );
    }
}
