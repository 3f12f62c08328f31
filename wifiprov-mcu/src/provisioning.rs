//! Provisioning subsystem types and trait
//!
//! The provisioning manager runs the credential exchange with the operator
//! (transport and security are its own business) and reports progress as
//! [`ProvisioningEvent`](wifiprov_proto::ProvisioningEvent)s.

use wifiprov_proto::ServiceName;

/// How the provisioning manager talks to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvisioningScheme {
    /// Device-hosted soft access point with a local HTTP transport
    #[default]
    SoftAp,
}

/// Security of the provisioning exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityLevel {
    /// No proof-of-possession or encryption beyond the transport
    #[default]
    Security0,
}

/// Parameters of one provisioning session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub security: SecurityLevel,
    /// Proof-of-possession the operator must present
    pub proof_of_possession: Option<String>,
    /// Name the session is advertised under
    pub service_name: ServiceName,
    /// Soft-AP passphrase; `None` advertises an open network with no QR payload
    pub service_key: Option<String>,
}

impl SessionRequest {
    /// Security 0, no proof-of-possession, no service key
    pub fn open(service_name: ServiceName) -> Self {
        Self {
            security: SecurityLevel::Security0,
            proof_of_possession: None,
            service_name,
            service_key: None,
        }
    }
}

/// Trait for the provisioning manager
///
/// MCU-specific crates implement this trait using their provisioning stack.
pub trait ProvisioningSubsystem {
    /// Error type for provisioning operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Bring up the manager for the given scheme
    fn init(&self, scheme: ProvisioningScheme) -> Result<(), Self::Error>;

    /// Whether station credentials are already stored
    fn is_provisioned(&self) -> Result<bool, Self::Error>;

    /// Start a provisioning session
    fn start_session(&self, request: &SessionRequest) -> Result<(), Self::Error>;

    /// Release the manager and its session resources
    fn deinit(&self);

    /// Forget stored station credentials
    fn reset_credentials(&self) -> Result<(), Self::Error>;

    /// Clear the manager's failure state so the running session accepts new
    /// credentials
    fn reset_state_on_failure(&self) -> Result<(), Self::Error>;
}
