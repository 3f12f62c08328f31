//! WiFi Abstraction Traits
//!
//! Traits for the Wi-Fi driver and the network stack that MCU-specific crates
//! implement. Driver events are not returned from these calls; the platform
//! delivers them through its [`EventLoop`](crate::EventLoop).

use wifiprov_proto::MacAddress;

/// Driver operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiMode {
    /// Client of an existing network
    Station,
}

/// Trait for Wi-Fi driver operations
pub trait WirelessDriver {
    /// Error type for driver operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Initialize the driver with the platform's default parameters
    fn init(&self) -> Result<(), Self::Error>;

    /// Select the operating mode
    fn set_mode(&self, mode: WifiMode) -> Result<(), Self::Error>;

    /// Start the driver; the station interface reports
    /// [`DriverEvent::StationStarted`](wifiprov_proto::DriverEvent::StationStarted)
    fn start(&self) -> Result<(), Self::Error>;

    /// Ask the station to associate using the configured credentials
    fn connect(&self) -> Result<(), Self::Error>;

    /// Station interface MAC address
    fn station_mac(&self) -> Result<MacAddress, Self::Error>;
}

/// Trait for the TCP/IP stack bootstrap
///
/// Opaque to the state machine beyond "must succeed before the driver starts".
pub trait NetworkStack {
    /// Error type for network stack operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Initialize the TCP/IP stack
    fn init(&self) -> Result<(), Self::Error>;

    /// Create the default station interface
    fn create_default_station(&self) -> Result<(), Self::Error>;

    /// Create the default soft-AP interface
    fn create_default_access_point(&self) -> Result<(), Self::Error>;
}
