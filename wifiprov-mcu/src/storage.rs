//! Persistent Storage Abstraction Trait
//!
//! The credential store is owned by the platform (NVS on ESP32). The state
//! machine only brings it up during `init` and wipes it when it reports that
//! its on-flash layout is unusable.

/// Outcome of bringing up the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// Store is ready
    Ready,
    /// Store is full or written by an incompatible version and must be erased
    NeedsErase,
}

/// Trait for the persistent credential store
///
/// MCU-specific crates implement this trait using their storage backend.
pub trait CredentialStore {
    /// Error type for storage operations; any error is fatal
    type Error: std::error::Error + Send + Sync + 'static;

    /// Initialize the store
    fn init(&self) -> Result<StoreStatus, Self::Error>;

    /// Erase the whole store
    fn erase(&self) -> Result<(), Self::Error>;
}
