//! Event loop abstraction
//!
//! The platform owns event delivery. It must call registered handlers one at a
//! time; the state machine relies on that to keep its bookkeeping coherent.

use std::sync::Arc;

use wifiprov_proto::{Event, EventDomain};

/// Callback invoked for each delivered event
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Trait for the platform event loop
pub trait EventLoop {
    /// Error type for event loop operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create the default (system) event loop
    fn create_default(&self) -> Result<(), Self::Error>;

    /// Deliver every event of `domain` to `handler`
    fn register(&self, domain: EventDomain, handler: EventHandler) -> Result<(), Self::Error>;
}
