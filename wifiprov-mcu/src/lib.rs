//! wifiprov MCU Library
//!
//! Wi-Fi provisioning and connection state machine for microcontrollers.
//!
//! This crate provides:
//! - Traits for the credential store, network stack, event loop, Wi-Fi driver
//!   and provisioning manager
//! - [`ConnectionSupervisor`], the blocking `init` / `connect` /
//!   `reset_provisioning` API
//! - The event dispatcher that drives provisioning and reconnects
//!
//! # MCU implementations
//! - ESP32: see `wifiprov-esp32`
//! - Host simulation: the `sim` feature, used by `wifiprov-sim`

pub mod adapter;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod event_loop;
pub mod policy;
pub mod provisioning;
pub mod signal;
pub mod storage;
pub mod supervisor;
pub mod wifi;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use adapter::*;
pub use config::*;
pub use controller::*;
pub use dispatcher::*;
pub use event_loop::*;
pub use policy::*;
pub use provisioning::*;
pub use signal::*;
pub use storage::*;
pub use supervisor::*;
pub use wifi::*;
