//! wifiprov firmware for ESP32
//!
//! Provisions Wi-Fi credentials over a soft AP on first boot and connects as a
//! station afterwards. The boot sequence exercises both paths: connect, wait,
//! forget the credentials, and connect (provision) again.

mod event_loop;
mod netif;
mod provisioning;
mod storage;
mod wifi;

use std::sync::Arc;
use std::time::Duration;

use esp_idf_svc::{eventloop::EspSystemEventLoop, hal::prelude::Peripherals};
use log::*;
use wifiprov_mcu::{ConnectionSupervisor, SupervisorConfig};

const RESET_DELAY: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("wifiprov v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;

    let mut supervisor = ConnectionSupervisor::new(
        storage::NvsFlash,
        netif::EspNetworkStack,
        event_loop::EspEventLoop,
        Arc::new(provisioning::EspProvisioning),
        Arc::new(wifi::EspWifiDriver::new(peripherals.modem, sys_loop)),
        SupervisorConfig::default(),
    );

    supervisor.init()?;
    supervisor.connect()?;
    info!("Online: {:?}", supervisor.address());

    std::thread::sleep(RESET_DELAY);

    info!("Resetting provisioning");
    supervisor.reset_provisioning()?;
    supervisor.connect()?;
    info!("Online again: {:?}", supervisor.address());

    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}
