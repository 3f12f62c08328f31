//! Wi-Fi driver
//!
//! `esp_wifi_init` goes through esp-idf-svc's `WifiDriver`, which is kept for
//! the life of the firmware. Mode, start and connect are plain `esp_wifi_*`
//! calls since the provisioning manager drives the same driver underneath.

use std::sync::{Mutex, PoisonError};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::*;
use esp_idf_svc::wifi::WifiDriver;
use log::info;
use wifiprov_mcu::{WifiMode, WirelessDriver};
use wifiprov_proto::MacAddress;

pub struct EspWifiDriver {
    modem: Mutex<Option<Modem>>,
    sysloop: EspSystemEventLoop,
    driver: Mutex<Option<WifiDriver<'static>>>,
}

impl EspWifiDriver {
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Self {
        Self {
            modem: Mutex::new(Some(modem)),
            sysloop,
            driver: Mutex::new(None),
        }
    }
}

impl WirelessDriver for EspWifiDriver {
    type Error = EspError;

    fn init(&self) -> Result<(), EspError> {
        let modem = self
            .modem
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(EspError::from_infallible::<ESP_ERR_INVALID_STATE>)?;

        let nvs = EspDefaultNvsPartition::take()?;
        let driver = WifiDriver::new(modem, self.sysloop.clone(), Some(nvs))?;
        *self.driver.lock().unwrap_or_else(PoisonError::into_inner) = Some(driver);
        info!("Wi-Fi driver initialized");
        Ok(())
    }

    fn set_mode(&self, mode: WifiMode) -> Result<(), EspError> {
        let mode = match mode {
            WifiMode::Station => wifi_mode_t_WIFI_MODE_STA,
        };
        esp!(unsafe { esp_wifi_set_mode(mode) })
    }

    fn start(&self) -> Result<(), EspError> {
        esp!(unsafe { esp_wifi_start() })
    }

    fn connect(&self) -> Result<(), EspError> {
        esp!(unsafe { esp_wifi_connect() })
    }

    fn station_mac(&self) -> Result<MacAddress, EspError> {
        let mut mac = [0u8; 6];
        esp!(unsafe { esp_wifi_get_mac(wifi_interface_t_WIFI_IF_STA, mac.as_mut_ptr()) })?;
        Ok(MacAddress(mac))
    }
}
