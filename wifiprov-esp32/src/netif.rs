//! esp_netif bootstrap
//!
//! The default interfaces are never destroyed; their handles are dropped on
//! purpose and stay owned by ESP-IDF.

use esp_idf_svc::sys::{
    esp, esp_netif_create_default_wifi_ap, esp_netif_create_default_wifi_sta, esp_netif_init,
    EspError, ESP_FAIL,
};
use wifiprov_mcu::NetworkStack;

pub struct EspNetworkStack;

impl NetworkStack for EspNetworkStack {
    type Error = EspError;

    fn init(&self) -> Result<(), EspError> {
        esp!(unsafe { esp_netif_init() })
    }

    fn create_default_station(&self) -> Result<(), EspError> {
        if unsafe { esp_netif_create_default_wifi_sta() }.is_null() {
            return Err(EspError::from_infallible::<ESP_FAIL>());
        }
        Ok(())
    }

    fn create_default_access_point(&self) -> Result<(), EspError> {
        if unsafe { esp_netif_create_default_wifi_ap() }.is_null() {
            return Err(EspError::from_infallible::<ESP_FAIL>());
        }
        Ok(())
    }
}
