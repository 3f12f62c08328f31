//! Credential store on the default NVS partition

use esp_idf_svc::sys::{
    esp, esp_err_t, nvs_flash_erase, nvs_flash_init, EspError, ESP_ERR_NVS_NEW_VERSION_FOUND,
    ESP_ERR_NVS_NO_FREE_PAGES,
};
use wifiprov_mcu::{CredentialStore, StoreStatus};

pub struct NvsFlash;

impl CredentialStore for NvsFlash {
    type Error = EspError;

    fn init(&self) -> Result<StoreStatus, EspError> {
        let code = unsafe { nvs_flash_init() };
        if code == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
            || code == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
        {
            return Ok(StoreStatus::NeedsErase);
        }
        esp!(code)?;
        Ok(StoreStatus::Ready)
    }

    fn erase(&self) -> Result<(), EspError> {
        esp!(unsafe { nvs_flash_erase() })
    }
}
