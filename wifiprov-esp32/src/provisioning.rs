//! ESP-IDF provisioning manager (`wifi_prov_mgr`)

use std::ffi::{c_char, c_void, CString};
use std::ptr;

use esp_idf_svc::sys::*;
use wifiprov_mcu::{ProvisioningScheme, ProvisioningSubsystem, SecurityLevel, SessionRequest};

pub struct EspProvisioning;

const NO_EVENT_HANDLER: wifi_prov_event_handler_t = wifi_prov_event_handler_t {
    event_cb: None,
    user_data: ptr::null_mut(),
};

fn optional_c_string(value: &Option<String>) -> Result<Option<CString>, EspError> {
    value
        .as_deref()
        .map(CString::new)
        .transpose()
        .map_err(|_| EspError::from_infallible::<ESP_ERR_INVALID_ARG>())
}

fn as_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |s| s.as_ptr())
}

impl ProvisioningSubsystem for EspProvisioning {
    type Error = EspError;

    fn init(&self, scheme: ProvisioningScheme) -> Result<(), EspError> {
        let scheme = match scheme {
            ProvisioningScheme::SoftAp => unsafe { wifi_prov_scheme_softap },
        };
        let config = wifi_prov_mgr_config_t {
            scheme,
            scheme_event_handler: NO_EVENT_HANDLER,
            app_event_handler: NO_EVENT_HANDLER,
        };
        esp!(unsafe { wifi_prov_mgr_init(config) })
    }

    fn is_provisioned(&self) -> Result<bool, EspError> {
        let mut provisioned = false;
        esp!(unsafe { wifi_prov_mgr_is_provisioned(&mut provisioned) })?;
        Ok(provisioned)
    }

    fn start_session(&self, request: &SessionRequest) -> Result<(), EspError> {
        let security = match request.security {
            SecurityLevel::Security0 => wifi_prov_security_WIFI_PROV_SECURITY_0,
        };
        let pop = optional_c_string(&request.proof_of_possession)?;
        let service_key = optional_c_string(&request.service_key)?;
        let service_name = request.service_name.to_c_buf();

        esp!(unsafe {
            wifi_prov_mgr_start_provisioning(
                security,
                as_ptr(&pop) as *const c_void,
                service_name.as_ptr() as *const c_char,
                as_ptr(&service_key),
            )
        })
    }

    fn deinit(&self) {
        unsafe { wifi_prov_mgr_deinit() }
    }

    fn reset_credentials(&self) -> Result<(), EspError> {
        esp!(unsafe { wifi_prov_mgr_reset_provisioning() })
    }

    fn reset_state_on_failure(&self) -> Result<(), EspError> {
        esp!(unsafe { wifi_prov_mgr_reset_sm_state_on_failure() })
    }
}
