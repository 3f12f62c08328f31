//! Default event loop and translation of ESP-IDF events
//!
//! Handlers run on the system event task, one event at a time.

use std::ffi::{c_void, CStr};
use std::net::Ipv4Addr;

use esp_idf_svc::sys::*;
use log::debug;
use wifiprov_mcu::{EventHandler, EventLoop};
use wifiprov_proto::{
    AddressEvent, Credentials, DriverEvent, Event, EventDomain, FailureReason, MacAddress,
    ProvisioningEvent,
};

pub struct EspEventLoop;

/// Handler state passed to the trampoline. Registrations are never removed,
/// so each one is leaked.
struct Registration {
    domain: EventDomain,
    handler: EventHandler,
}

impl EventLoop for EspEventLoop {
    type Error = EspError;

    fn create_default(&self) -> Result<(), EspError> {
        // Taking `EspSystemEventLoop` may have created it already
        match unsafe { esp_event_loop_create_default() } {
            code if code == ESP_ERR_INVALID_STATE as esp_err_t => {
                debug!("Default event loop already exists");
                Ok(())
            }
            code => esp!(code),
        }
    }

    fn register(&self, domain: EventDomain, handler: EventHandler) -> Result<(), EspError> {
        let (base, id) = unsafe {
            match domain {
                EventDomain::Provisioning => (WIFI_PROV_EVENT, ESP_EVENT_ANY_ID),
                EventDomain::DriverLink => (WIFI_EVENT, ESP_EVENT_ANY_ID),
                EventDomain::AddressAssignment => {
                    (IP_EVENT, ip_event_t_IP_EVENT_STA_GOT_IP as i32)
                }
            }
        };

        let registration = Box::into_raw(Box::new(Registration { domain, handler }));
        let result = esp!(unsafe {
            esp_event_handler_register(base, id, Some(on_event), registration as *mut c_void)
        });
        if result.is_err() {
            drop(unsafe { Box::from_raw(registration) });
        }
        result
    }
}

unsafe extern "C" fn on_event(
    arg: *mut c_void,
    _base: esp_event_base_t,
    id: i32,
    data: *mut c_void,
) {
    let registration = &*(arg as *const Registration);
    let event = match registration.domain {
        EventDomain::Provisioning => Event::Provisioning(provisioning_event(id, data)),
        EventDomain::DriverLink => Event::Driver(driver_event(id, data)),
        EventDomain::AddressAssignment => Event::Address(address_event(id, data)),
    };
    (registration.handler)(&event);
}

unsafe fn provisioning_event(id: i32, data: *mut c_void) -> ProvisioningEvent {
    match id as wifi_prov_cb_event_t {
        wifi_prov_cb_event_t_WIFI_PROV_START => ProvisioningEvent::Started,
        wifi_prov_cb_event_t_WIFI_PROV_CRED_RECV if !data.is_null() => {
            let config = &*(data as *const wifi_sta_config_t);
            ProvisioningEvent::CredentialsReceived(Credentials::new(
                c_field(&config.ssid),
                c_field(&config.password),
            ))
        }
        wifi_prov_cb_event_t_WIFI_PROV_CRED_FAIL if !data.is_null() => {
            let reason = *(data as *const wifi_prov_sta_fail_reason_t);
            let reason = if reason == wifi_prov_sta_fail_reason_t_WIFI_PROV_STA_AUTH_ERROR {
                FailureReason::AuthError
            } else {
                FailureReason::ApNotFound
            };
            ProvisioningEvent::CredentialFailure(reason)
        }
        wifi_prov_cb_event_t_WIFI_PROV_CRED_SUCCESS => ProvisioningEvent::CredentialSuccess,
        wifi_prov_cb_event_t_WIFI_PROV_END => ProvisioningEvent::Ended,
        _ => ProvisioningEvent::Other(id),
    }
}

unsafe fn driver_event(id: i32, data: *mut c_void) -> DriverEvent {
    match id as wifi_event_t {
        wifi_event_t_WIFI_EVENT_STA_START => DriverEvent::StationStarted,
        wifi_event_t_WIFI_EVENT_STA_DISCONNECTED => DriverEvent::StationDisconnected,
        wifi_event_t_WIFI_EVENT_AP_STACONNECTED if !data.is_null() => {
            let peer = &*(data as *const wifi_event_ap_staconnected_t);
            DriverEvent::PeerJoined(MacAddress(peer.mac))
        }
        wifi_event_t_WIFI_EVENT_AP_STADISCONNECTED if !data.is_null() => {
            let peer = &*(data as *const wifi_event_ap_stadisconnected_t);
            DriverEvent::PeerLeft(MacAddress(peer.mac))
        }
        _ => DriverEvent::Other(id),
    }
}

unsafe fn address_event(id: i32, data: *mut c_void) -> AddressEvent {
    match id as ip_event_t {
        ip_event_t_IP_EVENT_STA_GOT_IP if !data.is_null() => {
            let got_ip = &*(data as *const ip_event_got_ip_t);
            // lwIP keeps the address in network order
            AddressEvent::Assigned(Ipv4Addr::from(got_ip.ip_info.ip.addr.to_le_bytes()))
        }
        _ => AddressEvent::Other(id),
    }
}

/// NUL-terminated (or full-length) byte field as a string
fn c_field(bytes: &[u8]) -> String {
    match CStr::from_bytes_until_nul(bytes) {
        Ok(s) => s.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}
