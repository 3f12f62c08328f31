//! Device identity - station MAC addresses and the provisioning service name
//!
//! The service name is the one bit-exact artifact of the provisioning flow:
//! `PROV_` followed by the low three bytes of the station MAC in uppercase hex.
//! The provisioning manager copies it into a 12-byte buffer, so the visible
//! name must be exactly 11 characters.

use std::fmt;
use std::str::FromStr;

/// Default service name prefix advertised by the soft access point
pub const SERVICE_NAME_PREFIX: &str = "PROV_";

/// Visible length of a service name
pub const SERVICE_NAME_LEN: usize = 11;

/// Size of the C buffer the name is copied into, terminator included
pub const SERVICE_NAME_BUF_LEN: usize = SERVICE_NAME_LEN + 1;

/// Number of MAC bytes that go into the service name
const MAC_SUFFIX_BYTES: usize = 3;

/// A 6-byte hardware (MAC) address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Low three bytes, the device-specific part of the address
    pub fn suffix(&self) -> [u8; MAC_SUFFIX_BYTES] {
        [self.0[3], self.0[4], self.0[5]]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MacParseError {
    #[error("expected 6 octets separated by ':' or '-', got {0:?}")]
    Format(String),
    #[error("invalid hex in MAC address {0:?}")]
    Hex(String),
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// Accepts `AA:BB:CC:DD:EE:FF`, `aa-bb-cc-dd-ee-ff` or the bare 12 hex digits
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = s.split([':', '-']).collect();
        let digits = match parts.len() {
            1 if s.len() == 12 => s.to_string(),
            6 if parts.iter().all(|p| p.len() == 2) => parts.concat(),
            _ => return Err(MacParseError::Format(s.to_string())),
        };

        let bytes = data_encoding::HEXLOWER_PERMISSIVE
            .decode(digits.as_bytes())
            .map_err(|_| MacParseError::Hex(s.to_string()))?;
        let bytes: [u8; 6] = bytes
            .try_into()
            .map_err(|_| MacParseError::Format(s.to_string()))?;
        Ok(Self(bytes))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ServiceNameError {
    #[error("service name prefix {prefix:?} must be {expected} printable ASCII characters")]
    Prefix { prefix: String, expected: usize },
}

/// Name the provisioning session advertises (soft-AP SSID)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    /// `PROV_` + uppercase hex of the low three MAC bytes
    pub fn from_mac(mac: &MacAddress) -> Self {
        Self(format!(
            "{SERVICE_NAME_PREFIX}{}",
            data_encoding::HEXUPPER.encode(&mac.suffix())
        ))
    }

    /// Same as [`ServiceName::from_mac`] with a custom prefix. The prefix must
    /// keep the name at exactly [`SERVICE_NAME_LEN`] characters.
    pub fn with_prefix(prefix: &str, mac: &MacAddress) -> Result<Self, ServiceNameError> {
        let expected = SERVICE_NAME_LEN - 2 * MAC_SUFFIX_BYTES;
        if prefix.len() != expected || !prefix.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(ServiceNameError::Prefix {
                prefix: prefix.to_string(),
                expected,
            });
        }
        Ok(Self(format!(
            "{prefix}{}",
            data_encoding::HEXUPPER.encode(&mac.suffix())
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// NUL-terminated copy for the C provisioning API
    pub fn to_c_buf(&self) -> [u8; SERVICE_NAME_BUF_LEN] {
        let mut buf = [0u8; SERVICE_NAME_BUF_LEN];
        buf[..SERVICE_NAME_LEN].copy_from_slice(&self.0.as_bytes()[..SERVICE_NAME_LEN]);
        buf
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_name_from_mac() {
        let mac = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(ServiceName::from_mac(&mac).as_str(), "PROV_DDEEFF");
    }

    #[test]
    fn service_name_shape() {
        let macs = [
            [0u8; 6],
            [0xFF; 6],
            [0x24, 0x0A, 0xC4, 0x01, 0x02, 0x0A],
            [0x10, 0x20, 0x30, 0xab, 0xcd, 0xef],
        ];
        for bytes in macs {
            let name = ServiceName::from_mac(&MacAddress(bytes));
            let s = name.as_str();
            assert_eq!(s.len(), SERVICE_NAME_LEN);
            assert!(s.starts_with("PROV_"));
            assert!(
                s[5..]
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)),
                "{s}"
            );
        }
    }

    #[test]
    fn service_name_ignores_high_bytes() {
        let a = MacAddress([0x00, 0x11, 0x22, 0x01, 0x02, 0x03]);
        let b = MacAddress([0xFE, 0xDC, 0xBA, 0x01, 0x02, 0x03]);
        assert_eq!(ServiceName::from_mac(&a), ServiceName::from_mac(&b));
        assert_eq!(ServiceName::from_mac(&a).as_str(), "PROV_010203");
    }

    #[test]
    fn c_buffer_is_terminated() {
        let name = ServiceName::from_mac(&MacAddress([0, 0, 0, 0xDD, 0xEE, 0xFF]));
        let buf = name.to_c_buf();
        assert_eq!(&buf[..11], b"PROV_DDEEFF");
        assert_eq!(buf[11], 0);
    }

    #[test]
    fn custom_prefix_must_keep_length() {
        let mac = MacAddress([0, 0, 0, 1, 2, 3]);
        assert_eq!(
            ServiceName::with_prefix("WIFI_", &mac).unwrap().as_str(),
            "WIFI_010203"
        );
        assert!(ServiceName::with_prefix("PROVISION_", &mac).is_err());
        assert!(ServiceName::with_prefix("P_", &mac).is_err());
    }

    #[test]
    fn parse_mac() {
        let expected = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!("AA:BB:CC:DD:EE:FF".parse::<MacAddress>(), Ok(expected));
        assert_eq!("aa-bb-cc-dd-ee-ff".parse::<MacAddress>(), Ok(expected));
        assert_eq!("aabbccddeeff".parse::<MacAddress>(), Ok(expected));
        assert!("AA:BB:CC".parse::<MacAddress>().is_err());
        assert!("GG:BB:CC:DD:EE:FF".parse::<MacAddress>().is_err());
        assert_eq!(expected.to_string(), "AA:BB:CC:DD:EE:FF");
    }
}
