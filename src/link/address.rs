// Device address validation
//
// Devices are addressed by IPv4 dotted quad only. Octets may carry leading
// zeros ("192.168.001.010") and are always read as decimal; the accepted
// address is normalised before it is placed in a URL so that no downstream
// parser can mistake a zero-prefixed octet for octal.

use crate::link::types::{LinkError, LinkResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Fixed URL scheme used for the device socket
pub const WS_SCHEME: &str = "ws";

/// Fixed path segment of the device socket
pub const WS_PATH: &str = "ws";

/// Returns true if `address` is an IPv4 dotted quad with every octet in 0..=255
pub fn validate(address: &str) -> bool {
    parse_dotted_quad(address).is_some()
}

fn parse_dotted_quad(address: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut count = 0;

    for part in address.split('.') {
        if count == 4 {
            return None;
        }
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        octets[count] = part.parse::<u8>().ok()?;
        count += 1;
    }

    (count == 4).then(|| Ipv4Addr::from(octets))
}

/// A validated device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress(Ipv4Addr);

impl DeviceAddress {
    pub fn parse(address: &str) -> LinkResult<Self> {
        parse_dotted_quad(address)
            .map(DeviceAddress)
            .ok_or_else(|| LinkError::InvalidAddress(address.to_string()))
    }

    /// Socket URL for this device, `ws://<address>/ws`
    pub fn url(&self) -> String {
        format!("{}://{}/{}", WS_SCHEME, self.0, WS_PATH)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for DeviceAddress {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceAddress::parse(s)
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = LinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DeviceAddress::parse(&value)
    }
}

impl From<DeviceAddress> for String {
    fn from(address: DeviceAddress) -> Self {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_dotted_quads() {
        for addr in ["0.0.0.0", "192.168.1.1", "255.255.255.255", "10.0.0.42", "1.2.3.4"] {
            assert!(validate(addr), "{} should be valid", addr);
        }
    }

    #[test]
    fn test_every_octet_boundary() {
        for octet in 0..=255u16 {
            assert!(validate(&format!("{}.0.0.1", octet)));
            assert!(validate(&format!("10.{}.0.1", octet)));
            assert!(validate(&format!("10.0.{}.1", octet)));
            assert!(validate(&format!("10.0.0.{}", octet)));
        }
        assert!(!validate("256.0.0.1"));
        assert!(!validate("10.0.0.256"));
        assert!(!validate("10.300.0.1"));
        assert!(!validate("999.1.1.1"));
    }

    #[test]
    fn test_rejects_wrong_segment_count() {
        for addr in ["192.168.1", "192.168.1.1.1", "192", "", "...", "1..2.3"] {
            assert!(!validate(addr), "{:?} should be invalid", addr);
        }
    }

    #[test]
    fn test_rejects_hostnames_and_ipv6() {
        for addr in [
            "localhost",
            "device.local",
            "::1",
            "fe80::1",
            "192.168.1.1:80",
            " 192.168.1.1",
            "192.168.1.1 ",
            "+1.2.3.4",
            "1.2.3.-4",
            "0x7f.0.0.1",
        ] {
            assert!(!validate(addr), "{:?} should be invalid", addr);
        }
    }

    #[test]
    fn test_leading_zeros_are_decimal() {
        assert!(validate("192.168.001.1"));
        assert!(validate("010.000.000.001"));
        assert!(!validate("0001.1.1.1"));

        let addr = DeviceAddress::parse("192.168.001.010").unwrap();
        assert_eq!(addr.to_string(), "192.168.1.10");
        assert_eq!(addr.url(), "ws://192.168.1.10/ws");
    }

    #[test]
    fn test_parse_reports_input() {
        match DeviceAddress::parse("not-an-ip") {
            Err(LinkError::InvalidAddress(raw)) => assert_eq!(raw, "not-an-ip"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
