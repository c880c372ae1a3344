//! Common types used throughout dhcpstorm

use std::fmt;
use std::str::FromStr;

/// MAC Address (6 bytes)
///
/// The client identity key for lease and classifier lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Broadcast MAC address (ff:ff:ff:ff:ff:ff)
    pub const fn broadcast() -> Self {
        Self([0xff, 0xff, 0xff, 0xff, 0xff, 0xff])
    }

    /// Zero MAC address (00:00:00:00:00:00)
    pub const fn zero() -> Self {
        Self([0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to array
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// True for locally administered unicast addresses (the kind a
    /// starvation client forges)
    pub fn is_local_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0 && self.0[0] & 0x02 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(crate::Error::parse("Invalid MAC address format"));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| crate::Error::parse("Invalid MAC address hex"))?;
        }

        Ok(MacAddr(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display() {
        let mac = MacAddr::new([0x02, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);
        assert_eq!(mac.to_string(), "02:1a:2b:3c:4d:5e");
    }

    #[test]
    fn test_mac_from_str() {
        let mac: MacAddr = "02:1a:2b:3c:4d:5e".parse().unwrap();
        assert_eq!(mac.octets(), [0x02, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);

        assert!("02:1a:2b".parse::<MacAddr>().is_err());
        assert!("zz:1a:2b:3c:4d:5e".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_mac_broadcast_and_zero() {
        assert_eq!(MacAddr::broadcast().octets(), [0xff; 6]);
        assert_eq!(MacAddr::zero().octets(), [0x00; 6]);
    }

    #[test]
    fn test_is_local_unicast() {
        assert!(MacAddr::new([0x02, 0, 0, 0, 0, 1]).is_local_unicast());
        // multicast bit set
        assert!(!MacAddr::new([0x03, 0, 0, 0, 0, 1]).is_local_unicast());
        // globally administered
        assert!(!MacAddr::new([0x00, 0x1a, 0, 0, 0, 1]).is_local_unicast());
    }
}
