//! IPv4/IPv6 prefixes.
//!
//! A bare address parses as a host prefix (`/32` or `/128`). Containment
//! never crosses address families.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cidr {
    network: IpAddr,
    prefix_len: u8,
}

impl Cidr {
    pub fn new(address: IpAddr, prefix_len: u8) -> Option<Self> {
        let max = max_prefix(&address);
        if prefix_len > max {
            return None;
        }
        Some(Cidr {
            network: mask(address, prefix_len),
            prefix_len,
        })
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value.split_once('/') {
            Some((address, prefix)) => {
                let address: IpAddr = address.trim().parse().ok()?;
                let prefix_len: u8 = prefix.trim().parse().ok()?;
                Cidr::new(address, prefix_len)
            }
            None => {
                let address: IpAddr = value.parse().ok()?;
                Cidr::new(address, max_prefix(&address))
            }
        }
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// `0.0.0.0/0` or `::/0`.
    pub fn is_default_route(&self) -> bool {
        self.prefix_len == 0
    }

    pub fn contains_addr(&self, address: IpAddr) -> bool {
        if self.network.is_ipv4() != address.is_ipv4() {
            return false;
        }
        mask(address, self.prefix_len) == self.network
    }

    /// True when every address of `other` lies inside this prefix.
    pub fn contains(&self, other: &Cidr) -> bool {
        other.prefix_len >= self.prefix_len && self.contains_addr(other.network)
    }

    pub fn overlaps(&self, other: &Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }
}

fn max_prefix(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask(address: IpAddr, prefix_len: u8) -> IpAddr {
    match address {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let masked = if prefix_len == 0 {
                0
            } else {
                bits & (u32::MAX << (32 - u32::from(prefix_len)))
            };
            IpAddr::V4(masked.into())
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let masked = if prefix_len == 0 {
                0
            } else {
                bits & (u128::MAX << (128 - u32::from(prefix_len)))
            };
            IpAddr::V6(masked.into())
        }
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cidr::parse(s).ok_or_else(|| format!("invalid address prefix '{}'", s))
    }
}

impl Serialize for Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefix() {
        let cidr = Cidr::parse("10.1.2.3/16").unwrap();
        assert_eq!(cidr.to_string(), "10.1.0.0/16");
        assert_eq!(cidr.prefix_len(), 16);
    }

    #[test]
    fn test_parse_bare_address() {
        assert_eq!(Cidr::parse("10.0.1.4").unwrap().to_string(), "10.0.1.4/32");
        assert_eq!(Cidr::parse("fd00::1").unwrap().prefix_len(), 128);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Cidr::parse("Internet").is_none());
        assert!(Cidr::parse("10.0.0.0/33").is_none());
        assert!(Cidr::parse("10.0.0/8").is_none());
        assert!(Cidr::parse("").is_none());
    }

    #[test]
    fn test_containment() {
        let vnet = Cidr::parse("10.1.0.0/16").unwrap();
        let subnet = Cidr::parse("10.1.4.0/24").unwrap();
        let other = Cidr::parse("10.2.0.0/24").unwrap();

        assert!(vnet.contains(&subnet));
        assert!(!subnet.contains(&vnet));
        assert!(!vnet.contains(&other));
        assert!(vnet.overlaps(&subnet));
        assert!(!vnet.overlaps(&other));
    }

    #[test]
    fn test_default_route_contains_everything_in_family() {
        let any4 = Cidr::parse("0.0.0.0/0").unwrap();
        assert!(any4.is_default_route());
        assert!(any4.contains(&Cidr::parse("192.168.1.0/24").unwrap()));
        assert!(!any4.contains(&Cidr::parse("fd00::/64").unwrap()));
    }
}
