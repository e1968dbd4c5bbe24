use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// A transport protocol
#[allow(clippy::upper_case_acronyms)]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum L4Proto {
    #[serde(alias = "tcp")]
    TCP,
    #[default]
    #[serde(alias = "udp")]
    UDP,
}

impl Display for L4Proto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            L4Proto::TCP => write!(f, "TCP"),
            L4Proto::UDP => write!(f, "UDP"),
        }
    }
}

impl FromStr for L4Proto {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(L4Proto::TCP),
            "udp" => Ok(L4Proto::UDP),
            _ => Err(ConfigError::InvalidProtocol(s.to_string())),
        }
    }
}

/// A bit rate, in bits per second. Parsed from strings such as "1Mb/s", "500kbps" or "2MB/s".
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "String")]
pub struct DataRate(u64);

// Suffixes are matched longest first so that "kbps" is not read as "bps"
const RATE_UNITS: [(&str, f64); 16] = [
    ("Gbps", 1e9),
    ("Gb/s", 1e9),
    ("GB/s", 8e9),
    ("Mbps", 1e6),
    ("Mb/s", 1e6),
    ("MB/s", 8e6),
    ("kbps", 1e3),
    ("kb/s", 1e3),
    ("Kbps", 1e3),
    ("Kb/s", 1e3),
    ("kB/s", 8e3),
    ("KB/s", 8e3),
    ("bps", 1.),
    ("b/s", 1.),
    ("Bps", 8.),
    ("B/s", 8.),
];

impl DataRate {
    pub const fn from_bps(bits_per_second: u64) -> Self {
        DataRate(bits_per_second)
    }

    pub fn bit_rate(&self) -> u64 {
        self.0
    }

    /// Time needed to transmit `bytes` at this rate
    pub fn transmission_time(&self, bytes: u64) -> Duration {
        Duration::from_secs_f64((bytes * 8) as f64 / self.0 as f64)
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

impl FromStr for DataRate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (number, factor) = RATE_UNITS
            .iter()
            .find_map(|(unit, factor)| s.strip_suffix(unit).map(|n| (n, *factor)))
            .unwrap_or((s, 1.));
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidDataRate(s.to_string()))?;
        let bps = value * factor;
        if !bps.is_finite() || bps < 0. {
            return Err(ConfigError::InvalidDataRate(s.to_string()));
        }
        Ok(DataRate(bps.round() as u64))
    }
}

impl TryFrom<String> for DataRate {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A packet emitted by the application. The payload is never materialized: transports write
/// `size` zero bytes.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number, starting at 0 at each start
    pub seq: u64,
    /// Payload size in bytes
    pub size: u32,
    /// Virtual time of the emission
    #[serde(serialize_with = "serialize_secs")]
    pub timestamp: Duration,
    /// Number of active bursts when the packet was sent
    pub active_bursts: u32,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_data_rates() {
        assert_eq!("1Mb/s".parse::<DataRate>().unwrap().bit_rate(), 1_000_000);
        assert_eq!("100Mbps".parse::<DataRate>().unwrap().bit_rate(), 100_000_000);
        assert_eq!("500kb/s".parse::<DataRate>().unwrap().bit_rate(), 500_000);
        assert_eq!("1.5Gbps".parse::<DataRate>().unwrap().bit_rate(), 1_500_000_000);
        assert_eq!("2MB/s".parse::<DataRate>().unwrap().bit_rate(), 16_000_000);
        assert_eq!("1200bps".parse::<DataRate>().unwrap().bit_rate(), 1200);
        assert_eq!("64000".parse::<DataRate>().unwrap().bit_rate(), 64000);
    }

    #[test]
    fn reject_bad_data_rates() {
        assert!("fast".parse::<DataRate>().is_err());
        assert!("-1Mbps".parse::<DataRate>().is_err());
        assert!("Mbps".parse::<DataRate>().is_err());
    }

    #[test]
    fn transmission_time() {
        let rate = DataRate::from_bps(1_000_000);
        assert_eq!(rate.transmission_time(125), Duration::from_millis(1));
    }

    #[test]
    fn parse_protocols() {
        assert_eq!("udp".parse::<L4Proto>().unwrap(), L4Proto::UDP);
        assert_eq!("TCP".parse::<L4Proto>().unwrap(), L4Proto::TCP);
        assert!("icmp".parse::<L4Proto>().is_err());
    }
}
