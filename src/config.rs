use crate::error::ConfigError;
use crate::random::{pareto_shape, time_slot, RandomVariable};
use crate::structs::*;

use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Bytes added to each packet when computing the send interval (headers below the application)
pub const DEFAULT_HEADER_OVERHEAD: u32 = 30;

/// Parameters of one PPBP application. Fixed once the application is built.
#[derive(Debug, Clone, PartialEq)]
pub struct PpbpConfig {
    /// Bit rate of a single active burst
    pub burst_intensity: DataRate,
    /// Payload size of each packet, in bytes
    pub packet_size: u32,
    pub header_overhead: u32,
    /// Mean rate of burst arrivals (bursts per second)
    pub mean_burst_arrivals: RandomVariable,
    /// Mean burst duration (seconds)
    pub mean_burst_time_length: RandomVariable,
    /// Hurst parameter, in (0.5, 1)
    pub hurst: f64,
    pub remote: SocketAddr,
    pub protocol: L4Proto,
    pub seed: Option<u64>,
}

impl Default for PpbpConfig {
    fn default() -> Self {
        PpbpConfig {
            burst_intensity: DataRate::from_bps(1_000_000),
            packet_size: 1470,
            header_overhead: DEFAULT_HEADER_OVERHEAD,
            mean_burst_arrivals: RandomVariable::constant(20.),
            mean_burst_time_length: RandomVariable::constant(0.2),
            hurst: 0.7,
            remote: SocketAddr::from((Ipv4Addr::LOCALHOST, 9)),
            protocol: L4Proto::UDP,
            seed: None,
        }
    }
}

impl PpbpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // also rejects NaN
        if !(self.hurst > 0.5 && self.hurst < 1.) {
            return Err(ConfigError::InvalidHurst(self.hurst));
        }
        if self.packet_size == 0 {
            return Err(ConfigError::InvalidPacketSize);
        }
        if self.burst_intensity.bit_rate() == 0 {
            return Err(ConfigError::InvalidBurstIntensity);
        }
        self.mean_burst_arrivals
            .validate_positive("mean_burst_arrivals")?;
        self.mean_burst_time_length
            .validate_positive("mean_burst_time_length")?;
        Ok(())
    }

    /// Pareto shape of the burst durations
    pub fn shape(&self) -> f64 {
        pareto_shape(self.hurst)
    }

    /// Pareto scale for the mean burst length, if that mean is finite
    pub fn time_slot(&self) -> Option<f64> {
        self.mean_burst_time_length
            .mean()
            .map(|m| time_slot(self.shape(), m))
    }

    /// Bits accounted for each packet when deriving the send interval
    pub fn packet_bits(&self) -> u64 {
        (self.packet_size as u64 + self.header_overhead as u64) * 8
    }

    /// Little's law: E[n] = lambda x Ton
    pub fn expected_active_bursts(&self) -> Option<f64> {
        Some(self.mean_burst_arrivals.mean()? * self.mean_burst_time_length.mean()?)
    }

    /// Overall rate of the process in bits per second: lambda x Ton x r
    pub fn expected_rate(&self) -> Option<f64> {
        self.expected_active_bursts()
            .map(|n| n * self.burst_intensity.bit_rate() as f64)
    }
}

/// When the host starts and stops the application, in virtual time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationWindow {
    pub start: Duration,
    pub stop: Duration,
}

impl Default for SimulationWindow {
    fn default() -> Self {
        SimulationWindow {
            start: Duration::ZERO,
            stop: Duration::from_secs(5),
        }
    }
}

impl SimulationWindow {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stop < self.start {
            return Err(ConfigError::InvalidWindow {
                start: self.start,
                stop: self.stop,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub application: PpbpConfig,
    pub window: SimulationWindow,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ConfigurationToml {
    application: Option<ApplicationToml>,
    simulation: Option<SimulationToml>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ApplicationToml {
    burst_intensity: Option<DataRate>,
    packet_size: Option<u32>,
    header_overhead: Option<u32>,
    mean_burst_arrivals: Option<RandomVariable>,
    mean_burst_time_length: Option<RandomVariable>,
    hurst: Option<f64>,
    remote: Option<SocketAddr>,
    protocol: Option<L4Proto>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct SimulationToml {
    start: Option<String>,
    stop: Option<String>,
}

impl From<ApplicationToml> for PpbpConfig {
    fn from(a: ApplicationToml) -> Self {
        let d = PpbpConfig::default();
        PpbpConfig {
            burst_intensity: a.burst_intensity.unwrap_or(d.burst_intensity),
            packet_size: a.packet_size.unwrap_or(d.packet_size),
            header_overhead: a.header_overhead.unwrap_or(d.header_overhead),
            mean_burst_arrivals: a.mean_burst_arrivals.unwrap_or(d.mean_burst_arrivals),
            mean_burst_time_length: a
                .mean_burst_time_length
                .unwrap_or(d.mean_burst_time_length),
            hurst: a.hurst.unwrap_or(d.hurst),
            remote: a.remote.unwrap_or(d.remote),
            protocol: a.protocol.unwrap_or(d.protocol),
            seed: a.seed,
        }
    }
}

impl TryFrom<SimulationToml> for SimulationWindow {
    type Error = ConfigError;

    fn try_from(s: SimulationToml) -> Result<Self, Self::Error> {
        let d = SimulationWindow::default();
        let window = SimulationWindow {
            start: s
                .start
                .map(|t| humantime::parse_duration(&t))
                .transpose()?
                .unwrap_or(d.start),
            stop: s
                .stop
                .map(|t| humantime::parse_duration(&t))
                .transpose()?
                .unwrap_or(d.stop),
        };
        Ok(window)
    }
}

impl TryFrom<ConfigurationToml> for Configuration {
    type Error = ConfigError;

    fn try_from(c: ConfigurationToml) -> Result<Self, Self::Error> {
        let config = Configuration {
            application: c.application.unwrap_or_default().into(),
            window: c.simulation.unwrap_or_default().try_into()?,
        };
        config.application.validate()?;
        config.window.validate()?;
        Ok(config)
    }
}

/// Import a configuration from a TOML string. Missing fields take their default value.
pub fn import_config(config_string: &str) -> Result<Configuration, ConfigError> {
    let config: Configuration = toml::from_str::<ConfigurationToml>(config_string)?.try_into()?;
    log::trace!("Configuration: {config:?}");
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Configuration, ConfigError> {
    let config = import_config(&fs::read_to_string(path)?)?;
    log::info!("{} successfully loaded", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = import_config("").unwrap();
        assert_eq!(config.application, PpbpConfig::default());
        assert_eq!(config.window, SimulationWindow::default());
    }

    #[test]
    fn complete_config() {
        let config = import_config(
            r#"
[application]
burst_intensity = "2Mb/s"
packet_size = 512
header_overhead = 0
mean_burst_arrivals = { type = "uniform", min = 10.0, max = 30.0 }
mean_burst_time_length = { type = "constant", value = 0.5 }
hurst = 0.8
remote = "10.1.1.2:9"
protocol = "tcp"
seed = 3

[simulation]
start = "1s"
stop = "1min"
"#,
        )
        .unwrap();
        let app = &config.application;
        assert_eq!(app.burst_intensity.bit_rate(), 2_000_000);
        assert_eq!(app.packet_size, 512);
        assert_eq!(app.packet_bits(), 4096);
        assert_eq!(app.protocol, L4Proto::TCP);
        assert_eq!(app.remote, "10.1.1.2:9".parse().unwrap());
        assert_eq!(app.seed, Some(3));
        assert!((app.shape() - 1.4).abs() < 1e-12);
        assert!((app.expected_active_bursts().unwrap() - 10.).abs() < 1e-9);
        assert_eq!(config.window.start, Duration::from_secs(1));
        assert_eq!(config.window.stop, Duration::from_secs(60));
    }

    #[test]
    fn defaults_match_littles_law_example() {
        let app = PpbpConfig::default();
        assert!((app.expected_active_bursts().unwrap() - 4.).abs() < 1e-9);
        assert!((app.expected_rate().unwrap() - 4e6).abs() < 1e-3);
        assert!((app.time_slot().unwrap() - 0.075).abs() < 1e-12);
        assert_eq!(app.packet_bits(), 1500 * 8);
    }

    #[test]
    fn reject_invalid_hurst() {
        for h in ["0.5", "1.0", "0.3", "1.2", "nan"] {
            let res = import_config(&format!("[application]\nhurst = {h}"));
            assert!(matches!(res, Err(ConfigError::InvalidHurst(_))), "H={h}");
        }
    }

    #[test]
    fn reject_zero_packet_size_and_rate() {
        assert!(matches!(
            import_config("[application]\npacket_size = 0"),
            Err(ConfigError::InvalidPacketSize)
        ));
        assert!(matches!(
            import_config("[application]\nburst_intensity = \"0bps\""),
            Err(ConfigError::InvalidBurstIntensity)
        ));
    }

    #[test]
    fn reject_non_positive_variables() {
        let res = import_config(
            "[application]\nmean_burst_arrivals = { type = \"constant\", value = -1.0 }",
        );
        assert!(matches!(
            res,
            Err(ConfigError::InvalidVariable {
                name: "mean_burst_arrivals",
                ..
            })
        ));
    }

    #[test]
    fn reject_unknown_fields_and_bad_window() {
        assert!(matches!(
            import_config("[application]\nburst_rate = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            import_config("[simulation]\nstart = \"10s\"\nstop = \"1s\""),
            Err(ConfigError::InvalidWindow { .. })
        ));
        assert!(matches!(
            import_config("[simulation]\nstop = \"soon\""),
            Err(ConfigError::InvalidDuration(_))
        ));
    }
}
