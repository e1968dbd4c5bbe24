use thiserror::Error;

use std::time::Duration;

/// Configuration errors. They are all detected before the application starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Hurst parameter {0} is outside (0.5, 1): the Pareto shape would not be in (1, 2)")]
    InvalidHurst(f64),
    #[error("Packet size must be at least one byte")]
    InvalidPacketSize,
    #[error("Burst intensity must be strictly positive")]
    InvalidBurstIntensity,
    #[error("Invalid random variable \"{name}\": {reason}")]
    InvalidVariable { name: &'static str, reason: String },
    #[error("Cannot parse data rate {0:?}")]
    InvalidDataRate(String),
    #[error("Unknown transport protocol {0:?}")]
    InvalidProtocol(String),
    #[error("Cannot parse duration: {0}")]
    InvalidDuration(#[from] humantime::DurationError),
    #[error("Stop time {stop:?} is before start time {start:?}")]
    InvalidWindow { start: Duration, stop: Duration },
    #[error("Cannot parse the configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Cannot read the configuration file: {0}")]
    Io(#[from] std::io::Error),
}

/// A random variate could not be drawn
#[derive(Error, Debug, PartialEq)]
pub enum SampleError {
    #[error("{name} sample {value} is not strictly positive")]
    NonPositive { name: &'static str, value: f64 },
    #[error("Cannot build the {name} distribution: {reason}")]
    Distribution { name: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection refused by {0}")]
    Refused(std::net::SocketAddr),
    #[error("Transport is not connected")]
    NotConnected,
}
