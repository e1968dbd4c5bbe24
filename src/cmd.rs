use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use ppbp::config::Configuration;
use ppbp::random::RandomVariable;
use ppbp::structs::*;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Keep the packets in process
    Memory,
    /// Send the packets to the remote address over UDP or TCP
    Socket,
}

/// Command line values that take precedence over the configuration file
#[derive(ClapArgs, Debug, Clone)]
pub struct Overrides {
    #[arg(
        short,
        long,
        default_value = None,
        help = "Path to a TOML configuration with [application] and [simulation] tables"
    )]
    pub config: Option<PathBuf>,
    #[arg(short, long, help = "Seed for random number generation")]
    pub seed: Option<u64>,
    #[arg(long, help = "Data rate of a single burst, such as \"1Mb/s\"")]
    pub burst_intensity: Option<DataRate>,
    #[arg(long, help = "Payload size of the packets, in bytes")]
    pub packet_size: Option<u32>,
    #[arg(long, help = "Constant mean rate of burst arrivals, in bursts per second")]
    pub arrival_rate: Option<f64>,
    #[arg(long, help = "Constant mean burst duration, in seconds")]
    pub burst_length: Option<f64>,
    #[arg(long, help = "Hurst parameter, strictly between 0.5 and 1")]
    pub hurst: Option<f64>,
    #[arg(short, long, help = "Remote address, such as \"10.1.1.2:9\"")]
    pub remote: Option<SocketAddr>,
    #[arg(short, long, help = "Transport protocol: udp or tcp")]
    pub protocol: Option<L4Proto>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Configuration) {
        let app = &mut config.application;
        if let Some(seed) = self.seed {
            app.seed = Some(seed);
        }
        if let Some(rate) = self.burst_intensity {
            app.burst_intensity = rate;
        }
        if let Some(size) = self.packet_size {
            app.packet_size = size;
        }
        if let Some(rate) = self.arrival_rate {
            app.mean_burst_arrivals = RandomVariable::constant(rate);
        }
        if let Some(length) = self.burst_length {
            app.mean_burst_time_length = RandomVariable::constant(length);
        }
        if let Some(h) = self.hurst {
            app.hurst = h;
        }
        if let Some(remote) = self.remote {
            app.remote = remote;
        }
        if let Some(proto) = self.protocol {
            app.protocol = proto;
        }
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the PPBP application over a virtual-time window
    Run {
        #[clap(flatten)]
        overrides: Overrides,
        #[arg(short = 'd', long, default_value = None, help = "Duration of the run described in human-friendly time, such as \"1min 30s\"")]
        duration: Option<String>,
        #[arg(short = 't', long, default_value = None, help = "Virtual start time of the application, such as \"1s\"")]
        start: Option<String>,
        #[arg(long, value_enum, default_value_t = TransportKind::Memory, help = "Where the packets are sent")]
        transport: TransportKind,
        #[arg(short, long, default_value = None, help = "Output file for the JSON lines trace of emitted packets")]
        outfile: Option<PathBuf>,
        #[arg(short, long, default_value_t = false, help = "Log every emitted packet")]
        verbose: bool,
    },
    /// Validate a configuration and print the derived parameters
    Check {
        #[clap(flatten)]
        overrides: Overrides,
    },
}
