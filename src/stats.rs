use crate::structs::*;

use std::time::Duration;

/// Accounting of one application run. Reset at every start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    /// Packets the transport refused. They are still accounted as sent.
    pub send_failures: u64,
    pub bursts_started: u64,
    pub bursts_ended: u64,
    pub peak_active_bursts: u32,
    pub start_time: Duration,
    pub last_send: Option<Duration>,
}

impl Stats {
    pub fn new(start_time: Duration) -> Self {
        Stats {
            start_time,
            ..Default::default()
        }
    }

    pub fn packet_sent(&mut self, p: &Packet, delivered: bool) {
        self.packets_sent += 1;
        self.bytes_sent += p.size as u64;
        self.last_send = Some(p.timestamp);
        if !delivered {
            self.send_failures += 1;
        }
    }

    /// Average throughput in bits per second between the start and `now`
    pub fn throughput(&self, now: Duration) -> f64 {
        let elapsed = now.saturating_sub(self.start_time).as_secs_f64();
        if elapsed > 0. {
            8. * (self.bytes_sent as f64) / elapsed
        } else {
            0.
        }
    }
}

/// Human-friendly bit rate
pub fn format_throughput(bps: f64) -> String {
    let throughput = bps / 1_000_000.;
    if throughput < 1. {
        format!("{:.2} kbps", throughput * 1000.)
    } else if throughput < 1000. {
        format!("{:.2} Mbps", throughput)
    } else {
        format!("{:.2} Gbps", throughput / 1000.)
    }
}
