//! The PPBP traffic source.
//!
//! Bursts arrive following a Poisson process and last for a Pareto-distributed time. While `n`
//! bursts are active, the application sends one packet every `(bits / r) / n` seconds, `r` being
//! the burst intensity. The send interval is re-derived after every packet, so the instantaneous
//! rate follows the burst population.
//!
//! All the work happens in [`PpbpApplication::handle`], called by the host for each event popped
//! from its [`Scheduler`].

use crate::config::PpbpConfig;
use crate::error::{ConfigError, SampleError};
use crate::events::{AppEvent, EventRegistry, EventRole};
use crate::population::BurstPopulation;
use crate::random::BurstSampler;
use crate::scheduler::{EventId, Scheduler};
use crate::stats::Stats;
use crate::structs::*;
use crate::transport::{ConnectStatus, Transport, TransportFactory};

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Stopped,
    /// Started, waiting for the initial send-scheduling pass
    Starting,
    Running,
    Stopping,
}

pub struct PpbpApplication {
    config: PpbpConfig,
    sampler: BurstSampler,
    population: BurstPopulation,
    registry: EventRegistry,
    state: AppState,
    transport: Option<Box<dyn Transport>>,
    transport_factory: TransportFactory,
    connected: bool,
    stats: Stats,
    tx_trace: Vec<Sender<Packet>>,
    next_burst: u64,
}

impl PpbpApplication {
    pub fn new(
        config: PpbpConfig,
        transport_factory: TransportFactory,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let sampler = BurstSampler::new(
            config.mean_burst_arrivals.clone(),
            config.mean_burst_time_length.clone(),
            config.hurst,
            config.seed,
        );
        Ok(PpbpApplication {
            config,
            sampler,
            population: BurstPopulation::default(),
            registry: EventRegistry::default(),
            state: AppState::Stopped,
            transport: None,
            transport_factory,
            connected: false,
            stats: Stats::default(),
            tx_trace: vec![],
            next_burst: 0,
        })
    }

    pub fn config(&self) -> &PpbpConfig {
        &self.config
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn total_bytes(&self) -> u64 {
        self.stats.bytes_sent
    }

    pub fn active_bursts(&self) -> u32 {
        self.population.active()
    }

    pub fn is_off_period(&self) -> bool {
        self.population.is_off_period()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Pareto shape of the burst durations
    pub fn shape(&self) -> f64 {
        self.sampler.shape()
    }

    /// Pareto scale of the latest burst
    pub fn time_slot(&self) -> f64 {
        self.sampler.time_slot()
    }

    pub fn pending_departures(&self) -> usize {
        self.registry.pending_departures()
    }

    pub fn is_send_pending(&self, sched: &impl Scheduler<AppEvent>) -> bool {
        self.registry.is_pending(EventRole::Send, sched)
    }

    /// Receive a copy of every packet sent from now on
    pub fn subscribe_tx(&mut self) -> Receiver<Packet> {
        let (tx, rx) = unbounded();
        self.tx_trace.push(tx);
        rx
    }

    /// Time to send one packet at the rate of a single burst
    fn transmission_time(&self) -> f64 {
        self.config.packet_bits() as f64 / self.config.burst_intensity.bit_rate() as f64
    }

    // Lifecycle

    pub fn start(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        log::info!(
            "Starting PPBP application towards {} ({})",
            self.config.remote,
            self.config.protocol
        );
        self.state = AppState::Starting;
        if self.transport.is_none() {
            self.open_transport();
        }
        self.stats = Stats::new(sched.now());
        self.restart_chain(sched);
    }

    pub fn stop(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        let was_running = self.state != AppState::Stopped;
        self.state = AppState::Stopping;
        self.cancel_events(sched);
        match self.transport.take() {
            Some(mut transport) => transport.close(),
            None => log::warn!("PPBP application found no transport to close on stop"),
        }
        self.connected = false;
        self.state = AppState::Stopped;
        if was_running {
            log::info!(
                "PPBP application stopped: {} packets, {} bytes, {} bursts",
                self.stats.packets_sent,
                self.stats.bytes_sent,
                self.stats.bursts_started
            );
        }
    }

    /// Asynchronous notification that the transport is connected: the burst process and the
    /// transmissions start over.
    pub fn connection_succeeded(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        log::info!("Connected to {}", self.config.remote);
        self.connected = true;
        if matches!(self.state, AppState::Starting | AppState::Running) {
            self.restart_chain(sched);
        }
    }

    /// Asynchronous notification that the transport could not connect. No retry.
    pub fn connection_failed(&mut self, reason: &str) {
        self.connected = false;
        log::warn!("Connection to {} failed: {reason}", self.config.remote);
    }

    fn open_transport(&mut self) {
        let mut transport = (self.transport_factory)(self.config.protocol, self.config.remote);
        if let Err(e) = transport.bind() {
            log::warn!("Cannot bind the {} transport: {e}", self.config.protocol);
        }
        let outcome = transport.connect(self.config.remote);
        self.transport = Some(transport);
        match outcome {
            Ok(ConnectStatus::Connected) => {
                log::debug!("Connected to {}", self.config.remote);
                self.connected = true;
            }
            Ok(ConnectStatus::Pending) => log::debug!("Connection to {} pending", self.config.remote),
            Err(e) => self.connection_failed(&e.to_string()),
        }
    }

    fn restart_chain(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        self.cancel_events(sched);
        self.population.reset();
        self.schedule_start_event(sched);
    }

    fn cancel_events(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        self.registry.cancel_all(sched);
    }

    fn schedule_start_event(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        let id = sched.schedule_after(Duration::ZERO, AppEvent::NextBurst);
        self.registry.set(EventRole::Continuation, id, sched);
        let id = sched.schedule_after(Duration::ZERO, AppEvent::StartSending);
        self.registry.set(EventRole::StartStop, id, sched);
    }

    // Event handlers

    pub fn handle(&mut self, id: EventId, event: AppEvent, sched: &mut impl Scheduler<AppEvent>) {
        if self.state == AppState::Stopped {
            log::warn!("Ignoring {event:?}: the application is stopped");
            return;
        }
        log::trace!("{:?}: {event:?}", sched.now());
        match event {
            AppEvent::StartSending => {
                self.registry.fired(EventRole::StartStop, id);
                self.start_sending(sched);
            }
            AppEvent::NextBurst => {
                self.registry.fired(EventRole::Continuation, id);
                self.next_burst(sched);
            }
            AppEvent::BurstArrival { burst } => {
                self.registry.fired(EventRole::Arrival, id);
                self.burst_arrival(burst, sched);
            }
            AppEvent::BurstDeparture { burst } => {
                self.registry.departure_fired(burst);
                self.burst_departure(burst, sched);
            }
            AppEvent::ResumeSending => {
                self.registry.fired(EventRole::Send, id);
                self.schedule_next_tx(sched);
            }
            AppEvent::SendPacket => {
                self.registry.fired(EventRole::Send, id);
                self.send_packet(sched);
            }
        }
    }

    fn start_sending(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        self.state = AppState::Running;
        self.schedule_next_tx(sched);
    }

    fn draw_burst(&mut self) -> Result<(Duration, Duration), SampleError> {
        Ok((
            self.sampler.draw_inter_arrival()?,
            self.sampler.draw_burst_duration()?,
        ))
    }

    /// One cycle of the burst process: schedules the next arrival, its departure, and the next cycle
    fn next_burst(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        let (inter_arrival, duration) = match self.draw_burst() {
            Ok(draws) => draws,
            Err(e) => {
                log::error!("Burst generation halted: {e}");
                return;
            }
        };
        let burst = self.next_burst;
        self.next_burst += 1;
        log::trace!("Burst {burst}: arrival in {inter_arrival:?}, lasts {duration:?}");

        let id = sched.schedule_after(inter_arrival, AppEvent::BurstArrival { burst });
        self.registry.set(EventRole::Arrival, id, sched);
        let id = sched.schedule_after(
            inter_arrival.saturating_add(duration),
            AppEvent::BurstDeparture { burst },
        );
        self.registry.track_departure(burst, id);
        let id = sched.schedule_after(inter_arrival, AppEvent::NextBurst);
        self.registry.set(EventRole::Continuation, id, sched);
    }

    fn burst_arrival(&mut self, burst: u64, sched: &mut impl Scheduler<AppEvent>) {
        self.population.increment();
        self.stats.bursts_started += 1;
        self.stats.peak_active_bursts = self.population.peak();
        log::trace!(
            "Burst {burst} arrived, {} active",
            self.population.active()
        );
        if self.population.is_off_period() {
            // other arrivals at this instant are applied before the interval is derived
            self.population.set_off_period(false);
            let id = sched.schedule_after(Duration::ZERO, AppEvent::ResumeSending);
            self.registry.set(EventRole::Send, id, sched);
        }
    }

    fn burst_departure(&mut self, burst: u64, sched: &mut impl Scheduler<AppEvent>) {
        self.population.decrement();
        self.stats.bursts_ended += 1;
        log::trace!(
            "Burst {burst} departed, {} active",
            self.population.active()
        );
        if !self.population.is_active() {
            self.registry.cancel(EventRole::Send, sched);
            self.population.set_off_period(true);
            log::debug!("Off period starts at {:?}", sched.now());
        }
    }

    /// Schedule the next packet according to the current number of active bursts
    fn schedule_next_tx(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        if self.population.is_active() {
            self.population.set_off_period(false);
            let interval = self.transmission_time() / self.population.active() as f64;
            let id = sched.schedule_after(Duration::from_secs_f64(interval), AppEvent::SendPacket);
            self.registry.set(EventRole::Send, id, sched);
        } else {
            self.population.set_off_period(true);
        }
    }

    fn send_packet(&mut self, sched: &mut impl Scheduler<AppEvent>) {
        let packet = Packet {
            seq: self.stats.packets_sent,
            size: self.config.packet_size,
            timestamp: sched.now(),
            active_bursts: self.population.active(),
        };
        // subscribers that hung up are forgotten
        self.tx_trace.retain(|tx| tx.send(packet.clone()).is_ok());
        let delivered = match self.transport.as_mut() {
            Some(transport) => transport.send(&packet),
            None => false,
        };
        if !delivered {
            log::trace!("Packet {} was not delivered", packet.seq);
        }
        self.stats.packet_sent(&packet, delivered);
        self.schedule_next_tx(sched);
    }
}
