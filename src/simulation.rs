//! Host driver: owns the event queue, starts the application at the beginning of the window and
//! stops it at the end.

use crate::application::PpbpApplication;
use crate::config::SimulationWindow;
use crate::events::AppEvent;
use crate::scheduler::{EventQueue, Scheduler};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct Simulation {
    queue: EventQueue<AppEvent>,
    app: PpbpApplication,
    running: Arc<AtomicBool>,
}

impl Simulation {
    pub fn new(app: PpbpApplication) -> Self {
        Self::with_running_flag(app, Arc::new(AtomicBool::new(true)))
    }

    /// The run ends early once `running` is cleared (e.g. by a signal handler)
    pub fn with_running_flag(app: PpbpApplication, running: Arc<AtomicBool>) -> Self {
        Simulation {
            queue: EventQueue::new(),
            app,
            running,
        }
    }

    pub fn app(&self) -> &PpbpApplication {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut PpbpApplication {
        &mut self.app
    }

    pub fn queue(&self) -> &EventQueue<AppEvent> {
        &self.queue
    }

    pub fn now(&self) -> Duration {
        self.queue.now()
    }

    pub fn start_app(&mut self) {
        self.app.start(&mut self.queue);
    }

    pub fn stop_app(&mut self) {
        self.app.stop(&mut self.queue);
    }

    /// Process the next event if it fires strictly before `limit`
    pub fn step(&mut self, limit: Duration) -> Option<AppEvent> {
        let (id, event) = self.queue.pop_before(limit)?;
        self.app.handle(id, event, &mut self.queue);
        Some(event)
    }

    /// Run the application over `window`. Returns the number of events processed.
    pub fn run(&mut self, window: SimulationWindow) -> u64 {
        self.queue.advance_to(window.start);
        self.start_app();
        let mut events = 0;
        while self.running.load(Ordering::SeqCst) {
            if self.step(window.stop).is_none() {
                break;
            }
            events += 1;
        }
        if self.running.load(Ordering::SeqCst) {
            self.queue.advance_to(window.stop);
        } else {
            log::info!("Simulation interrupted at {:?}", self.now());
        }
        self.stop_app();
        log::debug!("{events} events processed");
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PpbpConfig;
    use crate::transport::MemorySink;

    fn simulation(sink: &MemorySink) -> Simulation {
        let config = PpbpConfig {
            seed: Some(11),
            ..Default::default()
        };
        Simulation::new(PpbpApplication::new(config, sink.factory()).unwrap())
    }

    #[test]
    fn run_covers_the_window() {
        let sink = MemorySink::new();
        let mut sim = simulation(&sink);
        let window = SimulationWindow {
            start: Duration::from_secs(1),
            stop: Duration::from_secs(3),
        };
        assert!(sim.run(window) > 0);
        assert_eq!(sim.now(), window.stop);
        assert_eq!(sim.queue().pending_count(), 0);
        assert!(sink
            .received()
            .iter()
            .all(|p| p.timestamp > window.start && p.timestamp < window.stop));
        assert_eq!(sim.app().stats().start_time, window.start);
    }

    #[test]
    fn cleared_flag_stops_immediately() {
        let sink = MemorySink::new();
        let config = PpbpConfig::default();
        let running = Arc::new(AtomicBool::new(false));
        let mut sim = Simulation::with_running_flag(
            PpbpApplication::new(config, sink.factory()).unwrap(),
            running,
        );
        assert_eq!(sim.run(SimulationWindow::default()), 0);
        assert_eq!(sim.now(), Duration::ZERO);
        assert_eq!(sink.closes(), 1);
    }

    #[test]
    fn empty_window() {
        let sink = MemorySink::new();
        let mut sim = simulation(&sink);
        let window = SimulationWindow {
            start: Duration::from_secs(2),
            stop: Duration::from_secs(2),
        };
        assert_eq!(sim.run(window), 0);
        assert_eq!(sink.received_count(), 0);
    }
}
