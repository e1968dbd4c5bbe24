/// The PPBP traffic source and its event handlers
pub mod application;
/// Configuration of the application and of the simulation window
pub mod config;
pub mod error;
/// Events and the registry of their pending handles
pub mod events;
/// JSON lines export of the emitted packets
pub mod export;
pub mod population;
/// Random variables and the burst sampler
pub mod random;
pub mod scheduler;
/// Host driver over a virtual-time window
pub mod simulation;
pub mod stats;
pub mod structs;
pub mod transport;

pub use application::{AppState, PpbpApplication};
pub use config::{Configuration, PpbpConfig, SimulationWindow};
pub use simulation::Simulation;
