pub mod clock;
pub mod config;
pub mod controller;
pub mod driver;
pub mod history;
pub mod state;
pub mod storage;
pub mod systems;
pub mod web;

pub use config::{CropKind, SimConfig};
pub use controller::{EngineSnapshot, PersistOutcome, RunState, SimulationController, TickSummary};
pub use state::SimulationState;
