use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SimConfig;
use crate::history::{RainSample, RainfallHistory};
use crate::state::SimulationState;
use crate::storage::{StateStore, StorageError, RUNNING_KEY, STATE_KEY};
use crate::systems::{
    Alert, AlertEngine, CropModel, LinkTelemetry, SignalInference, SignalReading, Valuation,
    WeatherCell, WeatherField,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
}

impl RunState {
    pub fn is_running(self) -> bool {
        self == RunState::Running
    }
}

/// Result of the write that follows every mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum PersistOutcome {
    Saved,
    /// The write failed; the record stays in memory and is written again on
    /// the next mutation or flush.
    Deferred(String),
}

#[derive(Debug, Clone)]
pub struct TickSummary {
    pub tick: u64,
    pub state: SimulationState,
    pub reading: SignalReading,
    pub market_value: f64,
    pub rain_onset: Option<Alert>,
    pub persistence: PersistOutcome,
}

/// Read-only view handed to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub name: String,
    pub tick: u64,
    pub run_state: RunState,
    pub state: SimulationState,
    pub market_value: f64,
    pub link: LinkTelemetry,
    pub cells: Vec<WeatherCell>,
    pub alerts: Vec<Alert>,
    pub persistence: PersistOutcome,
}

/// Owns the farm record and every ephemeral artifact around it. All
/// mutation goes through `tick` and the action methods.
pub struct SimulationController {
    config: SimConfig,
    state: SimulationState,
    run_state: RunState,
    weather: WeatherField,
    signal: SignalInference,
    crop: CropModel,
    alerts: AlertEngine,
    valuation: Valuation,
    history: RainfallHistory,
    rng: ChaCha8Rng,
    store: Box<dyn StateStore>,
    clock: Arc<dyn Clock>,
    attenuation_override: Option<f64>,
    ticks: u64,
    market_value: f64,
    last_persist: PersistOutcome,
}

impl SimulationController {
    /// Builds a controller and restores whatever the store holds. Unreadable
    /// or corrupt records fall back to defaults, and so does a config that
    /// fails validation.
    pub fn attach(config: SimConfig, store: Box<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                warn!(error = %err, "invalid config; falling back to defaults");
                SimConfig::default()
            }
        };
        let valuation = Valuation::new(config.valuation.market_scale);
        let mut controller = Self {
            state: SimulationState::initial(&config),
            run_state: RunState::Idle,
            weather: WeatherField::new(config.weather.clone()),
            signal: SignalInference::new(config.signal.clone()),
            crop: CropModel::new(
                config.soil.clone(),
                config.crop_profile(),
                config.timing.day_step,
            ),
            alerts: AlertEngine::new(Duration::from_millis(config.alerts.ttl_ms)),
            valuation,
            history: RainfallHistory::default(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            store,
            clock,
            attenuation_override: None,
            ticks: 0,
            market_value: 0.0,
            last_persist: PersistOutcome::Saved,
            config,
        };
        controller.restore();
        controller
    }

    fn restore(&mut self) {
        match self.store.get(STATE_KEY) {
            Ok(Some(text)) => match serde_json::from_str::<SimulationState>(&text) {
                Ok(stored) => match stored.sanitized(&self.config) {
                    Some(state) => {
                        info!(day = state.day, growth = state.growth, "restored farm state");
                        self.state = state;
                    }
                    None => warn!("stored farm state out of range; using defaults"),
                },
                Err(err) => warn!(error = %err, "stored farm state is corrupt; using defaults"),
            },
            Ok(None) => debug!("no stored farm state; starting from defaults"),
            Err(err) => warn!(error = %err, "failed to read farm state; using defaults"),
        }

        self.run_state = match self.store.get(RUNNING_KEY) {
            Ok(Some(text)) => match serde_json::from_str::<bool>(&text) {
                Ok(true) => RunState::Running,
                Ok(false) => RunState::Idle,
                Err(err) => {
                    warn!(error = %err, "stored run flag is corrupt; staying idle");
                    RunState::Idle
                }
            },
            Ok(None) => RunState::Idle,
            Err(err) => {
                warn!(error = %err, "failed to read run flag; staying idle");
                RunState::Idle
            }
        };

        self.alerts.prime(self.state.is_raining);
        self.market_value = self
            .valuation
            .market_value(self.state.growth, self.state.yield_quality);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    pub fn current_tick(&self) -> u64 {
        self.ticks
    }

    pub fn market_value(&self) -> f64 {
        self.market_value
    }

    pub fn cells(&self) -> &[WeatherCell] {
        self.weather.cells()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.active(self.clock.now())
    }

    pub fn history(&self) -> Vec<RainSample> {
        self.history.samples()
    }

    pub fn link_telemetry(&self) -> LinkTelemetry {
        let reading = self.signal.reading_for(self.state.cml_attenuation);
        self.signal.telemetry(&reading)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            name: self.config.name.clone(),
            tick: self.ticks,
            run_state: self.run_state,
            state: self.state.clone(),
            market_value: self.market_value,
            link: self.link_telemetry(),
            cells: self.weather.cells().to_vec(),
            alerts: self.alerts(),
            persistence: self.last_persist.clone(),
        }
    }

    pub fn start(&mut self) {
        if self.run_state.is_running() {
            return;
        }
        self.run_state = RunState::Running;
        info!(day = self.state.day, "simulation started");
        self.persist();
    }

    pub fn pause(&mut self) {
        if !self.run_state.is_running() {
            return;
        }
        self.run_state = RunState::Idle;
        info!(day = self.state.day, "simulation paused");
        self.persist();
    }

    pub fn reset(&mut self) {
        self.state = SimulationState::initial(&self.config);
        self.run_state = RunState::Idle;
        self.weather.clear();
        self.alerts.clear();
        self.history.clear();
        self.ticks = 0;
        self.market_value = self
            .valuation
            .market_value(self.state.growth, self.state.yield_quality);
        info!("simulation reset to defaults");
        self.persist();
    }

    /// Farm actions only apply while running. While idle they are dropped
    /// without a write, including when they arrive over HTTP.
    pub fn irrigate(&mut self) {
        if !self.accepts_action("irrigate") {
            return;
        }
        self.state.moisture = self.crop.irrigate(self.state.moisture);
        self.persist();
    }

    /// Tops nutrients back up to 100. Ignored while idle, like `irrigate`.
    pub fn fertilize(&mut self) {
        if !self.accepts_action("fertilize") {
            return;
        }
        self.state.nutrients = 100.0;
        self.persist();
    }

    pub fn control_pests(&mut self) {
        if !self.accepts_action("control_pests") {
            return;
        }
        self.state.pests = 0.0;
        self.persist();
    }

    /// Pins the link reading to a fixed attenuation, bypassing the weather
    /// field. `None` returns control to the cells.
    pub fn force_attenuation(&mut self, attenuation_db: Option<f64>) {
        self.attenuation_override = attenuation_db;
    }

    /// Places a rain cell directly on the field, subject to the cell cap.
    pub fn seed_cell(&mut self, x: f64, y: f64, intensity: f64) -> bool {
        self.weather.place(x, y, intensity).is_some()
    }

    /// Runs one full tick. Returns `None` without touching anything when idle.
    pub fn tick(&mut self) -> Option<TickSummary> {
        if !self.run_state.is_running() {
            return None;
        }
        let now = self.clock.now();
        self.alerts.purge(now);

        self.weather.advance(self.state.day);
        if let Some(cell) = self.weather.maybe_spawn(&mut self.rng) {
            debug!(cell_id = cell.id, y = cell.y, intensity = cell.intensity, "rain cell spawned");
        }

        let reading = match self.attenuation_override {
            Some(attenuation_db) => self.signal.reading_for(attenuation_db),
            None => self.signal.infer(self.weather.cells()),
        };

        let next = self.crop.step(&self.state, &reading);
        if next.is_mature() && !self.state.is_mature() {
            info!(day = next.day, "crop reached full maturity");
        }
        let market_value = self.valuation.market_value(next.growth, next.yield_quality);
        let rain_onset = self.alerts.observe(&reading, next.day, now);

        self.state = next;
        self.market_value = market_value;
        self.ticks += 1;
        self.history.record(&self.state);
        let persistence = self.persist();

        Some(TickSummary {
            tick: self.ticks,
            state: self.state.clone(),
            reading,
            market_value,
            rain_onset,
            persistence,
        })
    }

    /// Removes expired alerts; driven by a timer separate from the tick loop.
    pub fn purge_alerts(&mut self) -> usize {
        self.alerts.purge(self.clock.now())
    }

    pub fn needs_flush(&self) -> bool {
        matches!(self.last_persist, PersistOutcome::Deferred(_))
    }

    /// Retries a deferred write.
    pub fn flush(&mut self) -> PersistOutcome {
        self.persist()
    }

    fn accepts_action(&self, action: &'static str) -> bool {
        if self.run_state.is_running() {
            true
        } else {
            debug!(action, "ignoring farm action while idle");
            false
        }
    }

    fn persist(&mut self) -> PersistOutcome {
        let outcome = match self.write_records() {
            Ok(()) => PersistOutcome::Saved,
            Err(err) => {
                warn!(error = %err, tick = self.ticks, "failed to persist farm state; will retry");
                PersistOutcome::Deferred(err.to_string())
            }
        };
        self.last_persist = outcome.clone();
        outcome
    }

    fn write_records(&mut self) -> Result<(), StorageError> {
        let state = serde_json::to_string(&self.state).map_err(|source| StorageError::Encode {
            key: STATE_KEY,
            source,
        })?;
        let running =
            serde_json::to_string(&self.run_state.is_running()).map_err(|source| {
                StorageError::Encode {
                    key: RUNNING_KEY,
                    source,
                }
            })?;
        self.store.set(STATE_KEY, &state)?;
        self.store.set(RUNNING_KEY, &running)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    fn controller(store: &MemoryStore) -> SimulationController {
        SimulationController::attach(
            SimConfig::default(),
            Box::new(store.clone()),
            Arc::new(ManualClock::new()),
        )
    }

    #[test]
    fn idle_controller_does_not_tick() {
        let store = MemoryStore::new();
        let mut sim = controller(&store);
        let before = sim.state().clone();
        assert!(sim.tick().is_none());
        assert_eq!(sim.state(), &before);
        assert_eq!(sim.current_tick(), 0);
    }

    #[test]
    fn start_and_pause_are_idempotent() {
        let store = MemoryStore::new();
        let mut sim = controller(&store);
        sim.start();
        sim.start();
        assert_eq!(sim.run_state(), RunState::Running);
        sim.pause();
        sim.pause();
        assert_eq!(sim.run_state(), RunState::Idle);
    }

    #[test]
    fn actions_are_ignored_while_idle() {
        let store = MemoryStore::new();
        let mut sim = controller(&store);
        sim.irrigate();
        assert_eq!(sim.state().moisture, 65.0);

        sim.start();
        for _ in 0..200 {
            sim.tick();
        }
        sim.pause();
        let paused = sim.state().clone();
        assert!(paused.nutrients < 100.0);
        let writes_before = store.raw(STATE_KEY);
        sim.fertilize();
        sim.control_pests();
        sim.irrigate();
        assert_eq!(sim.state(), &paused);
        assert_eq!(store.raw(STATE_KEY), writes_before);
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let mut config = SimConfig::default();
        config.weather.spawn_probability = 1.5;
        let mut sim = SimulationController::attach(
            config,
            Box::new(MemoryStore::new()),
            Arc::new(ManualClock::new()),
        );
        assert_eq!(
            sim.config().weather.spawn_probability,
            SimConfig::default().weather.spawn_probability
        );
        sim.start();
        for _ in 0..100 {
            assert!(sim.tick().is_some());
        }
    }

    #[test]
    fn corrupt_store_falls_back_to_defaults() {
        let store = MemoryStore::new();
        store.insert(STATE_KEY, "{not json");
        store.insert(RUNNING_KEY, "maybe");
        let sim = controller(&store);
        assert_eq!(sim.state(), &SimulationState::initial(&SimConfig::default()));
        assert_eq!(sim.run_state(), RunState::Idle);
    }

    #[test]
    fn failed_write_is_deferred_then_retried() {
        let store = MemoryStore::new();
        let mut sim = controller(&store);
        sim.start();
        store.fail_writes(true);
        let summary = sim.tick().expect("running");
        assert!(matches!(summary.persistence, PersistOutcome::Deferred(_)));
        assert!(sim.needs_flush());
        store.fail_writes(false);
        assert_eq!(sim.flush(), PersistOutcome::Saved);
        assert!(!sim.needs_flush());
    }

    #[test]
    fn tick_persists_state_and_flag() {
        let store = MemoryStore::new();
        let mut sim = controller(&store);
        sim.start();
        sim.tick();
        assert_eq!(store.raw(RUNNING_KEY).as_deref(), Some("true"));
        let stored: SimulationState =
            serde_json::from_str(&store.raw(STATE_KEY).unwrap()).unwrap();
        assert_eq!(&stored, sim.state());
    }
}
