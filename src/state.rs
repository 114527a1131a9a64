use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::systems::crop::temperature_at;

pub const FIRST_DAY: f64 = 1.0;
pub const DEFAULT_MOISTURE: f64 = 65.0;

pub(crate) fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// The master record of the farm. Field names serialize in camelCase so the
/// persisted JSON matches what dashboard clients already read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub day: f64,
    pub growth: f64,
    pub moisture: f64,
    pub nutrients: f64,
    #[serde(default)]
    pub pests: f64,
    pub temperature: f64,
    pub cml_attenuation: f64,
    pub is_raining: bool,
    pub rainfall_rate: f64,
    pub yield_quality: f64,
    #[serde(default)]
    pub stress_ticks: u32,
}

impl SimulationState {
    pub fn initial(config: &SimConfig) -> Self {
        Self {
            day: FIRST_DAY,
            growth: 0.0,
            moisture: DEFAULT_MOISTURE,
            nutrients: 100.0,
            pests: 0.0,
            temperature: temperature_at(&config.soil, FIRST_DAY),
            cml_attenuation: config.signal.baseline_db,
            is_raining: false,
            rainfall_rate: 0.0,
            yield_quality: 100.0,
            stress_ticks: 0,
        }
    }

    /// Repairs a record read back from storage. Returns `None` when the record
    /// holds values that cannot be repaired (non-finite numbers, negative day).
    pub fn sanitized(mut self, config: &SimConfig) -> Option<Self> {
        let numbers = [
            self.day,
            self.growth,
            self.moisture,
            self.nutrients,
            self.pests,
            self.temperature,
            self.cml_attenuation,
            self.rainfall_rate,
            self.yield_quality,
        ];
        if numbers.iter().any(|value| !value.is_finite()) || self.day < 0.0 {
            return None;
        }
        self.growth = clamp_percent(self.growth);
        self.moisture = clamp_percent(self.moisture);
        self.nutrients = clamp_percent(self.nutrients);
        self.pests = clamp_percent(self.pests);
        self.yield_quality = clamp_percent(self.yield_quality);
        self.cml_attenuation = self.cml_attenuation.max(config.signal.baseline_db);
        self.is_raining = self.cml_attenuation > config.signal.rat_threshold_db;
        if !self.is_raining {
            self.rainfall_rate = 0.0;
        }
        self.rainfall_rate = self.rainfall_rate.max(0.0);
        Some(self)
    }

    pub fn percentages(&self) -> [f64; 5] {
        [
            self.growth,
            self.moisture,
            self.nutrients,
            self.pests,
            self.yield_quality,
        ]
    }

    pub fn is_mature(&self) -> bool {
        self.growth >= 100.0
    }
}
