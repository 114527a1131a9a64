use serde::Serialize;

use crate::config::SignalConfig;
use crate::systems::weather::WeatherCell;

/// Rain inferred from microwave-link attenuation at the field anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReading {
    pub attenuation_db: f64,
    pub is_raining: bool,
    pub rainfall_rate: f64,
}

/// Levels a link operator would report for the same reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTelemetry {
    pub tsl_dbm: f64,
    pub rsl_dbm: f64,
    pub frequency_ghz: f64,
    pub distance_km: f64,
}

/// Stateless: the same cells always produce the same reading.
#[derive(Debug, Clone)]
pub struct SignalInference {
    config: SignalConfig,
}

impl SignalInference {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn threshold_db(&self) -> f64 {
        self.config.rat_threshold_db
    }

    pub fn infer(&self, cells: &[WeatherCell]) -> SignalReading {
        let peak = cells
            .iter()
            .map(|cell| self.impact(cell))
            .fold(0.0_f64, f64::max);
        self.reading_for(peak)
    }

    /// Builds a reading from a raw attenuation value, applying the baseline floor.
    pub fn reading_for(&self, attenuation_db: f64) -> SignalReading {
        let attenuation_db = attenuation_db.max(self.config.baseline_db);
        let is_raining = attenuation_db > self.config.rat_threshold_db;
        let rainfall_rate = if is_raining {
            attenuation_db * self.config.rainfall_per_db
        } else {
            0.0
        };
        SignalReading {
            attenuation_db,
            is_raining,
            rainfall_rate,
        }
    }

    pub fn telemetry(&self, reading: &SignalReading) -> LinkTelemetry {
        LinkTelemetry {
            tsl_dbm: self.config.tsl_dbm,
            rsl_dbm: self.config.tsl_dbm - self.config.path_loss_db - reading.attenuation_db,
            frequency_ghz: self.config.frequency_ghz,
            distance_km: self.config.link_km,
        }
    }

    fn impact(&self, cell: &WeatherCell) -> f64 {
        let radius = self.config.influence_radius;
        let dx = cell.x - self.config.anchor_x;
        let dy = cell.y - self.config.anchor_y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance < radius {
            (radius - distance) / radius * cell.intensity
        } else {
            0.0
        }
    }
}
