use std::f64::consts::TAU;

use crate::config::{CropProfile, SoilConfig};
use crate::state::{clamp_percent, SimulationState};
use crate::systems::signal::SignalReading;

/// Diurnal temperature curve; a pure function of `day`.
pub fn temperature_at(soil: &SoilConfig, day: f64) -> f64 {
    soil.base_temp_c + soil.temp_amplitude_c * (day * TAU).sin()
}

pub struct CropModel {
    soil: SoilConfig,
    profile: CropProfile,
    day_step: f64,
}

impl CropModel {
    pub fn new(soil: SoilConfig, profile: CropProfile, day_step: f64) -> Self {
        Self {
            soil,
            profile,
            day_step,
        }
    }

    pub fn evaporation(&self, temperature: f64) -> f64 {
        (temperature / self.soil.evaporation_divisor).max(0.0) * self.profile.evaporation_scale()
    }

    pub fn in_healthy_band(&self, moisture: f64) -> bool {
        (self.soil.healthy_moisture_min..=self.soil.healthy_moisture_max).contains(&moisture)
    }

    pub fn growth_increment(&self, moisture: f64, nutrients: f64) -> f64 {
        let step = if self.in_healthy_band(moisture) && nutrients > self.soil.nutrient_floor {
            self.soil.growth_step
        } else {
            self.soil.stunted_growth_step
        };
        step * self.profile.growth_scale()
    }

    /// Integrates one tick and returns the next record.
    pub fn step(&self, current: &SimulationState, reading: &SignalReading) -> SimulationState {
        let mut next = current.clone();
        next.day = current.day + self.day_step;
        next.temperature = temperature_at(&self.soil, next.day);
        next.cml_attenuation = reading.attenuation_db;
        next.is_raining = reading.is_raining;
        next.rainfall_rate = reading.rainfall_rate;

        let water = if reading.is_raining {
            reading.rainfall_rate * self.soil.rain_gain
        } else {
            -self.evaporation(next.temperature)
        };
        next.moisture = clamp_percent(current.moisture + water);

        next.nutrients = clamp_percent(current.nutrients - current.growth * self.soil.nutrient_use);

        if current.growth < 100.0 {
            let increment = self.growth_increment(next.moisture, next.nutrients);
            next.growth = clamp_percent(current.growth + increment);
        }

        let humid = next.moisture > self.soil.healthy_moisture_max
            && next.temperature > self.soil.pest_temp_c;
        let pest_delta = if humid {
            self.soil.pest_growth
        } else {
            -self.soil.pest_decay
        };
        next.pests = clamp_percent(current.pests + pest_delta);

        let stressed = !self.in_healthy_band(next.moisture)
            || next.nutrients < self.soil.nutrient_floor
            || next.pests > self.soil.pest_stress;
        if stressed {
            next.stress_ticks = current.stress_ticks.saturating_add(1);
            if next.stress_ticks >= self.soil.stress_grace_ticks {
                next.yield_quality = clamp_percent(current.yield_quality - self.soil.quality_decay);
            }
        } else {
            next.stress_ticks = 0;
        }

        next
    }

    pub fn irrigate(&self, moisture: f64) -> f64 {
        clamp_percent(moisture + self.soil.irrigation_bonus)
    }
}
