use std::f64::consts::TAU;

use rand::Rng;
use serde::Serialize;

use crate::config::WeatherConfig;

/// A localized rain system drifting across the normalized field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherCell {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
}

pub struct WeatherField {
    config: WeatherConfig,
    cells: Vec<WeatherCell>,
    next_id: u64,
}

impl WeatherField {
    pub fn new(config: WeatherConfig) -> Self {
        Self {
            cells: Vec::with_capacity(config.max_cells),
            config,
            next_id: 0,
        }
    }

    pub fn cells(&self) -> &[WeatherCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Moves every cell east and lets it wander north/south with the day.
    /// Cells past the eastern edge are dropped.
    pub fn advance(&mut self, day: f64) {
        let bound = self.config.field_size;
        for cell in &mut self.cells {
            cell.x += self.config.cell_speed;
            let phase = day * TAU + cell.id as f64;
            cell.y = (cell.y + phase.sin() * self.config.wander).clamp(0.0, bound);
        }
        self.cells.retain(|cell| cell.x <= bound);
    }

    /// Rolls once for a new cell on the western edge. At most one cell per call.
    pub fn maybe_spawn<R: Rng>(&mut self, rng: &mut R) -> Option<&WeatherCell> {
        if self.cells.len() >= self.config.max_cells {
            return None;
        }
        let probability = if self.config.spawn_probability.is_nan() {
            0.0
        } else {
            self.config.spawn_probability.clamp(0.0, 1.0)
        };
        if !rng.gen_bool(probability) {
            return None;
        }
        let y = rng.gen_range(0.0..=self.config.field_size);
        let intensity = if self.config.intensity_max > self.config.intensity_min {
            rng.gen_range(self.config.intensity_min..self.config.intensity_max)
        } else {
            self.config.intensity_min
        };
        self.push(0.0, y, intensity)
    }

    /// Places a cell directly, honoring the cap.
    pub fn place(&mut self, x: f64, y: f64, intensity: f64) -> Option<&WeatherCell> {
        if self.cells.len() >= self.config.max_cells {
            return None;
        }
        self.push(x, y, intensity)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    fn push(&mut self, x: f64, y: f64, intensity: f64) -> Option<&WeatherCell> {
        let id = self.next_id;
        self.next_id += 1;
        self.cells.push(WeatherCell {
            id,
            x,
            y,
            intensity,
        });
        self.cells.last()
    }
}
