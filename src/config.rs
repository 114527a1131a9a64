use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_name() -> String {
    "virtual_farm".to_string()
}

fn default_seed() -> u64 {
    7
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid range for {field}: {min} > {max}")]
    InvertedRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must lie within [0, 1], got {value}")]
    NotProbability { field: &'static str, value: f64 },
}

/// Crops the farm can be planted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropKind {
    Rice,
    Cowpea,
    #[default]
    Maize,
    Cassava,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropProfile {
    pub season_days: f64,
    pub water_need: f64,
}

/// Season length the growth steps are calibrated against.
const REFERENCE_SEASON_DAYS: f64 = 90.0;

impl CropKind {
    pub fn profile(self) -> CropProfile {
        match self {
            CropKind::Rice => CropProfile {
                season_days: 120.0,
                water_need: 0.8,
            },
            CropKind::Cowpea => CropProfile {
                season_days: 70.0,
                water_need: 0.4,
            },
            CropKind::Maize => CropProfile {
                season_days: 90.0,
                water_need: 0.6,
            },
            CropKind::Cassava => CropProfile {
                season_days: 300.0,
                water_need: 0.3,
            },
        }
    }
}

impl CropProfile {
    /// Multiplier on the growth steps; short-season crops mature faster.
    pub fn growth_scale(&self) -> f64 {
        REFERENCE_SEASON_DAYS / self.season_days
    }

    /// Multiplier on evaporation; thirsty crops pull more water out of the soil.
    pub fn evaporation_scale(&self) -> f64 {
        0.5 + self.water_need
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_interval_ms: u64,
    pub day_step: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            day_step: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub field_size: f64,
    pub max_cells: usize,
    pub spawn_probability: f64,
    pub intensity_min: f64,
    pub intensity_max: f64,
    pub cell_speed: f64,
    pub wander: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            field_size: 100.0,
            max_cells: 3,
            spawn_probability: 0.02,
            intensity_min: 8.0,
            intensity_max: 25.0,
            cell_speed: 0.5,
            wander: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub influence_radius: f64,
    pub baseline_db: f64,
    pub rat_threshold_db: f64,
    pub rainfall_per_db: f64,
    pub tsl_dbm: f64,
    pub path_loss_db: f64,
    pub frequency_ghz: f64,
    pub link_km: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            anchor_x: 50.0,
            anchor_y: 50.0,
            influence_radius: 20.0,
            baseline_db: 0.5,
            rat_threshold_db: 5.5,
            rainfall_per_db: 0.8,
            tsl_dbm: 14.5,
            path_loss_db: 59.5,
            frequency_ghz: 23.5,
            link_km: 4.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilConfig {
    pub base_temp_c: f64,
    pub temp_amplitude_c: f64,
    pub evaporation_divisor: f64,
    pub rain_gain: f64,
    pub irrigation_bonus: f64,
    pub nutrient_use: f64,
    pub healthy_moisture_min: f64,
    pub healthy_moisture_max: f64,
    pub nutrient_floor: f64,
    pub growth_step: f64,
    pub stunted_growth_step: f64,
    pub pest_temp_c: f64,
    pub pest_growth: f64,
    pub pest_decay: f64,
    pub pest_stress: f64,
    pub stress_grace_ticks: u32,
    pub quality_decay: f64,
}

impl Default for SoilConfig {
    fn default() -> Self {
        Self {
            base_temp_c: 28.0,
            temp_amplitude_c: 6.0,
            evaporation_divisor: 400.0,
            rain_gain: 0.05,
            irrigation_bonus: 15.0,
            nutrient_use: 0.0005,
            healthy_moisture_min: 40.0,
            healthy_moisture_max: 80.0,
            nutrient_floor: 20.0,
            growth_step: 0.05,
            stunted_growth_step: 0.005,
            pest_temp_c: 26.0,
            pest_growth: 0.05,
            pest_decay: 0.01,
            pest_stress: 70.0,
            stress_grace_ticks: 50,
            quality_decay: 0.02,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub ttl_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { ttl_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    pub market_scale: f64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            market_scale: 85_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub crop: CropKind,
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub soil: SoilConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub valuation: ValuationConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            seed: default_seed(),
            crop: CropKind::default(),
            storage_dir: None,
            timing: TimingConfig::default(),
            weather: WeatherConfig::default(),
            signal: SignalConfig::default(),
            soil: SoilConfig::default(),
            alerts: AlertConfig::default(),
            valuation: ValuationConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: SimConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.tick_interval_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "timing.tick_interval_ms",
            });
        }
        positive("timing.day_step", self.timing.day_step)?;
        positive("weather.field_size", self.weather.field_size)?;
        if self.weather.max_cells == 0 {
            return Err(ConfigError::NotPositive {
                field: "weather.max_cells",
            });
        }
        if !(0.0..=1.0).contains(&self.weather.spawn_probability) {
            return Err(ConfigError::NotProbability {
                field: "weather.spawn_probability",
                value: self.weather.spawn_probability,
            });
        }
        ordered(
            "weather.intensity",
            self.weather.intensity_min,
            self.weather.intensity_max,
        )?;
        positive("signal.influence_radius", self.signal.influence_radius)?;
        positive("signal.baseline_db", self.signal.baseline_db)?;
        ordered(
            "signal.rat_threshold_db",
            self.signal.baseline_db,
            self.signal.rat_threshold_db,
        )?;
        positive("soil.evaporation_divisor", self.soil.evaporation_divisor)?;
        for (field, value) in [
            ("soil.rain_gain", self.soil.rain_gain),
            ("soil.irrigation_bonus", self.soil.irrigation_bonus),
            ("soil.nutrient_use", self.soil.nutrient_use),
            ("soil.growth_step", self.soil.growth_step),
            ("soil.stunted_growth_step", self.soil.stunted_growth_step),
            ("soil.pest_growth", self.soil.pest_growth),
            ("soil.pest_decay", self.soil.pest_decay),
            ("soil.quality_decay", self.soil.quality_decay),
        ] {
            non_negative(field, value)?;
        }
        ordered(
            "soil.healthy_moisture",
            self.soil.healthy_moisture_min,
            self.soil.healthy_moisture_max,
        )?;
        ordered(
            "soil.growth_step",
            self.soil.stunted_growth_step,
            self.soil.growth_step,
        )?;
        if self.alerts.ttl_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "alerts.ttl_ms",
            });
        }
        Ok(())
    }

    pub fn crop_profile(&self) -> CropProfile {
        self.crop.profile()
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn ordered(field: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    if min > max {
        Err(ConfigError::InvertedRange { field, min, max })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = SimConfig::from_yaml_str("name: test_plot\ncrop: rice\nseed: 99\n").unwrap();
        assert_eq!(config.name, "test_plot");
        assert_eq!(config.crop, CropKind::Rice);
        assert_eq!(config.seed, 99);
        assert_eq!(config.weather.max_cells, 3);
        assert_eq!(config.alerts.ttl_ms, 5_000);
    }

    #[test]
    fn rejects_inverted_healthy_band() {
        let mut config = SimConfig::default();
        config.soil.healthy_moisture_min = 90.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange {
                field: "soil.healthy_moisture",
                ..
            })
        ));
    }

    #[test]
    fn rejects_negative_growth_step() {
        let err = SimConfig::from_yaml_str("soil:\n  stunted_growth_step: -0.5\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Negative {
                field: "soil.stunted_growth_step",
                ..
            })
        ));
    }

    #[test]
    fn rejects_negative_decay_and_consumption() {
        let mut config = SimConfig::default();
        config.soil.quality_decay = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative {
                field: "soil.quality_decay",
                ..
            })
        ));

        let mut config = SimConfig::default();
        config.soil.nutrient_use = -0.001;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative {
                field: "soil.nutrient_use",
                ..
            })
        ));
    }

    #[test]
    fn rejects_bad_spawn_probability() {
        let mut config = SimConfig::default();
        config.weather.spawn_probability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_season_crops_grow_faster() {
        assert!(CropKind::Cowpea.profile().growth_scale() > 1.0);
        assert!(CropKind::Cassava.profile().growth_scale() < 1.0);
        assert_eq!(CropKind::Maize.profile().growth_scale(), 1.0);
    }
}
