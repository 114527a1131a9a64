use std::collections::VecDeque;

use serde::Serialize;

use crate::state::SimulationState;

pub const HISTORY_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RainSample {
    pub day: f64,
    pub attenuation_db: f64,
    pub rainfall_rate: f64,
    pub is_raining: bool,
}

/// Most recent rain samples, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RainfallHistory {
    samples: VecDeque<RainSample>,
}

impl RainfallHistory {
    pub fn record(&mut self, state: &SimulationState) {
        if self.samples.len() == HISTORY_LEN {
            self.samples.pop_front();
        }
        self.samples.push_back(RainSample {
            day: state.day,
            attenuation_db: state.cml_attenuation,
            rainfall_rate: state.rainfall_rate,
            is_raining: state.is_raining,
        });
    }

    pub fn samples(&self) -> Vec<RainSample> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    #[test]
    fn keeps_only_the_latest_samples() {
        let mut state = SimulationState::initial(&SimConfig::default());
        let mut history = RainfallHistory::default();
        for tick in 0..40 {
            state.day = tick as f64;
            history.record(&state);
        }
        let samples = history.samples();
        assert_eq!(samples.len(), HISTORY_LEN);
        assert_eq!(samples.first().map(|s| s.day), Some(16.0));
        assert_eq!(samples.last().map(|s| s.day), Some(39.0));
    }
}
