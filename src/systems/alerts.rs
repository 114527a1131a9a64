use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::systems::signal::SignalReading;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: u64,
    pub message: String,
    pub attenuation_db: f64,
    pub day: f64,
    pub issued_at: DateTime<Utc>,
    #[serde(skip)]
    expires_at: Instant,
}

impl Alert {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Edge detector over the rain flag. Only a dry-to-wet transition raises an alert.
pub struct AlertEngine {
    ttl: Duration,
    was_raining: bool,
    next_id: u64,
    active: Vec<Alert>,
}

impl AlertEngine {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            was_raining: false,
            next_id: 0,
            active: Vec::new(),
        }
    }

    /// Seeds the previous flag, e.g. after restoring a persisted record.
    pub fn prime(&mut self, was_raining: bool) {
        self.was_raining = was_raining;
    }

    pub fn observe(&mut self, reading: &SignalReading, day: f64, now: Instant) -> Option<Alert> {
        let onset = reading.is_raining && !self.was_raining;
        self.was_raining = reading.is_raining;
        if !onset {
            return None;
        }
        let alert = Alert {
            id: self.next_id,
            message: format!(
                "Rain onset detected: CML attenuation at {:.1} dB. Hold irrigation and check field drainage.",
                reading.attenuation_db
            ),
            attenuation_db: reading.attenuation_db,
            day,
            issued_at: Utc::now(),
            expires_at: now + self.ttl,
        };
        self.next_id += 1;
        info!(
            alert_id = alert.id,
            attenuation_db = alert.attenuation_db,
            day = alert.day,
            "rain onset alert raised"
        );
        self.active.push(alert.clone());
        Some(alert)
    }

    /// Drops expired alerts and returns how many were removed.
    pub fn purge(&mut self, now: Instant) -> usize {
        let before = self.active.len();
        self.active.retain(|alert| !alert.is_expired(now));
        before - self.active.len()
    }

    pub fn active(&self, now: Instant) -> Vec<Alert> {
        self.active
            .iter()
            .filter(|alert| !alert.is_expired(now))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.was_raining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(is_raining: bool) -> SignalReading {
        SignalReading {
            attenuation_db: if is_raining { 9.0 } else { 0.5 },
            is_raining,
            rainfall_rate: if is_raining { 7.2 } else { 0.0 },
        }
    }

    #[test]
    fn only_rising_edges_raise_alerts() {
        let mut engine = AlertEngine::new(Duration::from_secs(5));
        let now = Instant::now();
        let flags = [false, false, true, true, false, true];
        let raised: Vec<usize> = flags
            .iter()
            .enumerate()
            .filter_map(|(index, flag)| {
                engine
                    .observe(&reading(*flag), index as f64, now)
                    .map(|_| index)
            })
            .collect();
        assert_eq!(raised, vec![2, 5]);
        assert_eq!(engine.active(now).len(), 2);
    }

    #[test]
    fn message_carries_the_reading() {
        let mut engine = AlertEngine::new(Duration::from_secs(5));
        let alert = engine.observe(&reading(true), 1.0, Instant::now()).unwrap();
        assert!(alert.message.contains("9.0 dB"));
    }

    #[test]
    fn alerts_expire_after_ttl() {
        let mut engine = AlertEngine::new(Duration::from_secs(5));
        let start = Instant::now();
        engine.observe(&reading(true), 1.0, start);
        assert_eq!(engine.active(start + Duration::from_millis(4_999)).len(), 1);
        assert!(engine.active(start + Duration::from_secs(5)).is_empty());
        assert_eq!(engine.purge(start + Duration::from_secs(6)), 1);
    }

    #[test]
    fn primed_wet_state_suppresses_repeat_alert() {
        let mut engine = AlertEngine::new(Duration::from_secs(5));
        engine.prime(true);
        assert!(engine
            .observe(&reading(true), 1.0, Instant::now())
            .is_none());
    }
}
