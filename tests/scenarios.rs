use std::sync::Arc;
use std::time::Duration;

use virtual_farm::{
    clock::ManualClock, storage::MemoryStore, SimConfig, SimulationController,
};

fn attach(config: SimConfig, clock: Arc<ManualClock>) -> SimulationController {
    SimulationController::attach(config, Box::new(MemoryStore::new()), clock)
}

#[test]
fn drought_stunts_growth_and_drains_nutrients() {
    let config = SimConfig::default();
    let band_min = config.soil.healthy_moisture_min;
    let stunted = config.soil.stunted_growth_step;
    let full = config.soil.growth_step;
    let mut sim = attach(config, Arc::new(ManualClock::new()));
    sim.force_attenuation(Some(0.0));
    sim.start();

    let mut left_band = false;
    let mut previous = sim.state().clone();
    for _ in 0..1_500 {
        let summary = sim.tick().expect("running");
        let state = summary.state;
        assert!(!state.is_raining);

        let delta = state.growth - previous.growth;
        if state.moisture < band_min {
            left_band = true;
            assert!((delta - stunted).abs() < 1e-9, "expected stunted step, got {delta}");
        } else {
            assert!((delta - full).abs() < 1e-9, "expected full step, got {delta}");
        }
        if previous.growth > 0.0 {
            assert!(state.nutrients < previous.nutrients);
        }
        previous = state;
    }
    assert!(left_band, "evaporation should push moisture out of the band");
}

#[test]
fn single_wet_tick_raises_one_expiring_alert() {
    let clock = Arc::new(ManualClock::new());
    let mut sim = attach(SimConfig::default(), clock.clone());
    sim.start();

    sim.force_attenuation(Some(12.0));
    let wet = sim.tick().expect("running");
    assert!(wet.state.is_raining);
    let alert = wet.rain_onset.expect("onset alert");
    assert!(alert.message.contains("12.0 dB"));

    sim.force_attenuation(Some(0.0));
    let dry = sim.tick().expect("running");
    assert!(dry.rain_onset.is_none());
    assert_eq!(sim.alerts().len(), 1);

    clock.advance(Duration::from_millis(4_900));
    assert_eq!(sim.alerts().len(), 1);
    clock.advance(Duration::from_millis(200));
    assert!(sim.alerts().is_empty());
    assert_eq!(sim.purge_alerts(), 1);
}

#[test]
fn alerts_fire_on_edges_only() {
    let mut sim = attach(SimConfig::default(), Arc::new(ManualClock::new()));
    sim.start();
    let flags = [false, false, true, true, false, true];
    let mut raised = Vec::new();
    for (index, wet) in flags.iter().enumerate() {
        sim.force_attenuation(Some(if *wet { 10.0 } else { 0.0 }));
        if sim.tick().expect("running").rain_onset.is_some() {
            raised.push(index);
        }
    }
    assert_eq!(raised, vec![2, 5]);
    assert_eq!(sim.alerts().len(), 2);
}

#[test]
fn alerts_expire_even_while_paused() {
    let clock = Arc::new(ManualClock::new());
    let mut sim = attach(SimConfig::default(), clock.clone());
    sim.start();
    sim.force_attenuation(Some(10.0));
    sim.tick();
    sim.pause();
    assert_eq!(sim.alerts().len(), 1);
    clock.advance(Duration::from_secs(6));
    assert!(sim.alerts().is_empty());
}

#[test]
fn rain_cell_over_the_anchor_is_detected() {
    let mut config = SimConfig::default();
    config.weather.spawn_probability = 0.0;
    let mut sim = attach(config, Arc::new(ManualClock::new()));
    sim.start();
    assert!(sim.seed_cell(45.0, 50.0, 20.0));
    let mut onset_tick = None;
    for _ in 0..40 {
        let summary = sim.tick().expect("running");
        if summary.rain_onset.is_some() {
            onset_tick = Some(summary.tick);
        }
    }
    assert_eq!(onset_tick, Some(1));
    assert!(sim.state().moisture > 0.0);
    let link = sim.link_telemetry();
    assert!(link.rsl_dbm <= -45.5);
}

#[test]
fn rain_history_is_bounded_and_cleared_on_reset() {
    let mut sim = attach(SimConfig::default(), Arc::new(ManualClock::new()));
    sim.start();
    for _ in 0..100 {
        sim.tick();
    }
    assert_eq!(sim.history().len(), 24);
    sim.reset();
    assert!(sim.history().is_empty());
}
