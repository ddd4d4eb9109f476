//! Battery drain model

use drone_core::WeightClass;
use serde::{Deserialize, Serialize};

use crate::rng::RandomSource;

/// Per-tick battery drain parameters, in percentage points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryModel {
    pub idle_drain_min: f64,
    pub idle_drain_max: f64,
    pub moving_base_drain: f64,
    pub drain_per_km: f64,
    pub heavy_factor: f64,
    pub weather_min: f64,
    pub weather_max: f64,
    /// Upper bound for a single tick's drain
    pub max_drain_per_tick: f64,
    /// Flat cost charged when a waypoint is reached
    pub waypoint_cost: f64,
    pub low_battery_threshold: f64,
}

impl Default for BatteryModel {
    fn default() -> Self {
        Self {
            idle_drain_min: 0.05,
            idle_drain_max: 0.10,
            moving_base_drain: 0.1,
            drain_per_km: 0.2,
            heavy_factor: 1.3,
            weather_min: 0.9,
            weather_max: 1.1,
            max_drain_per_tick: 1.0,
            waypoint_cost: 0.5,
            low_battery_threshold: 15.0,
        }
    }
}

impl BatteryModel {
    /// Drain for one tick, clamped to `[0, max_drain_per_tick]`
    pub fn drain(
        &self,
        class: WeightClass,
        distance_m: f64,
        idle: bool,
        rng: &mut dyn RandomSource,
    ) -> f64 {
        let drain = if idle {
            rng.range(self.idle_drain_min, self.idle_drain_max)
        } else {
            let factor = match class {
                WeightClass::Heavy => self.heavy_factor,
                WeightClass::Standard => 1.0,
            };
            let weather = rng.range(self.weather_min, self.weather_max);
            (self.moving_base_drain + distance_m / 1000.0 * self.drain_per_km) * factor * weather
        };
        drain.clamp(0.0, self.max_drain_per_tick)
    }

    /// Battery level after `drain`, clamped to `[0, 100]`
    pub fn apply(&self, level: f64, drain: f64) -> f64 {
        (level - drain).clamp(0.0, 100.0)
    }

    pub fn is_low(&self, level: f64) -> bool {
        level <= self.low_battery_threshold
    }
}
