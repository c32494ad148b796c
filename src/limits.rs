use crate::config::SteeringParams;
use serde::{Deserialize, Serialize};

/// Torque ceiling, per-invocation rate limits and driver override weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorqueLimits {
    pub max: i32,
    pub delta_up: i32,
    pub delta_down: i32,
    pub driver_allowance: i32,
    pub driver_multiplier: i32,
    pub driver_factor: i32,
}

impl From<&SteeringParams> for TorqueLimits {
    fn from(params: &SteeringParams) -> Self {
        Self {
            max: params.steer_max,
            delta_up: params.delta_up,
            delta_down: params.delta_down,
            driver_allowance: params.driver_allowance,
            driver_multiplier: params.driver_multiplier,
            driver_factor: params.driver_factor,
        }
    }
}

impl Default for TorqueLimits {
    fn default() -> Self {
        Self::from(&SteeringParams::default())
    }
}

impl TorqueLimits {
    /// Bound `desired` by the ceiling, the driver's counter-torque and the
    /// up/down rate relative to `previous`.
    ///
    /// Growing magnitude is limited to `delta_up` per call, shrinking to
    /// `delta_down`. When the driver pushes against the actuator beyond
    /// `driver_allowance`, the allowed torque in the opposing direction is
    /// reduced by `driver_multiplier` units per unit of excess.
    pub fn limit(&self, desired: i32, previous: i32, driver_torque: i32) -> i32 {
        let driver = driver_torque.saturating_mul(self.driver_factor);
        let driver_max = self
            .max
            .saturating_add(self.driver_allowance.saturating_add(driver).saturating_mul(self.driver_multiplier));
        let driver_min = (-self.max)
            .saturating_add((-self.driver_allowance).saturating_add(driver).saturating_mul(self.driver_multiplier));
        let max_allowed = self.max.min(driver_max).max(0);
        let min_allowed = (-self.max).max(driver_min).min(0);

        let torque = clip(desired, min_allowed, max_allowed);

        if previous > 0 {
            clip(
                torque,
                (previous - self.delta_down).max(-self.delta_up),
                previous + self.delta_up,
            )
        } else {
            clip(
                torque,
                previous - self.delta_up,
                (previous + self.delta_down).min(self.delta_up),
            )
        }
    }
}

// min(max(..)) rather than clamp(): bounds are computed and must never panic
fn clip(value: i32, low: i32, high: i32) -> i32 {
    value.max(low).min(high)
}
