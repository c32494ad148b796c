use super::{rolling_counter, Controller};
use crate::codec::SteeringFields;
use crate::config::SequencerConfig;
use crate::limits::TorqueLimits;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteeringState {
    pub last_applied_torque: i32,
    pub same_torque_run_length: u32,
    pub enabled_run_length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteeringOutput {
    pub applied_torque: i32,
    pub assist_enabled: bool,
    /// The limiter changed the planner's request this tick
    pub rate_limited: bool,
    /// Forced one-frame disable to restart the rack's continuous-assist timer
    pub forced_disable: bool,
    /// One-unit nudge to break a static-torque run
    pub nudged: bool,
    pub counter: u8,
}

impl SteeringOutput {
    pub fn fields(&self) -> SteeringFields {
        SteeringFields {
            torque: self.applied_torque,
            assist_enabled: self.assist_enabled,
            counter: self.counter,
        }
    }
}

/// Heading control assist torque generator.
///
/// Every branch guards one of the rack's fault conditions: no assist at
/// standstill or while the rack reports a fault, bounded torque and torque
/// rate, no static torque for longer than the rack's frozen-input timeout,
/// and no uninterrupted assist beyond its continuous-actuation limit.
#[derive(Debug)]
pub struct SteeringCommandGenerator {
    state: SteeringState,
    limits: TorqueLimits,
    period_ticks: u32,
    static_torque_limit: u32,
    enabled_run_limit: u32,
}

impl SteeringCommandGenerator {
    pub fn new(config: &SequencerConfig) -> Self {
        Self {
            state: SteeringState::default(),
            limits: TorqueLimits::from(&config.steering),
            period_ticks: config.steering.period_ticks,
            static_torque_limit: config.static_torque_limit(),
            enabled_run_limit: config.enabled_run_limit(),
        }
    }

    pub fn period_ticks(&self) -> u32 {
        self.period_ticks
    }

    pub fn limits(&self) -> &TorqueLimits {
        &self.limits
    }

    pub fn step(
        &mut self,
        tick: u64,
        enabled: bool,
        standstill: bool,
        steering_fault: bool,
        driver_torque: i32,
        requested_fraction: f32,
    ) -> SteeringOutput {
        let mut output = SteeringOutput {
            applied_torque: 0,
            assist_enabled: false,
            rate_limited: false,
            forced_disable: false,
            nudged: false,
            counter: rolling_counter(tick, self.period_ticks),
        };

        if enabled && !(standstill || steering_fault) {
            let desired = (requested_fraction * self.limits.max as f32).round() as i32;
            let mut applied = self.limits.limit(desired, self.state.last_applied_torque, driver_torque);
            output.rate_limited = desired != applied;

            if applied == 0 {
                // Zero crossings restart the continuous-assist timer for free
                self.state.enabled_run_length = 0;
            } else {
                self.state.enabled_run_length += 1;
                if self.state.enabled_run_length >= self.enabled_run_limit {
                    // Torque keeps flowing; only the enable flag drops for this frame
                    debug!(torque = applied, "forcing one-frame HCA disable after continuous assist limit");
                    self.state.enabled_run_length = 0;
                    output.forced_disable = true;
                } else {
                    output.assist_enabled = true;
                    if applied == self.state.last_applied_torque {
                        self.state.same_torque_run_length += 1;
                        if self.state.same_torque_run_length > self.static_torque_limit {
                            applied -= if applied < 0 { -1 } else { 1 };
                            self.state.same_torque_run_length = 0;
                            output.nudged = true;
                            debug!(torque = applied, "nudged static HCA torque toward zero");
                        }
                    } else {
                        self.state.same_torque_run_length = 0;
                    }
                }
            }

            output.applied_torque = applied;
        } else {
            self.state.enabled_run_length = 0;
        }

        debug_assert!(
            output.applied_torque.abs() <= self.limits.max,
            "Applied torque {} exceeds ceiling {}",
            output.applied_torque,
            self.limits.max
        );

        self.state.last_applied_torque = output.applied_torque;
        output
    }
}

impl Controller for SteeringCommandGenerator {
    type State = SteeringState;

    fn get_state(&self) -> Self::State {
        self.state
    }

    fn reset(&mut self) {
        self.state = SteeringState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> SteeringCommandGenerator {
        SteeringCommandGenerator::new(&SequencerConfig::default())
    }

    #[test]
    fn test_disabled_emits_zero() {
        let mut steering = generator();
        let output = steering.step(0, false, true, false, 0, 1.0);
        assert_eq!(output.applied_torque, 0);
        assert!(!output.assist_enabled);
    }

    #[test]
    fn test_steering_fault_inhibits_and_resets_timer() {
        let mut steering = generator();
        for tick in 0..10 {
            steering.step(tick * 2, true, false, false, 0, 1.0);
        }
        assert_eq!(steering.get_state().enabled_run_length, 10);

        let output = steering.step(20, true, false, true, 0, 1.0);
        assert_eq!(output.applied_torque, 0);
        assert!(!output.assist_enabled);
        assert_eq!(steering.get_state().enabled_run_length, 0);
        assert_eq!(steering.get_state().last_applied_torque, 0);
    }

    #[test]
    fn test_zero_torque_disables_assist() {
        let mut steering = generator();
        let output = steering.step(0, true, false, false, 0, 0.0);
        assert_eq!(output.applied_torque, 0);
        assert!(!output.assist_enabled);
        assert!(!output.rate_limited);
    }

    #[test]
    fn test_counter_follows_period() {
        let mut steering = generator();
        assert_eq!(steering.step(0, true, false, false, 0, 0.1).counter, 0);
        assert_eq!(steering.step(2, true, false, false, 0, 0.1).counter, 1);
        assert_eq!(steering.step(34, true, false, false, 0, 0.1).counter, 1);
    }

    #[test]
    fn test_rate_limited_flag() {
        let mut steering = generator();
        let output = steering.step(0, true, false, false, 0, 1.0);
        assert_eq!(output.applied_torque, 4);
        assert!(output.rate_limited);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut steering = generator();
        steering.step(0, true, false, false, 0, 1.0);
        steering.reset();
        assert_eq!(steering.get_state(), SteeringState::default());
    }
}
