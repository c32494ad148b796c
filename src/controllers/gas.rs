use super::Controller;
use crate::codec::{GasFields, COUNTER_MODULUS};
use crate::config::GasParams;
use serde::{Deserialize, Serialize};

// The pedal counts its own 50 Hz frames regardless of the command period
const PEDAL_COUNTER_DIVISOR: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasOutput {
    pub applied: f32,
    pub counter: u8,
}

impl GasOutput {
    pub fn fields(&self) -> GasFields {
        GasFields {
            gas: self.applied,
            counter: self.counter,
        }
    }
}

/// Pedal interceptor gas command: clamped pass-through while engaged.
#[derive(Debug)]
pub struct GasPedalController {
    params: GasParams,
    last_applied: f32,
}

impl GasPedalController {
    pub fn new(params: &GasParams) -> Self {
        Self {
            params: params.clone(),
            last_applied: 0.0,
        }
    }

    pub fn period_ticks(&self) -> u32 {
        self.params.period_ticks
    }

    pub fn step(&mut self, tick: u64, enabled: bool, requested: f32) -> GasOutput {
        let applied = if enabled && !requested.is_nan() {
            requested.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.last_applied = applied;

        GasOutput {
            applied,
            counter: ((tick / PEDAL_COUNTER_DIVISOR) % u64::from(COUNTER_MODULUS)) as u8,
        }
    }
}

impl Controller for GasPedalController {
    type State = f32;

    fn get_state(&self) -> Self::State {
        self.last_applied
    }

    fn reset(&mut self) {
        self.last_applied = 0.0;
    }
}
