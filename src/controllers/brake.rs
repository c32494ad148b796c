use super::{rolling_counter, Controller};
use crate::codec::{BrakeFields, BrakeStatusFields};
use crate::config::BrakeParams;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const BRAKING_WORKING_ACTIVE: u8 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmStage {
    #[default]
    Idle,
    PreArmed,
    Armed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrakeArmState {
    pub armed: bool,
    pub pre_armed: bool,
    /// Set on the first saturated request, held until cleared or reset
    pub saturation_latched: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrakeOutput {
    pub applied: u16,
    pub armed: bool,
    pub pre_armed: bool,
    pub stopping_wish: bool,
    pub saturated: bool,
    pub counter: u8,
}

impl BrakeOutput {
    pub fn fields(&self) -> BrakeFields {
        BrakeFields {
            units: self.applied,
            armed: self.armed,
            pre_armed: self.pre_armed,
            stopping_wish: self.stopping_wish,
            counter: self.counter,
        }
    }

    /// Cluster status for this brake tick: green while the system is
    /// engaged, orange once the brake channel is fully armed.
    pub fn status_fields(&self, enabled: bool, abs_active: bool) -> BrakeStatusFields {
        BrakeStatusFields {
            green_led: enabled,
            orange_led: self.armed && self.pre_armed,
            braking_working: if enabled && abs_active { BRAKING_WORKING_ACTIVE } else { 0 },
            counter: self.counter,
        }
    }
}

/// Two-step arming handshake for the secondary brake request.
///
/// A new request spends one tick in `PreArmed` and one in `Armed` with zero
/// output before any brake torque is commanded. Any zero request drops back
/// to `Idle` and the handshake starts over.
#[derive(Debug)]
pub struct BrakeArmController {
    stage: ArmStage,
    saturation_latched: bool,
    params: BrakeParams,
}

impl BrakeArmController {
    pub fn new(params: &BrakeParams) -> Self {
        Self {
            stage: ArmStage::Idle,
            saturation_latched: false,
            params: params.clone(),
        }
    }

    pub fn period_ticks(&self) -> u32 {
        self.params.period_ticks
    }

    pub fn status_period_ticks(&self) -> u32 {
        self.params.status_period_ticks
    }

    pub fn stage(&self) -> ArmStage {
        self.stage
    }

    pub fn clear_warning(&mut self) {
        self.saturation_latched = false;
    }

    pub fn step(&mut self, tick: u64, enabled: bool, requested_fraction: f32, speed_mps: f32) -> BrakeOutput {
        let mut output = BrakeOutput {
            applied: 0,
            armed: false,
            pre_armed: false,
            stopping_wish: false,
            saturated: false,
            counter: rolling_counter(tick, self.params.period_ticks),
        };

        if !enabled {
            self.stage = ArmStage::Idle;
            return output;
        }

        let mut raw = requested_fraction * self.params.scale;
        if raw.is_nan() || raw < self.params.min_request {
            raw = 0.0;
        }

        if raw > 0.0 {
            match self.stage {
                ArmStage::Idle => {
                    debug!("brake request rising, pre-arming");
                    self.stage = ArmStage::PreArmed;
                }
                ArmStage::PreArmed => {
                    debug!("brake channel armed");
                    self.stage = ArmStage::Armed;
                }
                ArmStage::Armed => {
                    let ceiling = f32::from(self.params.max_units);
                    if raw > ceiling - 1.0 {
                        output.applied = self.params.max_units;
                        output.saturated = true;
                        if !self.saturation_latched {
                            warn!(requested = raw, ceiling, "brake request saturated");
                        }
                        self.saturation_latched = true;
                    } else {
                        output.applied = raw.round() as u16;
                    }
                    output.stopping_wish =
                        output.applied > 0 && speed_mps < self.params.stopping_speed_mps;
                }
            }
        } else {
            if self.stage != ArmStage::Idle {
                debug!("brake request released, disarming");
            }
            self.stage = ArmStage::Idle;
        }

        output.pre_armed = self.stage != ArmStage::Idle;
        output.armed = self.stage == ArmStage::Armed;
        output
    }
}

impl Controller for BrakeArmController {
    type State = BrakeArmState;

    fn get_state(&self) -> Self::State {
        BrakeArmState {
            armed: self.stage == ArmStage::Armed,
            pre_armed: self.stage != ArmStage::Idle,
            saturation_latched: self.saturation_latched,
        }
    }

    fn reset(&mut self) {
        self.stage = ArmStage::Idle;
        self.saturation_latched = false;
    }
}
