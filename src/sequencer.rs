use crate::codec::{Frame, FrameCodec};
use crate::config::{ConfigError, SequencerConfig};
use crate::controllers::buttons::select_button;
use crate::controllers::{
    is_due, AccButtonInjector, BrakeArmController, BrakeArmState, BrakeOutput, ButtonKind, Controller,
    GasOutput, GasPedalController, InjectorState, RadarVinBroadcaster, SteeringCommandGenerator,
    SteeringOutput, SteeringState,
};
use crate::vehicle::{Actuators, ControlWarnings, VehicleState, VehicleStateSink, VehicleStateSource};
use heapless::Vec;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;
use tracing::trace;

// steering + brake + brake status + gas + radar VIN + button
pub const MAX_FRAMES_PER_TICK: usize = 8;

const_assert!(MAX_FRAMES_PER_TICK >= 6);

pub type FrameBatch = Vec<Frame, MAX_FRAMES_PER_TICK>;

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("outbound frame batch full, dropped frame {id:#05X}")]
    BatchFull { id: u32 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SequencerStats {
    pub ticks: u64,
    pub frames_emitted: u64,
    pub hca_forced_disables: u32,
    pub hca_torque_nudges: u32,
    pub button_requests_accepted: u32,
    pub button_requests_dropped: u32,
    pub button_sessions_completed: u32,
    pub button_sessions_expired: u32,
    pub button_frames_sent: u32,
    pub brake_saturations: u32,
}

/// Everything produced by one sequencer invocation.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub tick: u64,
    pub frames: FrameBatch,
    pub warnings: ControlWarnings,
    pub steering: Option<SteeringOutput>,
    pub brake: Option<BrakeOutput>,
    pub gas: Option<GasOutput>,
}

/// Top-level driver: owns the tick counter and one instance of each
/// controller, runs them at their periods and batches the resulting frames.
pub struct CommandSequencer {
    config: SequencerConfig,
    codec: FrameCodec,

    steering: SteeringCommandGenerator,
    brake: BrakeArmController,
    gas: GasPedalController,
    buttons: AccButtonInjector,
    radar: Option<RadarVinBroadcaster>,

    tick: u64,
    stats: SequencerStats,
}

impl CommandSequencer {
    pub fn new(config: SequencerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let radar = config
            .radar
            .as_ref()
            .map(|radar| RadarVinBroadcaster::new(radar, config.buses.radar))
            .transpose()?;

        Ok(Self {
            codec: FrameCodec::for_variant(config.variant),
            steering: SteeringCommandGenerator::new(&config),
            brake: BrakeArmController::new(&config.brake),
            gas: GasPedalController::new(&config.gas),
            buttons: AccButtonInjector::new(&config.buttons),
            radar,
            tick: 0,
            stats: SequencerStats::default(),
            config,
        })
    }

    /// Run one tick. Frames are ordered steering, brake, brake status, gas,
    /// radar VIN, buttons.
    pub fn update(
        &mut self,
        enabled: bool,
        vehicle: &VehicleState,
        actuators: &Actuators,
    ) -> Result<TickOutput, SequencerError> {
        let tick = self.tick;
        let buses = self.config.buses;
        let mut output = TickOutput {
            tick,
            frames: Vec::new(),
            warnings: ControlWarnings::default(),
            steering: None,
            brake: None,
            gas: None,
        };

        if is_due(tick, self.steering.period_ticks()) {
            let steering = self.steering.step(
                tick,
                enabled,
                vehicle.standstill,
                vehicle.steering_fault,
                vehicle.driver_torque,
                actuators.steer,
            );
            if steering.forced_disable {
                self.stats.hca_forced_disables += 1;
            }
            if steering.nudged {
                self.stats.hca_torque_nudges += 1;
            }
            output.warnings.steer_rate_limited = steering.rate_limited;
            push_frame(&mut output.frames, self.codec.encode_steering(&steering.fields(), buses.powertrain))?;
            output.steering = Some(steering);
        }

        if self.config.enable_gas_interceptor {
            self.update_longitudinal(tick, enabled, vehicle, actuators, &mut output)?;
        }

        if let Some(radar) = self.radar.as_mut() {
            if let Some(frame) = radar.step(tick) {
                push_frame(&mut output.frames, frame)?;
            }
        }

        self.update_buttons(tick, enabled, vehicle, &mut output)?;

        self.stats.ticks += 1;
        self.stats.frames_emitted += output.frames.len() as u64;
        self.tick = self.tick.wrapping_add(1);

        Ok(output)
    }

    /// Pull vehicle state from `source`, run one tick and forward the
    /// tick's warnings to `sink`.
    pub fn update_from<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        enabled: bool,
        actuators: &Actuators,
    ) -> Result<TickOutput, SequencerError>
    where
        S: VehicleStateSource,
        K: VehicleStateSink,
    {
        let vehicle = source.vehicle_state();
        let output = self.update(enabled, &vehicle, actuators)?;
        sink.publish_warnings(&output.warnings);
        Ok(output)
    }

    fn update_longitudinal(
        &mut self,
        tick: u64,
        enabled: bool,
        vehicle: &VehicleState,
        actuators: &Actuators,
        output: &mut TickOutput,
    ) -> Result<(), SequencerError> {
        let buses = self.config.buses;

        if is_due(tick, self.brake.period_ticks()) {
            let brake = self.brake.step(tick, enabled, actuators.brake, vehicle.speed_mps);
            if brake.saturated {
                self.stats.brake_saturations += 1;
            }
            output.warnings.brake_saturated = brake.saturated;

            if let Some(frame) = self.codec.encode_brake(&brake.fields(), buses.braking) {
                push_frame(&mut output.frames, frame)?;
            }
            if is_due(tick, self.brake.status_period_ticks()) {
                let status = brake.status_fields(enabled, vehicle.abs_active);
                if let Some(frame) = self.codec.encode_brake_status(&status, buses.powertrain) {
                    push_frame(&mut output.frames, frame)?;
                }
            }
            output.brake = Some(brake);
        }

        if is_due(tick, self.gas.period_ticks()) {
            let gas = self.gas.step(tick, enabled, actuators.gas);
            if let Some(frame) = self.codec.encode_gas(&gas.fields(), buses.camera) {
                push_frame(&mut output.frames, frame)?;
            }
            output.gas = Some(gas);
        }

        Ok(())
    }

    fn update_buttons(
        &mut self,
        tick: u64,
        enabled: bool,
        vehicle: &VehicleState,
        output: &mut TickOutput,
    ) -> Result<(), SequencerError> {
        if let Some(kind) = select_button(enabled, vehicle, self.config.enable_gas_interceptor) {
            if self.buttons.request_button(tick, kind) {
                self.stats.button_requests_accepted += 1;
            } else if !self.buttons.is_active() {
                // Repeated requests during an active session are the normal
                // case; only count the ones rejected by the throttle.
                self.stats.button_requests_dropped += 1;
            }
        }

        if let Some(emission) = self.buttons.on_bus_counter_observed(tick, vehicle.button_bus_counter) {
            self.stats.button_frames_sent += 1;
            if emission.session_complete {
                self.stats.button_sessions_completed += 1;
            }
            let frame = self
                .codec
                .encode_buttons(&emission.fields(vehicle.cruise_main_switch), self.config.buses.braking);
            push_frame(&mut output.frames, frame)?;
        }

        if self.buttons.expire(tick) {
            self.stats.button_sessions_expired += 1;
        }

        Ok(())
    }

    /// Return every controller to its power-on state. The tick keeps running.
    pub fn reset(&mut self) {
        self.steering.reset();
        self.brake.reset();
        self.gas.reset();
        self.buttons.reset();
        if let Some(radar) = self.radar.as_mut() {
            radar.reset();
        }
    }

    /// Queue a virtual button press outside the built-in cancel/resume policy.
    pub fn request_button(&mut self, kind: ButtonKind) -> bool {
        let accepted = self.buttons.request_button(self.tick, kind);
        if accepted {
            self.stats.button_requests_accepted += 1;
        } else if !self.buttons.is_active() {
            self.stats.button_requests_dropped += 1;
        }
        accepted
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn get_stats(&self) -> &SequencerStats {
        &self.stats
    }

    pub fn get_steering_state(&self) -> SteeringState {
        self.steering.get_state()
    }

    pub fn get_brake_state(&self) -> BrakeArmState {
        self.brake.get_state()
    }

    pub fn get_injector_state(&self) -> InjectorState {
        self.buttons.get_state()
    }

    pub fn clear_brake_warning(&mut self) {
        self.brake.clear_warning();
    }
}

fn push_frame(frames: &mut FrameBatch, frame: Frame) -> Result<(), SequencerError> {
    trace!(frame = %frame.to_candump(), "outbound frame");
    frames
        .push(frame)
        .map_err(|frame| SequencerError::BatchFull { id: frame.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{PQ_HCA_ID, PQ_MOB_ID};

    #[test]
    fn test_first_tick_emits_steering() {
        let mut sequencer = CommandSequencer::new(SequencerConfig::default()).unwrap();
        let output = sequencer
            .update(true, &VehicleState::default(), &Actuators::default())
            .unwrap();
        assert_eq!(output.tick, 0);
        assert_eq!(output.frames[0].id, PQ_HCA_ID);
        assert_eq!(sequencer.tick(), 1);
    }

    #[test]
    fn test_odd_tick_emits_nothing_by_default() {
        let mut sequencer = CommandSequencer::new(SequencerConfig::default()).unwrap();
        let vehicle = VehicleState::default();
        sequencer.update(true, &vehicle, &Actuators::default()).unwrap();
        let output = sequencer.update(true, &vehicle, &Actuators::default()).unwrap();
        // First counter observation is recorded but no request is pending
        assert!(output.frames.is_empty());
    }

    #[test]
    fn test_interceptor_adds_brake_frames() {
        let config = SequencerConfig {
            enable_gas_interceptor: true,
            ..SequencerConfig::default()
        };
        let mut sequencer = CommandSequencer::new(config).unwrap();
        let output = sequencer
            .update(true, &VehicleState::default(), &Actuators::default())
            .unwrap();
        let ids: std::vec::Vec<u32> = output.frames.iter().map(|frame| frame.id).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[1], PQ_MOB_ID);
    }

    #[test]
    fn test_reset_keeps_tick() {
        let mut sequencer = CommandSequencer::new(SequencerConfig::default()).unwrap();
        let actuators = Actuators { steer: 1.0, ..Actuators::default() };
        for _ in 0..10 {
            sequencer.update(true, &VehicleState::default(), &actuators).unwrap();
        }
        sequencer.reset();
        assert_eq!(sequencer.tick(), 10);
        assert_eq!(sequencer.get_steering_state(), SteeringState::default());
    }
}
