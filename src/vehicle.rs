use serde::{Deserialize, Serialize};

/// Decoded vehicle inputs for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub speed_mps: f32,
    pub standstill: bool,
    pub steering_fault: bool,
    /// Driver input torque, signed, in actuator units
    pub driver_torque: i32,
    pub abs_active: bool,
    pub cruise_enabled: bool,
    pub cruise_main_switch: bool,
    /// Rolling counter of the vehicle's own cruise switch message (0..=15)
    pub button_bus_counter: u8,
}

/// Planner request for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Actuators {
    /// Steering torque as a fraction of the ceiling, -1.0..=1.0
    pub steer: f32,
    pub brake: f32,
    pub gas: f32,
}

/// Non-fatal conditions raised during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlWarnings {
    pub steer_rate_limited: bool,
    pub brake_saturated: bool,
}

impl ControlWarnings {
    pub fn any(&self) -> bool {
        self.steer_rate_limited || self.brake_saturated
    }
}

pub trait VehicleStateSource {
    fn vehicle_state(&mut self) -> VehicleState;
}

pub trait VehicleStateSink {
    fn publish_warnings(&mut self, warnings: &ControlWarnings);
}
