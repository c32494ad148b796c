use crate::codec::{FrameCodec, MessageKind, VehicleVariant};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

// Sequencer tick: 100 Hz
pub const TICK_PERIOD_MS: u32 = 10;

// HCA steering message at 50 Hz. Observed rack limits: 3.00 Nm max torque.
pub const HCA_STEP: u32 = 2;
pub const STEER_MAX: i32 = 300;           // 3.00 Nm
pub const STEER_DELTA_UP: i32 = 4;        // full torque reached in 1.50 s
pub const STEER_DELTA_DOWN: i32 = 10;     // back to zero in 0.60 s
pub const STEER_DRIVER_ALLOWANCE: i32 = 80;
pub const STEER_DRIVER_MULTIPLIER: i32 = 3;
pub const STEER_DRIVER_FACTOR: i32 = 1;
pub const HCA_MAX_STATIC_TORQUE_MS: u32 = 1_900;
pub const HCA_MAX_ENABLED_MS: u32 = 118_000;

// Secondary brake request (MOB) and its cluster status message (AWV)
pub const MOB_STEP: u32 = 2;
pub const AWV_STEP: u32 = 2;
pub const BRAKE_SCALE: f32 = 1200.0;
pub const BRAKE_MIN_REQUEST: f32 = 40.0;
pub const BRAKE_MAX_UNITS: u16 = 1200;
pub const BRAKE_STOPPING_SPEED_MPS: f32 = 5.6;

// Pedal interceptor gas command
pub const GAS_STEP: u32 = 2;

// Virtual button presses on the cruise switch message (car sends at ~33 Hz)
pub const GRA_VBP_STEP: u64 = 100;
pub const GRA_VBP_COUNT: u8 = 16;
pub const GRA_SESSION_TIMEOUT_TICKS: u64 = 10;

// Radar VIN broadcast
pub const RADAR_VIN_STEP: u64 = 100;
pub const VIN_LENGTH: usize = 17;

const_assert!(HCA_STEP > 0 && MOB_STEP > 0 && GAS_STEP > 0);
const_assert!(STEER_DELTA_UP <= STEER_MAX);
const_assert!(GRA_VBP_COUNT as u64 <= GRA_VBP_STEP);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
    #[error("{0} overflows")]
    Overflow(&'static str),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("{variant:?} has no encoder for {kind:?} messages")]
    MissingEncoder {
        variant: VehicleVariant,
        kind: MessageKind,
    },
    #[error("radar VIN must be 17 ASCII characters, got {0:?}")]
    InvalidVin(String),
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringParams {
    pub period_ticks: u32,
    pub steer_max: i32,
    pub delta_up: i32,
    pub delta_down: i32,
    pub driver_allowance: i32,
    pub driver_multiplier: i32,
    pub driver_factor: i32,
    pub max_static_torque_ms: u32,
    pub max_enabled_ms: u32,
}

impl Default for SteeringParams {
    fn default() -> Self {
        Self {
            period_ticks: HCA_STEP,
            steer_max: STEER_MAX,
            delta_up: STEER_DELTA_UP,
            delta_down: STEER_DELTA_DOWN,
            driver_allowance: STEER_DRIVER_ALLOWANCE,
            driver_multiplier: STEER_DRIVER_MULTIPLIER,
            driver_factor: STEER_DRIVER_FACTOR,
            max_static_torque_ms: HCA_MAX_STATIC_TORQUE_MS,
            max_enabled_ms: HCA_MAX_ENABLED_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrakeParams {
    pub period_ticks: u32,
    pub status_period_ticks: u32,
    /// Raw request fraction to brake units. Calibration value; the unit
    /// conversion has not been confirmed against the actuator.
    pub scale: f32,
    pub min_request: f32,
    pub max_units: u16,
    pub stopping_speed_mps: f32,
}

impl Default for BrakeParams {
    fn default() -> Self {
        Self {
            period_ticks: MOB_STEP,
            status_period_ticks: AWV_STEP,
            scale: BRAKE_SCALE,
            min_request: BRAKE_MIN_REQUEST,
            max_units: BRAKE_MAX_UNITS,
            stopping_speed_mps: BRAKE_STOPPING_SPEED_MPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonParams {
    pub throttle_ticks: u64,
    pub frames_per_session: u8,
    pub session_timeout_ticks: u64,
}

impl Default for ButtonParams {
    fn default() -> Self {
        Self {
            throttle_ticks: GRA_VBP_STEP,
            frames_per_session: GRA_VBP_COUNT,
            session_timeout_ticks: GRA_SESSION_TIMEOUT_TICKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasParams {
    pub period_ticks: u32,
}

impl Default for GasParams {
    fn default() -> Self {
        Self { period_ticks: GAS_STEP }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusLayout {
    pub powertrain: u8,
    pub braking: u8,
    pub camera: u8,
    pub radar: u8,
}

impl Default for BusLayout {
    fn default() -> Self {
        Self {
            powertrain: 1,
            braking: 1,
            camera: 1,
            radar: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarConfig {
    pub vin: String,
    #[serde(default)]
    pub position: u8,
    #[serde(default)]
    pub epas_type: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub variant: VehicleVariant,
    pub tick_period_ms: u32,
    /// Enables the brake, brake status and gas channels.
    pub enable_gas_interceptor: bool,
    pub steering: SteeringParams,
    pub brake: BrakeParams,
    pub buttons: ButtonParams,
    pub gas: GasParams,
    pub buses: BusLayout,
    pub radar: Option<RadarConfig>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            variant: VehicleVariant::Pq,
            tick_period_ms: TICK_PERIOD_MS,
            enable_gas_interceptor: false,
            steering: SteeringParams::default(),
            brake: BrakeParams::default(),
            buttons: ButtonParams::default(),
            gas: GasParams::default(),
            buses: BusLayout::default(),
            radar: None,
        }
    }
}

impl SequencerConfig {
    pub fn from_json_str(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ZeroValue("tick_period_ms"));
        }
        if self.steering.period_ticks == 0 {
            return Err(ConfigError::ZeroValue("steering.period_ticks"));
        }
        if self.steering.steer_max <= 0 {
            return Err(ConfigError::NonPositive("steering.steer_max"));
        }
        if self.steering.delta_up <= 0 {
            return Err(ConfigError::NonPositive("steering.delta_up"));
        }
        if self.steering.delta_down <= 0 {
            return Err(ConfigError::NonPositive("steering.delta_down"));
        }
        if self.steering.driver_allowance < 0 {
            return Err(ConfigError::NonPositive("steering.driver_allowance"));
        }
        if self.tick_period_ms.checked_mul(self.steering.period_ticks).is_none() {
            return Err(ConfigError::Overflow("tick_period_ms * steering.period_ticks"));
        }
        if self.static_torque_limit() == 0 {
            return Err(ConfigError::ZeroValue("steering.max_static_torque_ms"));
        }
        if self.enabled_run_limit() == 0 {
            return Err(ConfigError::ZeroValue("steering.max_enabled_ms"));
        }
        if self.buttons.frames_per_session == 0 {
            return Err(ConfigError::ZeroValue("buttons.frames_per_session"));
        }

        if self.enable_gas_interceptor {
            if self.brake.period_ticks == 0 {
                return Err(ConfigError::ZeroValue("brake.period_ticks"));
            }
            if self.brake.status_period_ticks == 0 {
                return Err(ConfigError::ZeroValue("brake.status_period_ticks"));
            }
            if self.gas.period_ticks == 0 {
                return Err(ConfigError::ZeroValue("gas.period_ticks"));
            }
            if self.brake.max_units == 0 {
                return Err(ConfigError::ZeroValue("brake.max_units"));
            }
            if self.brake.scale.is_nan() || self.brake.scale <= 0.0 {
                return Err(ConfigError::NonPositive("brake.scale"));
            }

            let codec = FrameCodec::for_variant(self.variant);
            for kind in [MessageKind::Brake, MessageKind::BrakeStatus, MessageKind::Gas] {
                if !codec.supports(kind) {
                    return Err(ConfigError::MissingEncoder {
                        variant: self.variant,
                        kind,
                    });
                }
            }
        }

        if let Some(radar) = &self.radar {
            if radar.vin.len() != VIN_LENGTH || !radar.vin.is_ascii() {
                return Err(ConfigError::InvalidVin(radar.vin.clone()));
            }
        }

        Ok(())
    }

    /// Steering invocations with identical torque tolerated before a nudge.
    pub fn static_torque_limit(&self) -> u32 {
        self.steering.max_static_torque_ms / self.steering_invocation_ms()
    }

    /// Steering invocations with continuous assist before a forced one-frame disable.
    pub fn enabled_run_limit(&self) -> u32 {
        self.steering.max_enabled_ms / self.steering_invocation_ms()
    }

    fn steering_invocation_ms(&self) -> u32 {
        self.tick_period_ms
            .saturating_mul(self.steering.period_ticks)
            .max(1)
    }
}
