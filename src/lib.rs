//! # Drive-by-wire Command Bus
//!
//! Actuation-command layer for VW PQ/MQB vehicles: turns a planner's steering,
//! brake and gas requests into periodic bus frames that the vehicle's
//! steering rack, brake booster and adaptive cruise module accept without
//! latching a fault.
//!
//! ## Features
//!
//! - **Steering (HCA)**: torque rate limiting with driver override, static
//!   torque nudging and a forced one-frame disable before the rack's
//!   continuous-assist limit
//! - **Brake arming**: two-tick pre-arm/arm handshake before any brake torque
//! - **Virtual cruise buttons**: presses locked to the vehicle's own rolling
//!   counter so the ACC module accepts them
//! - **Pedal interceptor**: gas command and brake status channels
//! - **Radar VIN broadcast** for aftermarket radar units
//!
//! ## Quick Start
//!
//! ```rust
//! use dbwbus::{Actuators, CommandSequencer, SequencerConfig, VehicleState};
//!
//! let mut sequencer = CommandSequencer::new(SequencerConfig::default()).unwrap();
//!
//! let vehicle = VehicleState { speed_mps: 20.0, ..VehicleState::default() };
//! let actuators = Actuators { steer: 0.5, ..Actuators::default() };
//!
//! let output = sequencer.update(true, &vehicle, &actuators).unwrap();
//! for frame in &output.frames {
//!     println!("{}", frame.to_candump());
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`sequencer`] - Tick driver and public API
//! - [`controllers`] - Per-channel state machines
//! - [`limits`] - Steering torque rate limiter
//! - [`codec`] - Per-variant frame encoders
//! - [`config`] - Calibration constants and JSON configuration
//! - [`vehicle`] - Vehicle inputs, planner requests and warnings

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod codec;
pub mod config;
pub mod controllers;
pub mod limits;
pub mod sequencer;
pub mod vehicle;

// Re-export main public types for convenience
pub use codec::{Frame, FrameCodec, VehicleVariant};
pub use config::{ConfigError, SequencerConfig};
pub use controllers::{ButtonKind, Controller};
pub use sequencer::{CommandSequencer, SequencerError, SequencerStats, TickOutput};
pub use vehicle::{Actuators, ControlWarnings, VehicleState, VehicleStateSink, VehicleStateSource};
