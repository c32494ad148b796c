//! Outbound frame construction for the supported protocol variants.
//!
//! The controllers never touch wire bytes. Each one fills a small field
//! struct and hands it to the [`FrameCodec`] selected for the vehicle, which
//! holds one encode function per message kind.
//!
//! Wire layouts (all multi-byte values little-endian unless noted):
//!
//! | Message          | PQ id   | MQB id  | Len | Checksum                |
//! |------------------|---------|---------|-----|-------------------------|
//! | Steering (HCA)   | `0x0D2` | `0x126` | 5/8 | XOR / CRC-8 H2F + magic |
//! | Buttons (GRA)    | `0x38A` | `0x12B` | 4/8 | XOR / CRC-8 H2F + magic |
//! | Brake (MOB)      | `0x284` | -       | 6   | XOR                     |
//! | Brake status     | `0x366` | -       | 5   | XOR                     |
//! | Gas (pedal)      | `0x200` | -       | 6   | CRC-8 pedal             |
//! | Radar VIN        | `0x4A0` | `0x4A0` | 8   | none                    |

use crate::config::VIN_LENGTH;
use serde::{Deserialize, Serialize};

pub const COUNTER_MODULUS: u8 = 16;

pub const PQ_HCA_ID: u32 = 0x0D2;
pub const PQ_GRA_ID: u32 = 0x38A;
pub const PQ_MOB_ID: u32 = 0x284;
pub const PQ_AWV_ID: u32 = 0x366;
pub const PEDAL_GAS_ID: u32 = 0x200;
pub const MQB_HCA_ID: u32 = 0x126;
pub const MQB_GRA_ID: u32 = 0x12B;
pub const RADAR_VIN_ID: u32 = 0x4A0;

const MQB_HCA_MAGIC: u8 = 0xDA;
const MQB_GRA_MAGIC: u8 = 0x6A;

const HCA_STATUS_ACTIVE: u8 = 5;
const HCA_STATUS_STANDBY: u8 = 3;
const HCA_VIBRATION_FREQ: u8 = 16;
const MOB_MAX_UNITS: u16 = 0x1FFE;
const PEDAL_COMMAND_SCALE: f32 = 1000.0;
const PEDAL_ENABLE_THRESHOLD: f32 = 0.001;

/// An outbound bus message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u32,
    pub bus: u8,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(id: u32, bus: u8, data: &[u8]) -> Self {
        Self {
            id,
            bus,
            data: data.to_vec(),
        }
    }

    /// candump-style rendering: `bus  ID#DATA`.
    pub fn to_candump(&self) -> String {
        let mut out = format!("{}  {:03X}#", self.bus, self.id);
        for byte in &self.data {
            out.push_str(&format!("{byte:02X}"));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleVariant {
    /// PQ25/PQ35/PQ46 platform
    Pq,
    /// MQB platform
    Mqb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Steering,
    Buttons,
    Brake,
    BrakeStatus,
    Gas,
}

/// Named cruise stalk buttons. Exactly one flag is set for a virtual press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonStates {
    pub cancel: bool,
    pub resume: bool,
    pub accel: bool,
    pub decel: bool,
    pub set_speed: bool,
    pub gap_adjust: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringFields {
    pub torque: i32,
    pub assist_enabled: bool,
    pub counter: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonFields {
    pub buttons: ButtonStates,
    pub main_switch: bool,
    pub counter: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrakeFields {
    pub units: u16,
    pub armed: bool,
    pub pre_armed: bool,
    pub stopping_wish: bool,
    pub counter: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrakeStatusFields {
    pub green_led: bool,
    pub orange_led: bool,
    pub braking_working: u8,
    pub counter: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasFields {
    pub gas: f32,
    pub counter: u8,
}

type SteeringEncoder = fn(&SteeringFields, u8) -> Frame;
type ButtonEncoder = fn(&ButtonFields, u8) -> Frame;
type BrakeEncoder = fn(&BrakeFields, u8) -> Frame;
type BrakeStatusEncoder = fn(&BrakeStatusFields, u8) -> Frame;
type GasEncoder = fn(&GasFields, u8) -> Frame;

/// Per-variant set of encode functions, chosen once at construction.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    variant: VehicleVariant,
    steering: SteeringEncoder,
    buttons: ButtonEncoder,
    brake: Option<BrakeEncoder>,
    brake_status: Option<BrakeStatusEncoder>,
    gas: Option<GasEncoder>,
}

impl FrameCodec {
    pub fn for_variant(variant: VehicleVariant) -> Self {
        match variant {
            VehicleVariant::Pq => Self {
                variant,
                steering: encode_pq_steering,
                buttons: encode_pq_buttons,
                brake: Some(encode_pq_brake),
                brake_status: Some(encode_pq_brake_status),
                gas: Some(encode_pedal_gas),
            },
            VehicleVariant::Mqb => Self {
                variant,
                steering: encode_mqb_steering,
                buttons: encode_mqb_buttons,
                brake: None,
                brake_status: None,
                gas: None,
            },
        }
    }

    pub fn variant(&self) -> VehicleVariant {
        self.variant
    }

    pub fn supports(&self, kind: MessageKind) -> bool {
        match kind {
            MessageKind::Steering | MessageKind::Buttons => true,
            MessageKind::Brake => self.brake.is_some(),
            MessageKind::BrakeStatus => self.brake_status.is_some(),
            MessageKind::Gas => self.gas.is_some(),
        }
    }

    pub fn encode_steering(&self, fields: &SteeringFields, bus: u8) -> Frame {
        (self.steering)(fields, bus)
    }

    pub fn encode_buttons(&self, fields: &ButtonFields, bus: u8) -> Frame {
        (self.buttons)(fields, bus)
    }

    pub fn encode_brake(&self, fields: &BrakeFields, bus: u8) -> Option<Frame> {
        self.brake.map(|encode| encode(fields, bus))
    }

    pub fn encode_brake_status(&self, fields: &BrakeStatusFields, bus: u8) -> Option<Frame> {
        self.brake_status.map(|encode| encode(fields, bus))
    }

    pub fn encode_gas(&self, fields: &GasFields, bus: u8) -> Option<Frame> {
        self.gas.map(|encode| encode(fields, bus))
    }
}

pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, byte| acc ^ byte)
}

/// CRC-8 AUTOSAR "H2F" (poly 0x2F, init 0xFF, xorout 0xFF).
pub fn crc8_h2f(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x2F } else { crc << 1 };
        }
    }
    crc ^ 0xFF
}

/// Pedal interceptor CRC-8 (poly 0xD5, init 0xFF), data processed last byte first.
pub fn crc8_pedal(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data.iter().rev() {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0xD5 } else { crc << 1 };
        }
    }
    crc
}

fn counter_nibble(counter: u8) -> u8 {
    counter % COUNTER_MODULUS
}

fn torque_magnitude(torque: i32) -> u16 {
    torque.unsigned_abs().min(0x7FFF) as u16
}

fn mqb_checksum(data: &[u8], magic: u8) -> u8 {
    let mut buf = [0u8; 8];
    let body = &data[1..];
    buf[..body.len()].copy_from_slice(body);
    buf[body.len()] = magic;
    crc8_h2f(&buf[..=body.len()])
}

fn encode_pq_steering(fields: &SteeringFields, bus: u8) -> Frame {
    let magnitude = torque_magnitude(fields.torque).to_le_bytes();
    let mut data = [0u8; 5];
    data[1] = counter_nibble(fields.counter);
    data[2] = magnitude[0];
    data[3] = magnitude[1] | if fields.torque < 0 { 0x80 } else { 0 };
    let status = if fields.assist_enabled && fields.torque != 0 {
        HCA_STATUS_ACTIVE
    } else {
        HCA_STATUS_STANDBY
    };
    data[4] = status | (HCA_VIBRATION_FREQ << 3);
    data[0] = xor_checksum(&data[1..5]);
    Frame::new(PQ_HCA_ID, bus, &data)
}

fn encode_mqb_steering(fields: &SteeringFields, bus: u8) -> Frame {
    let magnitude = torque_magnitude(fields.torque).min(0x01FF).to_le_bytes();
    let mut data = [0u8; 8];
    data[1] = counter_nibble(fields.counter);
    data[2] = magnitude[0];
    data[3] = (magnitude[1] & 0x01)
        | if fields.assist_enabled { 0x40 } else { 0 }
        | if fields.torque < 0 { 0x80 } else { 0 };
    data[4] = if fields.assist_enabled { HCA_STATUS_ACTIVE } else { HCA_STATUS_STANDBY };
    data[0] = mqb_checksum(&data, MQB_HCA_MAGIC);
    Frame::new(MQB_HCA_ID, bus, &data)
}

fn pq_button_bits(buttons: &ButtonStates) -> u8 {
    u8::from(buttons.cancel)
        | u8::from(buttons.accel) << 1
        | u8::from(buttons.decel) << 2
        | u8::from(buttons.resume) << 3
        | u8::from(buttons.set_speed) << 4
        | u8::from(buttons.gap_adjust) << 5
}

fn encode_pq_buttons(fields: &ButtonFields, bus: u8) -> Frame {
    let mut data = [0u8; 4];
    data[1] = counter_nibble(fields.counter) | u8::from(fields.main_switch) << 4;
    data[2] = pq_button_bits(&fields.buttons);
    data[0] = xor_checksum(&data[1..4]);
    Frame::new(PQ_GRA_ID, bus, &data)
}

fn encode_mqb_buttons(fields: &ButtonFields, bus: u8) -> Frame {
    let buttons = &fields.buttons;
    let mut data = [0u8; 8];
    data[1] = counter_nibble(fields.counter);
    data[2] = u8::from(fields.main_switch) | u8::from(buttons.cancel) << 1;
    data[3] = u8::from(buttons.accel)
        | u8::from(buttons.decel) << 1
        | u8::from(buttons.resume) << 2
        | u8::from(buttons.set_speed) << 3
        | u8::from(buttons.gap_adjust) << 4;
    data[0] = mqb_checksum(&data, MQB_GRA_MAGIC);
    Frame::new(MQB_GRA_ID, bus, &data)
}

fn encode_pq_brake(fields: &BrakeFields, bus: u8) -> Frame {
    let units = fields.units.min(MOB_MAX_UNITS).to_le_bytes();
    let mut data = [0u8; 6];
    data[1] = counter_nibble(fields.counter)
        | u8::from(fields.armed) << 4
        | u8::from(fields.pre_armed) << 5
        | u8::from(fields.stopping_wish) << 6;
    data[2] = units[0];
    data[3] = units[1];
    data[0] = xor_checksum(&data[1..6]);
    Frame::new(PQ_MOB_ID, bus, &data)
}

fn encode_pq_brake_status(fields: &BrakeStatusFields, bus: u8) -> Frame {
    let mut data = [0u8; 5];
    data[1] = counter_nibble(fields.counter);
    data[2] = u8::from(fields.green_led) | u8::from(fields.orange_led) << 1;
    data[3] = fields.braking_working;
    data[0] = xor_checksum(&data[1..5]);
    Frame::new(PQ_AWV_ID, bus, &data)
}

fn encode_pedal_gas(fields: &GasFields, bus: u8) -> Frame {
    let gas = fields.gas.clamp(0.0, 1.0);
    let enable = gas > PEDAL_ENABLE_THRESHOLD;
    let command = if enable {
        (gas * PEDAL_COMMAND_SCALE).round() as u16
    } else {
        0
    };

    // GAS_COMMAND and GAS_COMMAND2 are big-endian on the pedal bus
    let mut data = [0u8; 6];
    data[0..2].copy_from_slice(&command.to_be_bytes());
    data[2..4].copy_from_slice(&command.to_be_bytes());
    data[4] = counter_nibble(fields.counter) | if enable { 0x80 } else { 0 };
    data[5] = crc8_pedal(&data[..5]);
    Frame::new(PEDAL_GAS_ID, bus, &data)
}

/// One of the three rotating segments of the radar VIN message.
pub fn encode_radar_vin(segment: u8, vin: &[u8; VIN_LENGTH], position: u8, epas_type: u8, bus: u8) -> Frame {
    let mut data = [0u8; 8];
    data[0] = segment;
    match segment {
        0 => data[1..8].copy_from_slice(&vin[0..7]),
        1 => data[1..8].copy_from_slice(&vin[7..14]),
        _ => {
            data[1..4].copy_from_slice(&vin[14..17]);
            data[4] = position;
            data[5] = epas_type;
        }
    }
    Frame::new(RADAR_VIN_ID, bus, &data)
}
