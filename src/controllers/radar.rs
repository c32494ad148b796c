use super::Controller;
use crate::codec::{encode_radar_vin, Frame};
use crate::config::{ConfigError, RadarConfig, RADAR_VIN_STEP, VIN_LENGTH};
use arrayvec::ArrayString;

const VIN_SEGMENTS: u8 = 3;

/// Broadcasts the vehicle VIN to an aftermarket radar, one segment per
/// broadcast period, rotating through the three segments.
#[derive(Debug)]
pub struct RadarVinBroadcaster {
    vin: ArrayString<VIN_LENGTH>,
    position: u8,
    epas_type: u8,
    bus: u8,
    segment: u8,
}

impl RadarVinBroadcaster {
    pub fn new(config: &RadarConfig, bus: u8) -> Result<Self, ConfigError> {
        if config.vin.len() != VIN_LENGTH || !config.vin.is_ascii() {
            return Err(ConfigError::InvalidVin(config.vin.clone()));
        }
        let vin = ArrayString::from(&config.vin).map_err(|_| ConfigError::InvalidVin(config.vin.clone()))?;

        Ok(Self {
            vin,
            position: config.position,
            epas_type: config.epas_type,
            bus,
            segment: 0,
        })
    }

    pub fn step(&mut self, tick: u64) -> Option<Frame> {
        if tick % RADAR_VIN_STEP != 0 {
            return None;
        }

        let mut vin = [0u8; VIN_LENGTH];
        vin.copy_from_slice(self.vin.as_bytes());
        let frame = encode_radar_vin(self.segment, &vin, self.position, self.epas_type, self.bus);
        self.segment = (self.segment + 1) % VIN_SEGMENTS;
        Some(frame)
    }
}

impl Controller for RadarVinBroadcaster {
    type State = u8;

    fn get_state(&self) -> Self::State {
        self.segment
    }

    fn reset(&mut self) {
        self.segment = 0;
    }
}
