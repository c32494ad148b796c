use dbwbus::codec::{MQB_HCA_ID, PEDAL_GAS_ID, PQ_AWV_ID, PQ_HCA_ID, PQ_MOB_ID, RADAR_VIN_ID};
use dbwbus::config::RadarConfig;
use dbwbus::{
    Actuators, CommandSequencer, ConfigError, ControlWarnings, SequencerConfig, VehicleState,
    VehicleStateSink, VehicleStateSource, VehicleVariant,
};

struct ScriptedVehicle {
    ticks: u64,
}

impl VehicleStateSource for ScriptedVehicle {
    fn vehicle_state(&mut self) -> VehicleState {
        self.ticks += 1;
        VehicleState {
            speed_mps: 15.0,
            ..VehicleState::default()
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    warnings: Vec<ControlWarnings>,
}

impl VehicleStateSink for RecordingSink {
    fn publish_warnings(&mut self, warnings: &ControlWarnings) {
        self.warnings.push(*warnings);
    }
}

fn radar_config() -> SequencerConfig {
    SequencerConfig {
        enable_gas_interceptor: true,
        radar: Some(RadarConfig {
            vin: "WVWZZZ3CZ9E123456".to_string(),
            position: 0,
            epas_type: 1,
        }),
        ..SequencerConfig::default()
    }
}

#[cfg(test)]
mod scheduling_tests {
    use super::*;

    #[test]
    fn test_frame_order_within_batch() {
        let mut sequencer = CommandSequencer::new(radar_config()).unwrap();
        let output = sequencer
            .update(true, &VehicleState::default(), &Actuators::default())
            .unwrap();

        let ids: Vec<u32> = output.frames.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![PQ_HCA_ID, PQ_MOB_ID, PQ_AWV_ID, PEDAL_GAS_ID, RADAR_VIN_ID]);

        let radar = &output.frames[4];
        assert_eq!(radar.bus, 2);
        assert_eq!(radar.data[0], 0);
        assert_eq!(&radar.data[1..8], b"WVWZZZ3");
    }

    #[test]
    fn test_channel_periods() {
        let mut sequencer = CommandSequencer::new(radar_config()).unwrap();
        let mut steering = 0;
        let mut radar = 0;
        for _ in 0..1000 {
            let output = sequencer
                .update(true, &VehicleState::default(), &Actuators::default())
                .unwrap();
            steering += output.frames.iter().filter(|f| f.id == PQ_HCA_ID).count();
            radar += output.frames.iter().filter(|f| f.id == RADAR_VIN_ID).count();
        }
        assert_eq!(steering, 500);
        assert_eq!(radar, 10);
        assert_eq!(sequencer.tick(), 1000);
        assert_eq!(sequencer.get_stats().ticks, 1000);
    }

    #[test]
    fn test_steering_counter_advances_per_frame() {
        let mut sequencer = CommandSequencer::new(SequencerConfig::default()).unwrap();
        let counters: Vec<u8> = (0..40)
            .filter_map(|_| {
                sequencer
                    .update(true, &VehicleState::default(), &Actuators::default())
                    .unwrap()
                    .steering
            })
            .map(|s| s.counter)
            .collect();
        let expected: Vec<u8> = (0..20).map(|i| (i % 16) as u8).collect();
        assert_eq!(counters, expected);
    }

    #[test]
    fn test_mqb_steering_frames() {
        let config = SequencerConfig {
            variant: VehicleVariant::Mqb,
            ..SequencerConfig::default()
        };
        let mut sequencer = CommandSequencer::new(config).unwrap();
        let output = sequencer
            .update(true, &VehicleState::default(), &Actuators { steer: 0.5, ..Actuators::default() })
            .unwrap();
        assert_eq!(output.frames[0].id, MQB_HCA_ID);
        assert_eq!(output.frames[0].data.len(), 8);
    }

    #[test]
    fn test_warnings_reach_sink() {
        let mut sequencer = CommandSequencer::new(SequencerConfig::default()).unwrap();
        let mut vehicle = ScriptedVehicle { ticks: 0 };
        let mut sink = RecordingSink::default();
        let actuators = Actuators { steer: 1.0, ..Actuators::default() };

        for _ in 0..4 {
            sequencer
                .update_from(&mut vehicle, &mut sink, true, &actuators)
                .unwrap();
        }

        assert_eq!(vehicle.ticks, 4);
        assert_eq!(sink.warnings.len(), 4);
        // Ramp-limited on steering ticks only
        assert!(sink.warnings[0].steer_rate_limited);
        assert!(!sink.warnings[1].any());
        assert!(sink.warnings[2].steer_rate_limited);
    }

    #[test]
    fn test_reset_returns_to_power_on_state() {
        let mut sequencer = CommandSequencer::new(radar_config()).unwrap();
        let actuators = Actuators { steer: 1.0, brake: 0.5, gas: 0.0 };
        for _ in 0..20 {
            sequencer.update(true, &VehicleState::default(), &actuators).unwrap();
        }
        assert!(sequencer.get_brake_state().armed);

        sequencer.reset();
        assert!(!sequencer.get_brake_state().armed);
        assert_eq!(sequencer.get_steering_state().last_applied_torque, 0);

        let output = sequencer.update(true, &VehicleState::default(), &actuators).unwrap();
        assert_eq!(output.steering.map(|s| s.applied_torque), Some(4));
    }
}

#[cfg(test)]
mod configuration_tests {
    use super::*;

    #[test]
    fn test_interceptor_requires_brake_encoders() {
        let config = SequencerConfig {
            variant: VehicleVariant::Mqb,
            enable_gas_interceptor: true,
            ..SequencerConfig::default()
        };
        assert!(matches!(
            CommandSequencer::new(config),
            Err(ConfigError::MissingEncoder { .. })
        ));
    }

    #[test]
    fn test_invalid_vin_rejected() {
        let config = SequencerConfig {
            radar: Some(RadarConfig {
                vin: "TOO-SHORT".to_string(),
                position: 0,
                epas_type: 0,
            }),
            ..SequencerConfig::default()
        };
        assert!(matches!(CommandSequencer::new(config), Err(ConfigError::InvalidVin(_))));
    }

    #[test]
    fn test_json_config_drives_sequencer() {
        let json = r#"{
            "variant": "Pq",
            "enable_gas_interceptor": true,
            "steering": { "steer_max": 250 },
            "buses": { "braking": 2 }
        }"#;
        let config = SequencerConfig::from_json_str(json).unwrap();
        assert_eq!(config.steering.delta_up, 4);

        let mut sequencer = CommandSequencer::new(config).unwrap();
        let actuators = Actuators { steer: 1.0, ..Actuators::default() };
        let mut last = 0;
        for _ in 0..200 {
            let output = sequencer.update(true, &VehicleState::default(), &actuators).unwrap();
            if let Some(steering) = output.steering {
                last = steering.applied_torque;
            }
            if let Some(mob) = output.frames.iter().find(|f| f.id == PQ_MOB_ID) {
                assert_eq!(mob.bus, 2);
            }
        }
        assert_eq!(last, 250);
    }

    #[test]
    fn test_zero_period_rejected() {
        let json = r#"{ "steering": { "period_ticks": 0 } }"#;
        assert!(matches!(
            SequencerConfig::from_json_str(json),
            Err(ConfigError::ZeroValue(_))
        ));
    }
}
