use dbwbus::codec::PQ_GRA_ID;
use dbwbus::config::ButtonParams;
use dbwbus::controllers::{AccButtonInjector, ButtonEmission, ButtonKind, Controller};
use dbwbus::{Actuators, CommandSequencer, SequencerConfig, VehicleState};

// Past the initial throttle window
const FIRST_REQUEST_TICK: u64 = 150;

fn injector() -> AccButtonInjector {
    AccButtonInjector::new(&ButtonParams::default())
}

/// Vehicle with stock cruise engaged and its switch counter advancing every
/// third tick, as the car's ~33 Hz message does against a 100 Hz sequencer.
fn cruising_at(tick: u64) -> VehicleState {
    VehicleState {
        speed_mps: 25.0,
        cruise_enabled: true,
        cruise_main_switch: true,
        button_bus_counter: ((tick / 3) % 16) as u8,
        ..VehicleState::default()
    }
}

#[cfg(test)]
mod counter_sync_tests {
    use super::*;

    #[test]
    fn test_emitted_counter_follows_observed_counter() {
        let mut injector = injector();
        assert!(injector.on_bus_counter_observed(FIRST_REQUEST_TICK, 5).is_none());
        assert!(injector.request_button(FIRST_REQUEST_TICK + 1, ButtonKind::Cancel));

        let counters: Vec<u8> = (6u8..9)
            .enumerate()
            .filter_map(|(i, counter)| injector.on_bus_counter_observed(FIRST_REQUEST_TICK + 2 + i as u64, counter))
            .map(|emission| emission.counter)
            .collect();
        assert_eq!(counters, vec![7, 8, 9]);
    }

    #[test]
    fn test_sixteen_frames_then_silence() {
        let mut injector = injector();
        assert!(injector.request_button(FIRST_REQUEST_TICK, ButtonKind::Cancel));

        let emissions: Vec<ButtonEmission> = (0..16u64)
            .filter_map(|i| injector.on_bus_counter_observed(FIRST_REQUEST_TICK + i, (i % 16) as u8))
            .collect();
        assert_eq!(emissions.len(), 16);
        assert!(emissions.iter().all(|e| e.request.buttons.cancel));
        assert!(emissions[..15].iter().all(|e| !e.session_complete));
        assert!(emissions[15].session_complete);
        assert_eq!(emissions[15].frame_number, 16);
        for (i, emission) in emissions.iter().enumerate() {
            assert_eq!(u64::from(emission.counter), (i as u64 + 1) % 16);
        }

        // 17th distinct counter value: the session is over
        assert!(injector.on_bus_counter_observed(FIRST_REQUEST_TICK + 16, 0).is_none());
        assert!(!injector.is_active());
    }

    #[test]
    fn test_counter_wraps_through_zero() {
        let mut injector = injector();
        injector.on_bus_counter_observed(FIRST_REQUEST_TICK, 13);
        injector.request_button(FIRST_REQUEST_TICK, ButtonKind::Resume);

        let counters: Vec<u8> = [14u8, 15, 0, 1]
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| injector.on_bus_counter_observed(FIRST_REQUEST_TICK + 1 + i as u64, c))
            .map(|e| e.counter)
            .collect();
        assert_eq!(counters, vec![15, 0, 1, 2]);
    }

    #[test]
    fn test_repeated_counter_emits_once() {
        let mut injector = injector();
        injector.request_button(FIRST_REQUEST_TICK, ButtonKind::Cancel);
        let emitted = [3u8, 3, 3, 4, 4]
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| injector.on_bus_counter_observed(FIRST_REQUEST_TICK + i as u64, c))
            .count();
        assert_eq!(emitted, 2);
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[test]
    fn test_second_request_dropped_while_session_active() {
        let mut injector = injector();
        assert!(injector.request_button(FIRST_REQUEST_TICK, ButtonKind::Cancel));
        injector.on_bus_counter_observed(FIRST_REQUEST_TICK, 1);

        assert!(!injector.request_button(FIRST_REQUEST_TICK + 1, ButtonKind::Resume));
        let emission = injector.on_bus_counter_observed(FIRST_REQUEST_TICK + 2, 2).unwrap();
        assert_eq!(emission.request.kind, ButtonKind::Cancel);
    }

    #[test]
    fn test_throttle_measured_from_first_frame() {
        let mut injector = injector();
        injector.request_button(FIRST_REQUEST_TICK, ButtonKind::Cancel);
        for i in 0..16u64 {
            injector.on_bus_counter_observed(FIRST_REQUEST_TICK + 5 + i, (i % 16) as u8);
        }
        assert!(!injector.is_active());

        let started = FIRST_REQUEST_TICK + 5;
        assert!(!injector.request_button(started + 100, ButtonKind::Cancel));
        assert!(injector.request_button(started + 101, ButtonKind::Cancel));
    }

    #[test]
    fn test_stalled_session_expires() {
        let mut injector = injector();
        injector.request_button(FIRST_REQUEST_TICK, ButtonKind::Cancel);
        injector.on_bus_counter_observed(FIRST_REQUEST_TICK, 7);

        // Counter stops changing
        for tick in FIRST_REQUEST_TICK + 1..=FIRST_REQUEST_TICK + 10 {
            assert!(injector.on_bus_counter_observed(tick, 7).is_none());
            assert!(!injector.expire(tick));
        }
        assert!(injector.expire(FIRST_REQUEST_TICK + 11));
        assert!(injector.get_state().session.is_none());
        assert!(injector.on_bus_counter_observed(FIRST_REQUEST_TICK + 12, 8).is_none());
    }
}

#[cfg(test)]
mod sequencer_button_tests {
    use super::*;

    #[test]
    fn test_disengaged_cancels_stock_cruise() {
        let mut sequencer = CommandSequencer::new(SequencerConfig::default()).unwrap();

        let mut button_frames = Vec::new();
        for tick in 0..150u64 {
            let vehicle = cruising_at(tick);
            let output = sequencer.update(false, &vehicle, &Actuators::default()).unwrap();
            for frame in output.frames.iter().filter(|f| f.id == PQ_GRA_ID) {
                button_frames.push((tick, frame.clone()));
            }
        }

        assert_eq!(button_frames.len(), 16);
        // Accepted at tick 101, first counter change after that is at tick 102
        assert_eq!(button_frames[0].0, 102);
        for (tick, frame) in &button_frames {
            assert_eq!(tick % 3, 0, "frame at {tick} not on a counter change");
            let observed = ((tick / 3) % 16) as u8;
            assert_eq!(frame.data[1] & 0x0F, (observed + 1) % 16);
            // main switch on, cancel pressed
            assert_eq!(frame.data[1] & 0x10, 0x10);
            assert_eq!(frame.data[2], 0x01);
        }

        let stats = sequencer.get_stats();
        assert_eq!(stats.button_requests_accepted, 1);
        assert_eq!(stats.button_sessions_completed, 1);
        assert_eq!(stats.button_frames_sent, 16);
        // Throttled before tick 101, and again after the session ends
        assert_eq!(stats.button_requests_dropped, 103);
    }

    #[test]
    fn test_manual_request_counts_only_throttled_drops() {
        let mut sequencer = CommandSequencer::new(SequencerConfig::default()).unwrap();

        // Fresh sequencer at tick 0 is inside the throttle window
        assert!(!sequencer.request_button(ButtonKind::Cancel));
        assert_eq!(sequencer.get_stats().button_requests_dropped, 1);

        let vehicle = VehicleState::default();
        while sequencer.tick() < FIRST_REQUEST_TICK {
            sequencer.update(true, &vehicle, &Actuators::default()).unwrap();
        }

        assert!(sequencer.request_button(ButtonKind::Resume));
        assert!(!sequencer.request_button(ButtonKind::Cancel));
        let stats = sequencer.get_stats();
        assert_eq!(stats.button_requests_accepted, 1);
        assert_eq!(stats.button_requests_dropped, 1);
    }

    #[test]
    fn test_button_frame_last_in_batch() {
        let config = SequencerConfig {
            enable_gas_interceptor: true,
            ..SequencerConfig::default()
        };
        let mut sequencer = CommandSequencer::new(config).unwrap();

        for tick in 0..=102u64 {
            let output = sequencer.update(false, &cruising_at(tick), &Actuators::default()).unwrap();
            if tick == 102 {
                assert!(output.frames.len() > 1);
                assert_eq!(output.frames.last().map(|f| f.id), Some(PQ_GRA_ID));
            }
        }
    }

    #[test]
    fn test_resume_at_standstill() {
        let mut sequencer = CommandSequencer::new(SequencerConfig::default()).unwrap();
        let mut resumed = false;
        for tick in 0..120u64 {
            let vehicle = VehicleState {
                standstill: true,
                speed_mps: 0.0,
                ..cruising_at(tick)
            };
            sequencer.update(true, &vehicle, &Actuators::default()).unwrap();
            if let Some(session) = sequencer.get_injector_state().session {
                assert_eq!(session.request.kind, ButtonKind::Resume);
                resumed = true;
            }
        }
        assert!(resumed);
    }
}
