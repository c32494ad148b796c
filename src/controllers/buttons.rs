//! Virtual cruise-control button presses.
//!
//! The vehicle's own switch message carries a 4-bit counter which the ACC
//! module uses to discard duplicates. A virtual press is only ever sent right
//! after a new vehicle counter value is observed, carrying the *next* counter
//! value, so the ACC module accepts it and drops the vehicle's following
//! frame as a duplicate:
//!
//! ```text
//! car:     0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F  0  1  2  3
//! virtual:       3  4  5  6  7  8  9  A  B  C  D  E  F  0  1  2  gap
//! ```
//!
//! When the session ends the gap to the next valid vehicle frame is shorter
//! than one native period, which the ACC module tolerates.

use super::Controller;
use crate::codec::{ButtonFields, ButtonStates, COUNTER_MODULUS};
use crate::config::ButtonParams;
use crate::vehicle::VehicleState;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonKind {
    Cancel,
    Resume,
    Accel,
    Decel,
    SetSpeed,
    GapAdjust,
}

/// A single virtual press: exactly one button flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonRequest {
    pub kind: ButtonKind,
    pub buttons: ButtonStates,
}

impl ButtonRequest {
    pub fn new(kind: ButtonKind) -> Self {
        let mut buttons = ButtonStates::default();
        match kind {
            ButtonKind::Cancel => buttons.cancel = true,
            ButtonKind::Resume => buttons.resume = true,
            ButtonKind::Accel => buttons.accel = true,
            ButtonKind::Decel => buttons.decel = true,
            ButtonKind::SetSpeed => buttons.set_speed = true,
            ButtonKind::GapAdjust => buttons.gap_adjust = true,
        }
        Self { kind, buttons }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionSession {
    pub request: ButtonRequest,
    pub frames_sent: u8,
    /// Tick of the first emitted frame, `None` until then
    pub start_tick: Option<u64>,
    pub last_activity_tick: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectorState {
    pub session: Option<InjectionSession>,
    pub last_seen_bus_counter: Option<u8>,
    pub last_session_start: u64,
}

/// One virtual frame to send, locked to the observed vehicle counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEmission {
    pub request: ButtonRequest,
    pub counter: u8,
    pub frame_number: u8,
    pub session_complete: bool,
}

impl ButtonEmission {
    pub fn fields(&self, main_switch: bool) -> ButtonFields {
        ButtonFields {
            buttons: self.request.buttons,
            main_switch,
            counter: self.counter,
        }
    }
}

/// Which button, if any, keeps stock cruise control in step with the system.
pub fn select_button(enabled: bool, vehicle: &VehicleState, gas_interceptor: bool) -> Option<ButtonKind> {
    if !enabled && vehicle.cruise_enabled {
        Some(ButtonKind::Cancel)
    } else if enabled && vehicle.standstill {
        Some(ButtonKind::Resume)
    } else if enabled && vehicle.cruise_enabled && gas_interceptor {
        // Longitudinal control goes through the pedal interceptor
        Some(ButtonKind::Cancel)
    } else {
        None
    }
}

#[derive(Debug)]
pub struct AccButtonInjector {
    state: InjectorState,
    params: ButtonParams,
}

impl AccButtonInjector {
    pub fn new(params: &ButtonParams) -> Self {
        Self {
            state: InjectorState::default(),
            params: params.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.session.is_some()
    }

    /// Queue a virtual press. Returns `false` if a session is already active
    /// or the previous session started too recently; the request is dropped.
    pub fn request_button(&mut self, tick: u64, kind: ButtonKind) -> bool {
        if let Some(session) = &self.state.session {
            trace!(?kind, active = ?session.request.kind, "button request dropped, session active");
            return false;
        }
        if tick <= self.state.last_session_start.saturating_add(self.params.throttle_ticks) {
            trace!(?kind, tick, "button request dropped, throttled");
            return false;
        }

        debug!(?kind, tick, "virtual button press queued");
        self.state.session = Some(InjectionSession {
            request: ButtonRequest::new(kind),
            frames_sent: 0,
            start_tick: None,
            last_activity_tick: tick,
        });
        true
    }

    /// Feed the vehicle's current switch-message counter. Emits a frame only
    /// when the counter changed and a press is pending.
    pub fn on_bus_counter_observed(&mut self, tick: u64, counter: u8) -> Option<ButtonEmission> {
        if self.state.last_seen_bus_counter == Some(counter) {
            return None;
        }
        self.state.last_seen_bus_counter = Some(counter);

        let session = self.state.session.as_mut()?;
        if session.frames_sent == 0 {
            session.start_tick = Some(tick);
            self.state.last_session_start = tick;
        }

        let emission_counter = (counter % COUNTER_MODULUS + 1) % COUNTER_MODULUS;
        session.frames_sent += 1;
        session.last_activity_tick = tick;

        let session_complete = session.frames_sent >= self.params.frames_per_session;
        let emission = ButtonEmission {
            request: session.request,
            counter: emission_counter,
            frame_number: session.frames_sent,
            session_complete,
        };

        if session_complete {
            debug!(kind = ?session.request.kind, frames = session.frames_sent, "virtual button press complete");
            self.state.session = None;
        }

        Some(emission)
    }

    /// End a pending session that has seen no new vehicle counter for longer
    /// than the timeout. Returns `true` if a session was dropped.
    pub fn expire(&mut self, tick: u64) -> bool {
        let Some(session) = &self.state.session else {
            return false;
        };

        if tick.saturating_sub(session.last_activity_tick) > self.params.session_timeout_ticks {
            warn!(
                kind = ?session.request.kind,
                frames = session.frames_sent,
                "virtual button session timed out waiting for bus counter"
            );
            self.state.session = None;
            return true;
        }

        false
    }
}

impl Controller for AccButtonInjector {
    type State = InjectorState;

    fn get_state(&self) -> Self::State {
        self.state
    }

    fn reset(&mut self) {
        self.state = InjectorState::default();
    }
}
