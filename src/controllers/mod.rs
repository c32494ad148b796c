pub mod steering;
pub mod brake;
pub mod buttons;
pub mod gas;
pub mod radar;

pub use steering::{SteeringCommandGenerator, SteeringOutput, SteeringState};
pub use brake::{ArmStage, BrakeArmController, BrakeArmState, BrakeOutput};
pub use buttons::{AccButtonInjector, ButtonEmission, ButtonKind, ButtonRequest, InjectorState};
pub use gas::{GasOutput, GasPedalController};
pub use radar::RadarVinBroadcaster;

use crate::codec::COUNTER_MODULUS;
use serde::Serialize;

/// Common surface of the tick-driven state machines owned by the sequencer.
pub trait Controller {
    type State: Clone + Serialize;

    fn get_state(&self) -> Self::State;
    /// Drop all accumulated state, as on process restart.
    fn reset(&mut self);
}

/// True on ticks where a controller with the given period runs.
pub fn is_due(tick: u64, period_ticks: u32) -> bool {
    period_ticks != 0 && tick % u64::from(period_ticks) == 0
}

/// Rolling message counter for a controller running every `period_ticks`.
pub fn rolling_counter(tick: u64, period_ticks: u32) -> u8 {
    ((tick / u64::from(period_ticks.max(1))) % u64::from(COUNTER_MODULUS)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_counter_wraps() {
        assert_eq!(rolling_counter(0, 2), 0);
        assert_eq!(rolling_counter(2, 2), 1);
        assert_eq!(rolling_counter(30, 2), 15);
        assert_eq!(rolling_counter(32, 2), 0);
    }

    #[test]
    fn test_is_due() {
        assert!(is_due(0, 2));
        assert!(!is_due(1, 2));
        assert!(is_due(100, 100));
        assert!(!is_due(4, 0));
    }
}
