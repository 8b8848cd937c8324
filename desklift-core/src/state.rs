//! Shared desk state.
//!
//! One `DeskState` instance exists for the process lifetime, owned by the
//! controller and reached by the receiver and external setters only through
//! its methods (behind the firmware's mutex). The decode path writes
//! `current_height_cm`/`percentage`; the control path writes
//! `target_height_cm`/`control_active`.

use desklift_protocol::{HeightLimits, HEIGHT_UNKNOWN};

/// Rejected height-set requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetError {
    /// Requested height outside `[min_cm, max_cm]`; state unchanged.
    OutOfRange(u8),
}

/// Result of feeding one decoded height into the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ObserveOutcome {
    /// First valid reading: current stored and target seeded from it, so
    /// the desk does not move on its own at power-up.
    Seeded,
    /// Height changed.
    Updated,
    /// Same reading as before.
    Unchanged,
    /// Reading outside the physical range; dropped.
    Implausible,
}

/// Height state shared between the receiver and the controller.
#[derive(Debug, Clone)]
pub struct DeskState {
    limits: HeightLimits,
    current_height_cm: u8,
    target_height_cm: u8,
    percentage: u8,
    control_active: bool,
}

impl DeskState {
    pub const fn new(limits: HeightLimits) -> Self {
        Self {
            limits,
            current_height_cm: HEIGHT_UNKNOWN,
            target_height_cm: HEIGHT_UNKNOWN,
            percentage: HEIGHT_UNKNOWN,
            control_active: false,
        }
    }

    pub fn limits(&self) -> HeightLimits {
        self.limits
    }

    /// Last observed height, [`HEIGHT_UNKNOWN`] before the first status frame.
    pub fn current_height_cm(&self) -> u8 {
        self.current_height_cm
    }

    pub fn target_height_cm(&self) -> u8 {
        self.target_height_cm
    }

    /// Last observed travel percentage, [`HEIGHT_UNKNOWN`] before the first
    /// status frame.
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn control_active(&self) -> bool {
        self.control_active
    }

    /// Feed one decoded height reading from the receive path.
    pub fn observe(&mut self, height_cm: u8, percentage: u8) -> ObserveOutcome {
        if !self.limits.contains(height_cm) {
            return ObserveOutcome::Implausible;
        }
        if height_cm == self.current_height_cm {
            self.percentage = percentage;
            return ObserveOutcome::Unchanged;
        }

        let first = self.current_height_cm == HEIGHT_UNKNOWN;
        self.current_height_cm = height_cm;
        self.percentage = percentage;

        if first && !self.control_active {
            // Seed the target so no motion is pending at power-up; a target
            // requested before the first reading stays in effect. Never
            // re-seeded afterwards since implausible readings are dropped
            // above.
            self.target_height_cm = height_cm;
            ObserveOutcome::Seeded
        } else {
            ObserveOutcome::Updated
        }
    }

    /// Request a new target height.
    ///
    /// Returns `Ok(true)` when the request changed the state, `Ok(false)`
    /// when it was already in effect (repeated requests do not re-trigger
    /// motion).
    pub fn set_target_height(&mut self, height_cm: u8) -> Result<bool, TargetError> {
        if !self.limits.contains(height_cm) {
            return Err(TargetError::OutOfRange(height_cm));
        }

        let already_converging = self.target_height_cm == height_cm
            && (self.control_active || self.current_height_cm == height_cm);
        if already_converging {
            return Ok(false);
        }

        self.target_height_cm = height_cm;
        self.control_active = true;
        Ok(true)
    }

    /// Request a target as a percentage of the travel range.
    pub fn set_target_percentage(&mut self, pct: u8) -> Result<bool, TargetError> {
        self.set_target_height(self.limits.height_for_percentage(pct))
    }

    /// Target reached: pin the target to the current height and drop the
    /// control flag. Pinning defends against a target write racing in
    /// between ticks.
    pub(crate) fn finish_motion(&mut self) {
        self.control_active = false;
        self.target_height_cm = self.current_height_cm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: HeightLimits = HeightLimits {
        min_cm: 65,
        max_cm: 125,
    };

    #[test]
    fn starts_unknown() {
        let state = DeskState::new(LIMITS);
        assert_eq!(state.current_height_cm(), HEIGHT_UNKNOWN);
        assert_eq!(state.target_height_cm(), HEIGHT_UNKNOWN);
        assert_eq!(state.percentage(), HEIGHT_UNKNOWN);
        assert!(!state.control_active());
    }

    #[test]
    fn first_observation_seeds_target() {
        let mut state = DeskState::new(LIMITS);
        assert_eq!(state.observe(102, 82), ObserveOutcome::Seeded);
        assert_eq!(state.current_height_cm(), 102);
        assert_eq!(state.target_height_cm(), 102);
        assert!(!state.control_active());
    }

    #[test]
    fn later_observations_do_not_reseed() {
        let mut state = DeskState::new(LIMITS);
        state.observe(102, 82);
        state.set_target_height(110).unwrap();
        assert_eq!(state.observe(104, 83), ObserveOutcome::Updated);
        assert_eq!(state.target_height_cm(), 110);
    }

    #[test]
    fn pending_target_survives_first_observation() {
        let mut state = DeskState::new(LIMITS);
        state.set_target_height(100).unwrap();
        assert_eq!(state.observe(80, 25), ObserveOutcome::Updated);
        assert_eq!(state.target_height_cm(), 100);
        assert!(state.control_active());
    }

    #[test]
    fn implausible_reading_is_dropped() {
        let mut state = DeskState::new(LIMITS);
        assert_eq!(state.observe(203, 162), ObserveOutcome::Implausible);
        assert_eq!(state.current_height_cm(), HEIGHT_UNKNOWN);
        // The next in-range reading still counts as the first observation.
        assert_eq!(state.observe(102, 82), ObserveOutcome::Seeded);
    }

    #[test]
    fn out_of_range_target_is_rejected() {
        let mut state = DeskState::new(LIMITS);
        state.observe(102, 82);
        assert_eq!(state.set_target_height(64), Err(TargetError::OutOfRange(64)));
        assert_eq!(
            state.set_target_height(126),
            Err(TargetError::OutOfRange(126))
        );
        assert_eq!(state.target_height_cm(), 102);
        assert!(!state.control_active());
    }

    #[test]
    fn set_target_is_idempotent() {
        let mut state = DeskState::new(LIMITS);
        state.observe(102, 82);
        assert_eq!(state.set_target_height(110), Ok(true));
        assert_eq!(state.set_target_height(110), Ok(false));
        assert!(state.control_active());
    }

    #[test]
    fn target_at_current_height_is_a_no_op() {
        let mut state = DeskState::new(LIMITS);
        state.observe(102, 82);
        assert_eq!(state.set_target_height(102), Ok(false));
        assert!(!state.control_active());
    }

    #[test]
    fn percentage_target_maps_onto_range() {
        let mut state = DeskState::new(LIMITS);
        state.observe(102, 82);
        assert_eq!(state.set_target_percentage(0), Ok(true));
        assert_eq!(state.target_height_cm(), 65);
        assert_eq!(state.set_target_percentage(100), Ok(true));
        assert_eq!(state.target_height_cm(), 125);
        assert_eq!(state.set_target_percentage(50), Ok(true));
        assert_eq!(state.target_height_cm(), 95);
    }

    #[test]
    fn over_100_percent_is_rejected() {
        let mut state = DeskState::new(LIMITS);
        state.observe(102, 82);
        assert!(state.set_target_percentage(150).is_err());
    }
}
