//! Desk motion state machine.
//!
//! The controller is evaluated once per control tick and yields exactly one
//! [`DeskAction`] per tick; re-yielding the current action is the system's
//! only retry mechanism, and it is intentionally unbounded — a stalled bus
//! leaves the state unchanged and the same command goes out again next tick.
//!
//! Vendors that need a settle window between stop and idle get it through
//! the explicit `Stopping` sub-state advanced by the tick scheduler, never
//! through a blocking delay.

use desklift_protocol::{DeskAction, HeightLimits, StatusUpdate, HEIGHT_UNKNOWN};

use crate::state::{DeskState, ObserveOutcome, TargetError};

/// External height request from a collaborator layer (home-automation
/// bridge, manual input).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetRequest {
    /// Absolute target height in centimeters.
    Height(u8),
    /// Target as a percentage of the travel range.
    Percentage(u8),
}

/// Motion states, cycling `Idle → MovingUp/MovingDown → Stopping → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionState {
    Idle,
    MovingUp,
    MovingDown,
    /// Settle window after the stop command, counted in control ticks.
    Stopping { ticks_left: u8 },
}

/// Closed-loop desk controller owning the shared [`DeskState`].
pub struct DeskController {
    state: DeskState,
    motion: MotionState,
    settle_ticks: u8,
}

impl DeskController {
    pub const fn new(limits: HeightLimits, settle_ticks: u8) -> Self {
        Self {
            state: DeskState::new(limits),
            motion: MotionState::Idle,
            settle_ticks,
        }
    }

    pub fn motion(&self) -> MotionState {
        self.motion
    }

    pub fn current_height_cm(&self) -> u8 {
        self.state.current_height_cm()
    }

    pub fn target_height_cm(&self) -> u8 {
        self.state.target_height_cm()
    }

    pub fn height_percentage(&self) -> u8 {
        self.state.percentage()
    }

    pub fn control_active(&self) -> bool {
        self.state.control_active()
    }

    /// Feed a decoded status update from the receive path.
    pub fn apply_status(&mut self, update: &StatusUpdate) -> ObserveOutcome {
        self.state.observe(update.height_cm, update.percentage)
    }

    /// External setter: absolute target height in centimeters.
    pub fn set_target_height(&mut self, height_cm: u8) -> Result<bool, TargetError> {
        self.state.set_target_height(height_cm)
    }

    /// External setter: target as a percentage of the travel range.
    pub fn set_target_percentage(&mut self, pct: u8) -> Result<bool, TargetError> {
        self.state.set_target_percentage(pct)
    }

    /// Apply one queued collaborator request.
    pub fn apply_request(&mut self, request: TargetRequest) -> Result<bool, TargetError> {
        match request {
            TargetRequest::Height(cm) => self.set_target_height(cm),
            TargetRequest::Percentage(pct) => self.set_target_percentage(pct),
        }
    }

    /// Evaluate one control tick.
    pub fn tick(&mut self) -> DeskAction {
        match self.motion {
            MotionState::Idle => {
                if !self.state.control_active() {
                    return DeskAction::Idle;
                }
                let current = self.state.current_height_cm();
                let target = self.state.target_height_cm();
                if current == HEIGHT_UNKNOWN {
                    // No motion before the first valid status frame.
                    return DeskAction::Idle;
                }
                if target == current {
                    self.state.finish_motion();
                    return DeskAction::Idle;
                }
                if target > current {
                    self.motion = MotionState::MovingUp;
                    DeskAction::Up
                } else {
                    self.motion = MotionState::MovingDown;
                    DeskAction::Down
                }
            }

            MotionState::MovingUp | MotionState::MovingDown => {
                let current = self.state.current_height_cm();
                let target = self.state.target_height_cm();

                if target == current || !self.state.control_active() {
                    self.state.finish_motion();
                    self.motion = MotionState::Stopping {
                        ticks_left: self.settle_ticks,
                    };
                    return DeskAction::Stop;
                }

                if target > current && self.motion == MotionState::MovingDown {
                    self.motion = MotionState::MovingUp;
                    return DeskAction::Up;
                }
                if target < current && self.motion == MotionState::MovingUp {
                    self.motion = MotionState::MovingDown;
                    return DeskAction::Down;
                }

                match self.motion {
                    MotionState::MovingUp => DeskAction::Up,
                    _ => DeskAction::Down,
                }
            }

            MotionState::Stopping { ticks_left } => {
                if ticks_left > 1 {
                    self.motion = MotionState::Stopping {
                        ticks_left: ticks_left - 1,
                    };
                    DeskAction::Stop
                } else if ticks_left == 1 {
                    self.motion = MotionState::Stopping { ticks_left: 0 };
                    DeskAction::BeforeIdle
                } else {
                    self.motion = MotionState::Idle;
                    DeskAction::Idle
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desklift_protocol::StatusUpdate;
    use proptest::prelude::*;

    const LIMITS: HeightLimits = HeightLimits {
        min_cm: 65,
        max_cm: 125,
    };

    fn controller_at(height: u8) -> DeskController {
        let mut controller = DeskController::new(LIMITS, 4);
        controller.apply_status(&status(height));
        controller
    }

    fn status(height: u8) -> StatusUpdate {
        StatusUpdate {
            height_cm: height,
            percentage: 0,
            ready: true,
            fault: None,
        }
    }

    /// Drain the settle sequence after the stop command and assert its shape.
    fn assert_settles(controller: &mut DeskController, settle_ticks: u8) {
        for _ in 1..settle_ticks {
            assert_eq!(controller.tick(), DeskAction::Stop);
        }
        assert_eq!(controller.tick(), DeskAction::BeforeIdle);
        assert_eq!(controller.tick(), DeskAction::Idle);
        assert_eq!(controller.motion(), MotionState::Idle);
    }

    #[test]
    fn idle_until_target_set() {
        let mut controller = controller_at(100);
        assert_eq!(controller.tick(), DeskAction::Idle);
        assert_eq!(controller.motion(), MotionState::Idle);
    }

    #[test]
    fn no_motion_before_first_status() {
        let mut controller = DeskController::new(LIMITS, 4);
        controller.set_target_height(100).unwrap();
        assert_eq!(controller.tick(), DeskAction::Idle);
        assert_eq!(controller.motion(), MotionState::Idle);

        // First status frame arrives; now motion may start.
        controller.apply_status(&status(80));
        assert_eq!(controller.tick(), DeskAction::Up);
    }

    #[test]
    fn moves_toward_target_and_settles() {
        let mut controller = controller_at(100);
        controller.set_target_height(110).unwrap();

        assert_eq!(controller.tick(), DeskAction::Up);
        assert_eq!(controller.tick(), DeskAction::Up);

        controller.apply_status(&status(105));
        assert_eq!(controller.tick(), DeskAction::Up);

        controller.apply_status(&status(110));
        assert_eq!(controller.tick(), DeskAction::Stop);
        assert!(!controller.control_active());
        assert_eq!(controller.target_height_cm(), 110);

        assert_settles(&mut controller, 4);
    }

    #[test]
    fn collaborator_requests_delegate_to_setters() {
        let mut controller = controller_at(100);
        assert_eq!(controller.apply_request(TargetRequest::Height(110)), Ok(true));
        assert_eq!(controller.target_height_cm(), 110);
        assert_eq!(
            controller.apply_request(TargetRequest::Percentage(0)),
            Ok(true)
        );
        assert_eq!(controller.target_height_cm(), 65);
        assert!(controller
            .apply_request(TargetRequest::Height(200))
            .is_err());
    }

    #[test]
    fn moves_down_when_target_below() {
        let mut controller = controller_at(100);
        controller.set_target_height(90).unwrap();
        assert_eq!(controller.tick(), DeskAction::Down);
    }

    #[test]
    fn direction_flips_when_target_changes_mid_motion() {
        let mut controller = controller_at(100);
        controller.set_target_height(110).unwrap();
        assert_eq!(controller.tick(), DeskAction::Up);

        controller.set_target_height(90).unwrap();
        assert_eq!(controller.tick(), DeskAction::Down);
        assert_eq!(controller.motion(), MotionState::MovingDown);
    }

    #[test]
    fn target_write_during_settle_restarts_after_idle() {
        let mut controller = controller_at(100);
        controller.set_target_height(101).unwrap();
        assert_eq!(controller.tick(), DeskAction::Up);
        controller.apply_status(&status(101));
        assert_eq!(controller.tick(), DeskAction::Stop);

        // New target while the settle window runs.
        controller.set_target_height(95).unwrap();
        assert_settles(&mut controller, 4);
        assert_eq!(controller.tick(), DeskAction::Down);
    }

    #[test]
    fn retries_same_action_when_bus_is_stalled() {
        let mut controller = controller_at(100);
        controller.set_target_height(110).unwrap();
        // No status updates arrive at all; the command repeats unbounded.
        for _ in 0..50 {
            assert_eq!(controller.tick(), DeskAction::Up);
        }
    }

    #[test]
    fn settle_length_follows_vendor() {
        let mut controller = DeskController::new(LIMITS, 10);
        controller.apply_status(&status(100));
        controller.set_target_height(101).unwrap();
        assert_eq!(controller.tick(), DeskAction::Up);
        controller.apply_status(&status(101));
        assert_eq!(controller.tick(), DeskAction::Stop);
        assert_settles(&mut controller, 10);
    }

    #[test]
    fn malformed_id_never_reaches_the_state() {
        use desklift_protocol::{FrameError, ProtectedId};

        let mut controller = controller_at(100);
        // The receive path validates the masked identifier before any
        // decode; a value past 0x3F is rejected and nothing is applied.
        assert_eq!(ProtectedId::new(0x40), Err(FrameError::MalformedId));
        assert_eq!(controller.current_height_cm(), 100);
        assert_eq!(controller.tick(), DeskAction::Idle);
    }

    /// Raw bytes from the bus all the way into the controller: locate,
    /// checksum-verify, decode, apply.
    #[test]
    fn receive_path_end_to_end() {
        use desklift_protocol::{
            checksum, FrameSync, ProtectedId, Vendor, VendorKind, VendorProtocol,
        };

        let mut vendor = Vendor::new(VendorKind::Logicdata, 7);
        let mut controller =
            DeskController::new(vendor.limits(), vendor.settle_ticks());
        let sync = FrameSync::new(vendor.data_len());

        // Ready status frame reporting 900 mm, preceded by line noise.
        let pid = ProtectedId::from_raw(0x23);
        let data = [0x00, 0x00, 0x60, 0x03, 0x84, 0x80, 0x00, 0x00];
        let mut window = heapless::Vec::<u8, 32>::new();
        window.extend_from_slice(&[0x17, 0x00, 0x55]).unwrap();
        window.push(pid.protected_byte()).unwrap();
        window.extend_from_slice(&data).unwrap();
        window
            .push(checksum(&data, pid.protected_byte()))
            .unwrap();

        let located = sync.locate(&window).unwrap().unwrap();
        let update = vendor.decode_status(&located.frame).unwrap().unwrap();
        assert_eq!(controller.apply_status(&update), ObserveOutcome::Seeded);
        assert_eq!(controller.current_height_cm(), 90);
        assert_eq!(controller.target_height_cm(), 90);
    }

    proptest! {
        /// For any monotonic convergence toward the target the controller
        /// ends idle at the target with the control flag cleared, without
        /// ever commanding past it.
        #[test]
        fn never_overshoots(
            start in 65u8..=125,
            target in 65u8..=125,
            steps in proptest::collection::vec(1u8..4, 0..64),
        ) {
            let mut controller = controller_at(start);
            controller.set_target_height(target).unwrap_or(false);

            let mut current = start;
            let mut steps = steps.into_iter();
            for _ in 0..512 {
                let action = controller.tick();
                match action {
                    DeskAction::Up => prop_assert!(current < target),
                    DeskAction::Down => prop_assert!(current > target),
                    _ => {}
                }
                if controller.motion() == MotionState::Idle && !controller.control_active() {
                    break;
                }
                // The desk creeps toward the target while commanded.
                if matches!(action, DeskAction::Up | DeskAction::Down) {
                    let step = steps.next().unwrap_or(1);
                    let delta = (target as i16 - current as i16).unsigned_abs().min(step as u16);
                    current = if target > current {
                        current + delta as u8
                    } else {
                        current - delta as u8
                    };
                    controller.apply_status(&status(current));
                }
            }

            prop_assert_eq!(controller.motion(), MotionState::Idle);
            prop_assert_eq!(controller.current_height_cm(), target);
            prop_assert_eq!(controller.target_height_cm(), target);
            prop_assert!(!controller.control_active());
        }
    }
}
