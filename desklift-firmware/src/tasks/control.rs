//! Control tick task
//!
//! Runs the desk motion state machine on a fixed short tick, independent of
//! bus events. Each tick drains pending target requests, evaluates one
//! transition and hands the resulting command to the vendor protocol; at
//! most one command frame is issued per tick, and only from here — the
//! receiver never originates commands.

use defmt::*;
use embassy_time::{Duration, Ticker};

use desklift_core::{MotionState, TargetError, TargetRequest};
use desklift_protocol::VendorProtocol;

use crate::channels::{DeskMutex, VendorMutex, PENDING_COMMAND, PENDING_WAKE, TARGET_REQUESTS};

/// Control task - periodic desk motion decisions
#[embassy_executor::task]
pub async fn control_task(
    desk: &'static DeskMutex,
    vendor: &'static VendorMutex,
    tick_ms: u64,
) {
    info!("control task started ({} ms tick)", tick_ms);

    let mut ticker = Ticker::every(Duration::from_millis(tick_ms));
    let mut last_motion = MotionState::Idle;

    loop {
        ticker.next().await;

        while let Ok(request) = TARGET_REQUESTS.try_receive() {
            apply_request(desk, request).await;
        }

        let (action, motion, height) = {
            let mut desk = desk.lock().await;
            let action = desk.tick();
            (action, desk.motion(), desk.current_height_cm())
        };

        // Stopping counts its settle ticks down; only log the phase change.
        if core::mem::discriminant(&motion) != core::mem::discriminant(&last_motion) {
            match motion {
                MotionState::MovingUp => info!("moving desk up"),
                MotionState::MovingDown => info!("moving desk down"),
                MotionState::Stopping { .. } => info!("stopping desk"),
                MotionState::Idle => info!("desk idle at {}cm", height),
            }
        }
        last_motion = motion;

        let frames = {
            let mut vendor = vendor.lock().await;
            vendor.encode_command(action)
        };

        if let Some(wake) = frames.wake {
            PENDING_WAKE.signal(wake);
        }
        if let Some(response) = frames.response {
            PENDING_COMMAND.signal(response);
        }
    }
}

/// Apply one external target request to the shared state.
async fn apply_request(desk: &'static DeskMutex, request: TargetRequest) {
    let mut desk = desk.lock().await;
    match desk.apply_request(request) {
        Ok(true) => info!("setting the desk at {}cm", desk.target_height_cm()),
        Ok(false) => debug!("target {}cm already in effect", desk.target_height_cm()),
        Err(TargetError::OutOfRange(cm)) => {
            warn!("target height {}cm is out of range", cm)
        }
    }
}
