//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! Uses embassy-sync primitives for safe async communication.
//!
//! `TARGET_REQUESTS` is the collaborator-facing input surface: upper layers
//! (home-automation bridge, manual input) enqueue height requests here and
//! read the last-known height back through the shared controller mutex.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use desklift_core::{DeskController, TargetRequest};
use desklift_protocol::{ResponseFrame, Vendor};

/// Channel capacity for external target requests
const TARGET_CHANNEL_SIZE: usize = 8;

/// Shared desk controller (state + motion machine)
pub type DeskMutex = Mutex<CriticalSectionRawMutex, DeskController>;

/// Shared vendor protocol instance
pub type VendorMutex = Mutex<CriticalSectionRawMutex, Vendor>;

/// Target requests from the collaborator API
pub static TARGET_REQUESTS: Channel<CriticalSectionRawMutex, TargetRequest, TARGET_CHANNEL_SIZE> =
    Channel::new();

/// Signal for the receiver to drop any partial window before the next
/// master frame header goes out
pub static RX_FLUSH: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Latest encoded move response (updated by the controller tick)
pub static PENDING_COMMAND: Signal<CriticalSectionRawMutex, ResponseFrame> = Signal::new();

/// Wake preamble to emit before the next poll cycle
pub static PENDING_WAKE: Signal<CriticalSectionRawMutex, &'static [u8]> = Signal::new();
