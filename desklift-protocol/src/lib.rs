//! LIN bus codec and vendor desk protocols
//!
//! This crate implements the wire side of the Desklift controller: the LIN
//! checksum/parity codec, frame synchronization over a raw byte stream, and
//! the two vendor-specific desk protocols behind one interface.
//!
//! # Frame format
//!
//! ```text
//! ┌───────┬──────┬───────────────┬──────────┬──────────┐
//! │ BREAK │ SYNC │ PROTECTED ID  │ DATA     │ CHECKSUM │
//! │ 0x00  │ 0x55 │ 6b id + 2b par│ 3–8B     │ 1B       │
//! └───────┴──────┴───────────────┴──────────┴──────────┘
//! ```
//!
//! The break byte is transport-dependent and may already have been consumed
//! by the UART layer, so frame location accepts a lone sync byte as well.
//! Everything in here is fallible-but-recoverable: a bad frame is dropped
//! and the next bus event supplies a fresh chance.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod checksum;
pub mod frame;
pub mod vendor;

pub use checksum::{checksum, parity, verify, ChecksumKind};
pub use frame::{
    FrameError, FrameSync, LinFrame, LocatedFrame, ProtectedId, HEADER_SIZE, LIN_BREAK, LIN_SYNC,
    MAX_DATA_SIZE,
};
pub use vendor::{
    CommandFrames, DeskAction, FaultCode, HeightLimits, ResponseFrame, ScheduleEntry, SlotKind,
    StatusUpdate, Vendor, VendorKind, VendorProtocol, HEIGHT_UNKNOWN,
};
