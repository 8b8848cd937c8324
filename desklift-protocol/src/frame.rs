//! Frame synchronization over the raw LIN byte stream.
//!
//! The bus layer delivers byte windows at arbitrary framing offsets: a
//! window may start mid-frame, carry a leading break byte, or have had the
//! break consumed by the UART peripheral already. [`FrameSync::locate`]
//! finds the first complete frame in such a window, or reports that more
//! bytes are needed.

use heapless::Vec;

use crate::checksum::{parity, verify, ChecksumKind};

/// Break byte preceding a master frame header (transport-dependent).
pub const LIN_BREAK: u8 = 0x00;

/// Sync byte following the break.
pub const LIN_SYNC: u8 = 0x55;

/// Header size in bytes: break + sync + protected id.
pub const HEADER_SIZE: usize = 3;

/// Largest vendor data payload.
pub const MAX_DATA_SIZE: usize = 8;

/// Errors from frame location and validation.
///
/// None of these are fatal: the frame is dropped and the next bus event
/// supplies a fresh chance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Protected identifier outside `[0x00, 0x3F]` after parity masking.
    MalformedId,
    /// A frame marker was found but the window ends before the frame does.
    /// Signals a partial read, not a corrupt wire format; the caller may
    /// merge further bytes and retry.
    Undersized,
    /// Frame trailer does not match the computed checksum.
    InvalidChecksum,
}

/// A 6-bit LIN frame identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtectedId(u8);

impl ProtectedId {
    /// Highest valid identifier.
    pub const MAX: u8 = 0x3F;

    /// Validate a 6-bit identifier.
    pub const fn new(id: u8) -> Result<Self, FrameError> {
        if id > Self::MAX {
            Err(FrameError::MalformedId)
        } else {
            Ok(Self(id))
        }
    }

    /// Mask a wire byte down to its identifier, discarding the parity bits.
    pub const fn from_raw(byte: u8) -> Self {
        Self(byte & Self::MAX)
    }

    /// The bare 6-bit identifier.
    pub const fn id(self) -> u8 {
        self.0
    }

    /// The wire byte: identifier with its two parity bits.
    pub const fn protected_byte(self) -> u8 {
        self.0 | parity(self.0)
    }
}

/// A complete frame extracted from a raw window.
///
/// Immutable once built; dropped after one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinFrame {
    pid: ProtectedId,
    data: Vec<u8, MAX_DATA_SIZE>,
    checksum: u8,
}

impl LinFrame {
    /// Assemble a frame from its parts. Fails on oversized payloads.
    pub fn new(pid: ProtectedId, data: &[u8], checksum: u8) -> Result<Self, FrameError> {
        let data = Vec::from_slice(data).map_err(|_| FrameError::Undersized)?;
        Ok(Self {
            pid,
            data,
            checksum,
        })
    }

    pub fn protected_id(&self) -> ProtectedId {
        self.pid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Verify the frame trailer under the given checksum dialect.
    pub fn verify_checksum(&self, kind: ChecksumKind) -> Result<(), FrameError> {
        let seed = match kind {
            ChecksumKind::Classic => self.pid.id(),
            ChecksumKind::Enhanced => self.pid.protected_byte(),
        };
        if verify(&self.data, seed, self.checksum) {
            Ok(())
        } else {
            Err(FrameError::InvalidChecksum)
        }
    }
}

/// A frame located inside a window, with the bytes it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFrame {
    /// Offset of the first frame byte (the protected id) in the window.
    pub offset: usize,
    /// Bytes consumed from the start of the window, frame included.
    pub consumed: usize,
    pub frame: LinFrame,
}

/// Stateless frame locator for a fixed vendor frame width.
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    data_len: usize,
}

impl FrameSync {
    pub fn new(data_len: usize) -> Self {
        debug_assert!(data_len <= MAX_DATA_SIZE);
        Self { data_len }
    }

    /// Frame length past the header: protected id + data + checksum.
    pub fn frame_len(&self) -> usize {
        1 + self.data_len + 1
    }

    /// Locate a frame in `window`.
    ///
    /// Scans up to `HEADER_SIZE + 1` bytes for a lone sync byte (used when
    /// the transport already consumed the physical break) or a break byte
    /// immediately followed by sync. Returns `Ok(None)` when neither marker
    /// is present — bus noise is routine, not an error.
    pub fn locate(&self, window: &[u8]) -> Result<Option<LocatedFrame>, FrameError> {
        let mut start = None;
        for i in 0..=HEADER_SIZE {
            let Some(&byte) = window.get(i) else {
                break;
            };
            if byte == LIN_SYNC {
                start = Some(i + 1);
                break;
            }
            if byte == LIN_BREAK {
                match window.get(i + 1) {
                    Some(&LIN_SYNC) => {
                        start = Some(i + 2);
                        break;
                    }
                    Some(_) => {}
                    // The sync byte may still be in flight.
                    None => return Err(FrameError::Undersized),
                }
            }
        }

        let Some(start) = start else {
            return Ok(None);
        };

        let consumed = start + self.frame_len();
        if window.len() < consumed {
            return Err(FrameError::Undersized);
        }

        let pid = ProtectedId::new(window[start] & ProtectedId::MAX)?;
        let data = &window[start + 1..start + 1 + self.data_len];
        let frame = LinFrame::new(pid, data, window[consumed - 1])?;

        Ok(Some(LocatedFrame {
            offset: start,
            consumed,
            frame,
        }))
    }
}
