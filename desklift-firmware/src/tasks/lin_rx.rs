//! LIN receive task
//!
//! Receives raw byte windows from the bus, locates and validates frames,
//! and feeds decoded status updates into the shared desk state. Undersized
//! windows are merged across reads until a complete frame appears; the bus
//! scheduler flushes the window before each master frame header so a stale
//! partial frame never corrupts the next scan.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;
use heapless::Vec;

use desklift_core::ObserveOutcome;
use desklift_protocol::{FaultCode, FrameError, FrameSync, LinFrame, VendorProtocol};

use crate::channels::{DeskMutex, VendorMutex, RX_FLUSH};

/// Accumulation window for merged reads
const WINDOW_SIZE: usize = 64;

/// Buffer size for one UART read
const RX_BUF_SIZE: usize = 32;

/// LIN RX task - locates, validates and dispatches frames
#[embassy_executor::task]
pub async fn lin_rx_task(
    mut rx: BufferedUartRx,
    desk: &'static DeskMutex,
    vendor: &'static VendorMutex,
) {
    info!("LIN RX task started");

    let sync = {
        let vendor = vendor.lock().await;
        FrameSync::new(vendor.data_len())
    };

    let mut window: Vec<u8, WINDOW_SIZE> = Vec::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match select(rx.read(&mut buf), RX_FLUSH.wait()).await {
            Either::First(Ok(n)) if n > 0 => {
                trace!("RX: {} bytes", n);
                if window.extend_from_slice(&buf[..n]).is_err() {
                    warn!("RX window overflow, dropping {} buffered bytes", window.len());
                    window.clear();
                    let _ = window.extend_from_slice(&buf[..n]);
                }
                drain_window(&sync, &mut window, desk, vendor).await;
            }
            Either::First(Ok(_)) => {
                // Zero-length read, nothing buffered
            }
            Either::First(Err(e)) => {
                warn!("UART read error: {:?}", e);
            }
            Either::Second(()) => {
                // New master frame header imminent; reset input buffering
                window.clear();
            }
        }
    }
}

/// Extract and dispatch every complete frame in the window.
async fn drain_window(
    sync: &FrameSync,
    window: &mut Vec<u8, WINDOW_SIZE>,
    desk: &'static DeskMutex,
    vendor: &'static VendorMutex,
) {
    loop {
        match sync.locate(window) {
            Ok(Some(located)) => {
                handle_frame(&located.frame, desk, vendor).await;
                let consumed = located.consumed;
                let remaining = window.len() - consumed;
                window.copy_within(consumed.., 0);
                window.truncate(remaining);
            }
            Ok(None) => {
                // No frame marker in the scan range: routine bus noise
                if !window.is_empty() {
                    trace!("no frame marker in {} bytes", window.len());
                }
                window.clear();
                return;
            }
            Err(FrameError::Undersized) => {
                // Partial read; keep the bytes and merge the next event
                debug!("undersized frame, {} bytes buffered", window.len());
                if window.is_full() {
                    warn!("undersized frame never completed, dropping window");
                    window.clear();
                }
                return;
            }
            Err(e) => {
                warn!("frame rejected: {:?}", e);
                window.clear();
                return;
            }
        }
    }
}

/// Decode one frame and apply its status update as a single step.
async fn handle_frame(frame: &LinFrame, desk: &'static DeskMutex, vendor: &'static VendorMutex) {
    let decoded = {
        let mut vendor = vendor.lock().await;
        vendor.decode_status(frame)
    };

    let update = match decoded {
        Ok(Some(update)) => update,
        Ok(None) => return,
        Err(e) => {
            warn!(
                "dropping frame id {=u8:#x}: {:?}",
                frame.protected_id().id(),
                e
            );
            return;
        }
    };

    if !update.ready {
        match update.fault {
            Some(FaultCode::PairingProgress(pct)) => info!("pairing sequence {}%", pct),
            Some(fault) => warn!(
                "actuator fault {:?}: {=str}",
                fault,
                fault.classification()
            ),
            None => {}
        }
        return;
    }

    let outcome = {
        let mut desk = desk.lock().await;
        desk.apply_status(&update)
    };

    match outcome {
        ObserveOutcome::Seeded => info!(
            "first desk height {}cm @ {}%, target seeded",
            update.height_cm, update.percentage
        ),
        ObserveOutcome::Updated => {
            info!("desk height {}cm @ {}%", update.height_cm, update.percentage)
        }
        ObserveOutcome::Unchanged => {
            trace!("desk height unchanged at {}cm", update.height_cm)
        }
        ObserveOutcome::Implausible => {
            warn!("implausible desk height {}cm, dropped", update.height_cm)
        }
    }
}
