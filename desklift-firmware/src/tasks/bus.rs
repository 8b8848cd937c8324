//! Bus master scheduler task
//!
//! Owns the UART TX half and drives the vendor's fixed poll cycle: break,
//! sync and protected-id header for every entry, our keep-alive payload and
//! pending move response at their slots, status slots left to the actuator.
//! The receiver window is flushed before each header so a stale partial
//! frame from the previous cycle cannot corrupt the next scan.

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::Write;

use desklift_protocol::{ProtectedId, SlotKind, VendorProtocol, LIN_BREAK, LIN_SYNC};

use crate::channels::{VendorMutex, PENDING_COMMAND, PENDING_WAKE, RX_FLUSH};

/// Bus task - issues the periodic master frame sequence
#[embassy_executor::task]
pub async fn bus_task(
    mut tx: BufferedUartTx,
    vendor: &'static VendorMutex,
    poll_period_ms: u64,
    inter_frame_idle_us: u64,
) {
    info!("bus task started ({} ms poll cycle)", poll_period_ms);

    let (schedule, keep_alive) = {
        let vendor = vendor.lock().await;
        (vendor.schedule(), vendor.keep_alive_payload())
    };

    loop {
        let cycle_start = Instant::now();

        // A sleeping desk needs its wake preamble before any polling.
        if let Some(wake) = PENDING_WAKE.try_take() {
            debug!("waking up desk");
            write_bytes(&mut tx, wake).await;
            Timer::after_micros(inter_frame_idle_us).await;
        }

        for entry in schedule {
            RX_FLUSH.signal(());

            let header = [
                LIN_BREAK,
                LIN_SYNC,
                ProtectedId::from_raw(entry.id).protected_byte(),
            ];
            write_bytes(&mut tx, &header).await;

            match entry.kind {
                SlotKind::KeepAlive => {
                    if let Some(payload) = keep_alive {
                        write_bytes(&mut tx, payload).await;
                    }
                }
                SlotKind::MoveRequest => {
                    if let Some(response) = PENDING_COMMAND.try_take() {
                        write_bytes(&mut tx, response.as_bytes()).await;
                        let mut vendor = vendor.lock().await;
                        vendor.command_sent();
                    }
                }
                SlotKind::StatusRequest | SlotKind::Sync => {
                    // Slave response slot; the receiver picks it up
                }
            }

            // Minimum bus idle before the next master frame
            Timer::after_micros(inter_frame_idle_us).await;
        }

        if let Some(rest) = Duration::from_millis(poll_period_ms).checked_sub(cycle_start.elapsed())
        {
            Timer::after(rest).await;
        }
    }
}

async fn write_bytes(tx: &mut BufferedUartTx, bytes: &[u8]) {
    if let Err(e) = tx.write_all(bytes).await {
        warn!("UART write error: {:?}", e);
    }
}
