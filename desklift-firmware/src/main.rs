//! Desklift - LIN desk controller firmware
//!
//! Drives a motorized desk actuator over a LIN-style serial bus and exposes
//! its height as a controllable value to upper layers. Three tasks share
//! the work: the receiver parses status frames into the shared desk state,
//! the control tick runs the motion state machine, and the bus scheduler
//! masters the poll cycle on the wire.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::UART1;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::Instant;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use desklift_core::{DeskConfig, DeskController};
use desklift_protocol::{Vendor, VendorProtocol};

use crate::channels::{DeskMutex, VendorMutex};

mod channels;
mod tasks;

/// Deployment configuration: swap the preset for the connected desk.
const CONFIG: DeskConfig = DeskConfig::logicdata();

bind_interrupts!(struct Irqs {
    UART1_IRQ => BufferedInterruptHandler<UART1>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

// Shared state handed to tasks as &'static
static DESK: StaticCell<DeskMutex> = StaticCell::new();
static VENDOR: StaticCell<VendorMutex> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Desklift firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // LIN bus UART: GPIO4 TX / GPIO5 RX, 19200 8N1
    let uart_config = {
        let mut cfg = UartConfig::default();
        cfg.baudrate = CONFIG.baud_rate;
        cfg
    };

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART1, p.PIN_4, p.PIN_5, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    info!("UART initialized for LIN communication");

    // Vendor protocol selected at startup from deployment configuration
    let nonce_seed = Instant::now().as_ticks() as u8;
    let vendor_instance = Vendor::new(CONFIG.vendor, nonce_seed);
    let limits = vendor_instance.limits();
    let settle_ticks = vendor_instance.settle_ticks();
    info!(
        "vendor {:?}: travel {}..{}cm",
        CONFIG.vendor, limits.min_cm, limits.max_cm
    );

    let vendor = VENDOR.init(VendorMutex::new(vendor_instance));
    let desk = DESK.init(DeskMutex::new(DeskController::new(limits, settle_ticks)));

    // Spawn tasks
    spawner.spawn(tasks::lin_rx_task(rx, desk, vendor)).unwrap();
    spawner
        .spawn(tasks::control_task(desk, vendor, CONFIG.control_tick_ms))
        .unwrap();
    spawner
        .spawn(tasks::bus_task(
            tx,
            vendor,
            CONFIG.poll_period_ms,
            CONFIG.inter_frame_idle_us,
        ))
        .unwrap();

    info!("All tasks spawned, firmware running");

    // Main task has nothing else to do - all work happens in spawned tasks
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
