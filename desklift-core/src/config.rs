//! Configuration type definitions.
//!
//! All values are deployment constants supplied by the host build; nothing
//! here is persisted. The per-vendor presets carry the cadences and baud
//! rate the reference hardware expects.

use desklift_protocol::VendorKind;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Deployment configuration for one desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeskConfig {
    /// Which vendor protocol the connected desk speaks.
    pub vendor: VendorKind,
    /// Control tick interval in milliseconds.
    pub control_tick_ms: u64,
    /// Full master poll cycle period in milliseconds.
    pub poll_period_ms: u64,
    /// Minimum bus idle time between master frames, in microseconds.
    pub inter_frame_idle_us: u64,
    /// LIN bus baud rate.
    pub baud_rate: u32,
}

impl DeskConfig {
    pub const fn ikea() -> Self {
        Self {
            vendor: VendorKind::Ikea,
            control_tick_ms: 10,
            poll_period_ms: 100,
            inter_frame_idle_us: 2_000,
            baud_rate: 19_200,
        }
    }

    pub const fn logicdata() -> Self {
        Self {
            vendor: VendorKind::Logicdata,
            control_tick_ms: 10,
            poll_period_ms: 100,
            inter_frame_idle_us: 2_000,
            baud_rate: 19_200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_share_the_bus_parameters() {
        let ikea = DeskConfig::ikea();
        let logicdata = DeskConfig::logicdata();
        assert_eq!(ikea.baud_rate, 19_200);
        assert_eq!(ikea.baud_rate, logicdata.baud_rate);
        assert_eq!(ikea.control_tick_ms, logicdata.control_tick_ms);
        assert_ne!(ikea.vendor, logicdata.vendor);
    }
}
