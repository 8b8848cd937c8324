//! Embassy tasks for the desk controller.

pub mod bus;
pub mod control;
pub mod lin_rx;

pub use bus::bus_task;
pub use control::control_task;
pub use lin_rx::lin_rx_task;
