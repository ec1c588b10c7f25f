//! Device-programming layer: register access, SPI-like transaction
//! machines, PLL programming, clock-mode probing, and the top-level
//! setup sequence.
//!
//! This module tree sits above [`crate::rational`] and [`crate::solver`]
//! in the dependency order of `SPEC_FULL.md` §2: it consumes an
//! already-solved [`crate::types::Si5326Parms`] and performs the side
//! effects at the hardware boundary.

pub mod orchestration;
pub mod pll;
pub mod port;
pub mod probe;
pub mod registers;

pub use orchestration::{digi_setup, set_sample_count, BYPASS_9510_DIVIDER};
pub use pll::si5326_setup;
pub use port::{ArmKind, DeviceHandle};
pub use probe::clk_detect;
