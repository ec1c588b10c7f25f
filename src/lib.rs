//! Si5326 clock synthesis and SIS8300 digitizer setup.
//!
//! This crate computes legal Si5326 PLL divider coefficients for a
//! requested clock output frequency and drives the register
//! choreography that programs the PLL, the AD9510 distribution
//! divider, and the ADC front end of a SIS8300-family waveform
//! digitizer.
//!
//! # Layout
//!
//! - [`rational`] — continued-fraction convergents and the best
//!   semi-convergent approximation, the engine the solver drives.
//! - [`limits`] — narrow-band/wide-band PLL legal ranges and the
//!   forward/inverse loop-bandwidth equations.
//! - [`solver`] — [`solver::calc_parms`], the brute-force search over
//!   feasible divider coefficients.
//! - [`types`] — [`types::Si5326Parms`], [`types::ChannelSelector`],
//!   [`types::FirmwareCaps`].
//! - [`device`] — register access, SPI-like transaction machines, PLL
//!   programming, clock-mode detection, and [`device::digi_setup`].
//! - [`config`] — deployment defaults and the fixed-frequency fast
//!   path consulted before falling back to the solver.
//! - [`report`] — human/JSON rendering of a solved configuration, used
//!   by the CLI's `-v`/`-q`/`-T` output paths.
//!
//! # Quick start
//!
//! ```
//! use sis8300_clk::solver::calc_parms;
//! use sis8300_clk::types::Si5326Parms;
//!
//! let mut parms = Si5326Parms::new(true); // wide-band
//! parms.bw = 500.0;
//! calc_parms(109_000_000, &mut parms, false).unwrap();
//! assert_eq!(parms.fout(), 109_000_000);
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod config;
pub mod device;
pub mod error;
pub mod limits;
pub mod rational;
pub mod report;
pub mod sleeper;
pub mod solver;
pub mod types;

pub use config::DigiConfig;
pub use error::{DigiError, Result};
pub use limits::PllVariant;
pub use solver::calc_parms;
pub use types::{ChannelSelector, ClockMode, FirmwareCaps, Si5326Parms, PLL_FIN_HZ};

/// Version of this crate, for `-v`/`--version` style reporting.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
