//! Deployment configuration and the fixed-frequency fast path.
//!
//! [`DigiConfig`] is the optional `--config <path>` TOML file: device
//! path, default block count and trigger mode, and the site-marker
//! opt-out. [`known_configs`] restores the small table of pre-solved
//! `Si5326Parms` the original CLI consulted before falling back to
//! [`crate::solver::calc_parms`].

use serde::Deserialize;

use crate::limits::PllVariant;
use crate::types::Si5326Parms;

/// Deployment-wide defaults, loadable from a TOML file and then
/// overridden by explicit CLI flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigiConfig {
    /// Device node path, overridden by `-d` or `RACC_DEV`.
    pub device: Option<String>,
    /// Default sample block count (16 samples/block) when `-N` is absent.
    pub nblks: u32,
    /// Default external-trigger state when `-e` is absent.
    pub exttrig: bool,
    /// Probe the "StripBPM" site marker and set its trigger-enable bit
    /// when matched. Default `true`, matching the original's
    /// unconditional behaviour, now an explicit opt-out.
    pub site_marker_probe: bool,
}

impl Default for DigiConfig {
    fn default() -> Self {
        DigiConfig {
            device: None,
            nblks: 2,
            exttrig: true,
            site_marker_probe: true,
        }
    }
}

/// Pre-solved `(fout, parms)` pairs for `variant`, consulted by the CLI
/// before falling back to [`crate::solver::calc_parms`]. Skipped
/// entirely when `-I` is given.
pub fn known_configs(variant: PllVariant) -> &'static [(u64, Si5326Parms)] {
    match variant {
        PllVariant::WideBand => &WIDEBAND_CONFIGS,
        PllVariant::NarrowBand => &NARROWBAND_CONFIGS,
    }
}

const WIDEBAND_CONFIGS: [(u64, Si5326Parms); 2] = [
    (
        109_000_000,
        Si5326Parms {
            fin: 250_000_000,
            n3: 10,
            n2h: 1,
            n2l: 218,
            n1h: 5,
            nc: 10,
            bwsel: 1,
            bw: 0.0,
            wb: true,
        },
    ),
    (
        500_000_000,
        Si5326Parms {
            fin: 250_000_000,
            n3: 2,
            n2h: 1,
            n2l: 44,
            n1h: 11,
            nc: 1,
            bwsel: 2,
            bw: 0.0,
            wb: true,
        },
    ),
];

const NARROWBAND_CONFIGS: [(u64, Si5326Parms); 1] = [(
    109_000_000,
    Si5326Parms {
        fin: 250_000_000,
        n3: 125,
        n2h: 4,
        n2l: 654,
        n1h: 6,
        nc: 4,
        bwsel: 5,
        bw: 0.0,
        wb: false,
    },
)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wideband_known_config_matches_fout() {
        let (fout, p) = known_configs(PllVariant::WideBand)[0];
        assert_eq!(fout, 109_000_000);
        assert_eq!(p.fout(), 109_000_000);
    }

    #[test]
    fn narrowband_known_config_matches_fout() {
        let (fout, p) = known_configs(PllVariant::NarrowBand)[0];
        assert_eq!(fout, 109_000_000);
        assert_eq!(p.fout(), 109_000_000);
    }

    #[test]
    fn default_config_matches_original_behaviour() {
        let cfg = DigiConfig::default();
        assert_eq!(cfg.nblks, 2);
        assert!(cfg.exttrig);
        assert!(cfg.site_marker_probe);
    }
}
