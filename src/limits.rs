//! PLL silicon variant limit tables and loop-bandwidth equations.
//!
//! The Si5326 has two operating modes — narrow-band and wide-band —
//! with different legal divider ranges and different closed-form
//! equations relating `(f3, n2, bwsel)` to the realised loop
//! bandwidth. [`PllVariant`] replaces the reference implementation's
//! function-pointer table with capability dispatch: each variant knows
//! its own bounds and implements [`PllVariant::forward_bw`] /
//! [`PllVariant::inverse_bw`] directly.

/// Which Si5326 silicon mode a solve or setup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PllVariant {
    NarrowBand,
    WideBand,
}

/// Inclusive legal range for one of the integer dividers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: u64,
    pub max: u64,
}

impl Range {
    const fn new(min: u64, max: u64) -> Self {
        Range { min, max }
    }

    pub fn contains(self, v: u64) -> bool {
        v >= self.min && v <= self.max
    }
}

impl PllVariant {
    pub const fn f3(self) -> Range {
        match self {
            PllVariant::WideBand => Range::new(10_000_000, 157_500_000),
            PllVariant::NarrowBand => Range::new(2_000, 2_000_000),
        }
    }

    pub const fn fo(self) -> Range {
        // VCO window is shared between both variants: 4.85-5.67 GHz.
        Range::new(4_850_000_000, 5_670_000_000)
    }

    pub const fn n1h(self) -> Range {
        Range::new(4, 11)
    }

    pub const fn nc(self) -> Range {
        Range::new(1, 1 << 20)
    }

    pub const fn n2h(self) -> Range {
        match self {
            PllVariant::WideBand => Range::new(1, 1),
            PllVariant::NarrowBand => Range::new(4, 11),
        }
    }

    pub const fn n2l(self) -> Range {
        match self {
            // In principle up to 1<<9, but fomax/f3min caps it at 566.
            PllVariant::WideBand => Range::new(32, 566),
            PllVariant::NarrowBand => Range::new(2, 1 << 20),
        }
    }

    pub const fn n3(self) -> Range {
        Range::new(1, 1 << 19)
    }

    /// `BWSEL` occupies a 4-bit register field (register 2, bits [7:4]).
    pub const fn bwsel(self) -> Range {
        Range::new(0, 15)
    }

    /// Generic sanity bound on the realised loop bandwidth in Hz. The
    /// reference implementation never names explicit bwmin/bwmax
    /// constants (they fall out of sweeping bwsel through its full
    /// range for the f3/n2 at hand); this is a permissive backstop so
    /// `calc_parms` can reject a clearly-bogus inverse-bandwidth
    /// result without rejecting any bwsel that the hardware itself
    /// would accept. See DESIGN.md for the rationale.
    pub const fn bw_range(self) -> (f64, f64) {
        (1.0, 1_000_000.0)
    }

    /// Forward loop-bandwidth equation: given `f3` (Hz), `n2 = n2h *
    /// n2l`, and `bwsel`, return the realised loop bandwidth in Hz.
    pub fn forward_bw(self, f3: f64, n2: f64, bwsel: i32) -> f64 {
        match self {
            PllVariant::WideBand => {
                let p = (bwsel + 1) as f64;
                let a = f3 * 1.235 / 101.235 / p;
                let b = (6.5e9 / (f3 * n2)).powi(2);
                let c = (1.0 - 0.095 / p).sqrt();
                a * b / c
            }
            PllVariant::NarrowBand => {
                let two_pow = 2f64.powi(bwsel);
                let num = f3 / 16.84 / two_pow;
                let inner1 = 1.0 - (1.0 / 3.35) * (1.0 / two_pow);
                let inner2 = 1.0 - (4276.0 / n2) * (1.0 / two_pow);
                num / (inner1 * inner2).sqrt()
            }
        }
    }

    /// Inverse of [`forward_bw`][Self::forward_bw]: find the `bwsel`
    /// that places the realised bandwidth closest to `bw_target`,
    /// clamped to `[bwmin, bwmax]`, then refined by walking `bwsel`
    /// by `+-1` until the forward value re-enters range. Returns
    /// `None` only if no selector in `[bwselmin, bwselmax]` places the
    /// forward bandwidth back in range.
    pub fn inverse_bw(self, f3: f64, n2: f64, bw_target: f64) -> Option<i32> {
        let (bw_min, bw_max) = self.bw_range();
        let target = bw_target.clamp(bw_min, bw_max);

        let range = self.bwsel();
        let mut best: Option<(i32, f64)> = None;
        for bwsel in range.min as i32..=range.max as i32 {
            let bw = self.forward_bw(f3, n2, bwsel);
            if !bw.is_finite() || bw <= 0.0 {
                continue;
            }
            let err = (bw - target).abs();
            let better = match best {
                Some((_, best_err)) => err < best_err,
                None => true,
            };
            if better {
                best = Some((bwsel, err));
            }
        }

        let (mut bwsel, _) = best?;

        // Refine: walk +-1 until the forward value is within range.
        let in_range = |s: i32| -> bool {
            let bw = self.forward_bw(f3, n2, s);
            bw.is_finite() && bw >= bw_min && bw <= bw_max
        };

        if in_range(bwsel) {
            return Some(bwsel);
        }

        for step in 1..=range.max as i32 {
            let up = bwsel + step;
            let down = bwsel - step;
            if up <= range.max as i32 && in_range(up) {
                bwsel = up;
                return Some(bwsel);
            }
            if down >= range.min as i32 && in_range(down) {
                bwsel = down;
                return Some(bwsel);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wideband_forward_bandwidth_is_positive_in_typical_range() {
        let bw = PllVariant::WideBand.forward_bw(125_000_000.0, 44.0, 2);
        assert!(bw > 0.0);
    }

    #[test]
    fn narrowband_forward_bandwidth_is_positive_in_typical_range() {
        let bw = PllVariant::NarrowBand.forward_bw(2_000_000.0, 2616.0, 5);
        assert!(bw > 0.0);
    }

    #[test]
    fn inverse_bandwidth_round_trips_through_forward() {
        let variant = PllVariant::WideBand;
        let f3 = 125_000_000.0;
        let n2 = 44.0;
        let target = variant.forward_bw(f3, n2, 2);
        let bwsel = variant.inverse_bw(f3, n2, target).unwrap();
        let realised = variant.forward_bw(f3, n2, bwsel);
        assert!((realised - target).abs() / target < 0.5);
    }

    #[test]
    fn ranges_contain_documented_boundaries() {
        assert!(PllVariant::WideBand.f3().contains(10_000_000));
        assert!(PllVariant::WideBand.f3().contains(157_500_000));
        assert!(PllVariant::NarrowBand.n2h().contains(4));
        assert!(PllVariant::NarrowBand.n2h().contains(11));
    }
}
