//! PLL parameter solver.
//!
//! [`calc_parms`] derives a legal set of Si5326 divider coefficients
//! `(n3, n2h, n2l, n1h, nc, bwsel)` for a requested output frequency,
//! by brute-forcing the feasible `n1 = n1h * nc` values and, for each,
//! asking the [`crate::rational`] engine for the best `(n2, n3)`
//! candidates.

use crate::error::{DigiError, Result};
use crate::limits::PllVariant;
use crate::rational::{
    estimate_terms, find_convergents, intermediate, Convergent, Limit, Rational, MAX_CONVERGENTS,
};
use crate::types::Si5326Parms;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    n1: u64,
    n1h: u32,
    nc: u32,
    n3: u64,
    n2h: u32,
    n2l: u64,
    error: f64,
}

/// Fill in `p.n3, p.n2h, p.n2l, p.n1h, p.nc, p.bwsel, p.bw` for the
/// requested output frequency `fout` (Hz). `p.fin`, `p.bw` (target
/// loop bandwidth), and `p.wb` must already be set by the caller.
///
/// `verbose` routes a trace of accepted/rejected candidates through
/// `tracing` rather than a global flag.
pub fn calc_parms(fout: u64, p: &mut Si5326Parms, verbose: bool) -> Result<()> {
    if fout == 0 {
        return Err(DigiError::InvalidParam("fout must be nonzero".into()));
    }

    let variant = p.variant();
    let target_bw = p.bw;

    let best = search_best_candidate(fout, p.fin, variant, verbose)
        .ok_or(DigiError::NotSolvable { fout })?;

    let mut n3 = best.n3;
    let mut n2l = best.n2l;

    // Step 5: restore legality by scaling n3 and n2l by the smallest
    // even multiplier, if the raw candidate falls outside range.
    let f3_range = variant.f3();
    let n3_range = variant.n3();
    let n2l_range = variant.n2l();

    let needs_fixup =
        p.fin / n3 > f3_range.max || n3 < n3_range.min || n2l < n2l_range.min;

    if needs_fixup {
        let mut fixed = false;
        let mut m = 2u64;
        while m <= 1024 {
            let n3c = n3 * m;
            let n2lc = n2l * m;
            if p.fin / n3c <= f3_range.max
                && n3c >= n3_range.min
                && n3c <= n3_range.max
                && n2lc >= n2l_range.min
                && n2lc <= n2l_range.max
            {
                n3 = n3c;
                n2l = n2lc;
                fixed = true;
                break;
            }
            m += 2;
        }
        if !fixed {
            return Err(DigiError::NotSolvable { fout });
        }
    }

    p.n3 = n3 as u32;
    p.n2h = best.n2h;
    p.n2l = n2l as u32;
    p.n1h = best.n1h;
    p.nc = best.nc;

    let f3 = (p.fin / n3) as f64;
    let n2 = (best.n2h as u64 * n2l) as f64;

    let bwsel = variant
        .inverse_bw(f3, n2, target_bw)
        .ok_or(DigiError::NotSolvable { fout })?;
    p.bwsel = bwsel;
    p.bw = variant.forward_bw(f3, n2, bwsel);

    if verbose {
        tracing::debug!(
            fout,
            n3 = p.n3,
            n2h = p.n2h,
            n2l = p.n2l,
            n1h = p.n1h,
            nc = p.nc,
            bwsel = p.bwsel,
            bw = p.bw,
            freq_error = best.error,
            "solved PLL coefficients"
        );
    }

    p.validate()?;
    Ok(())
}

fn search_best_candidate(
    fout: u64,
    fin: u64,
    variant: PllVariant,
    verbose: bool,
) -> Option<Candidate> {
    let fo_range = variant.fo();
    let n1h_range = variant.n1h();
    let nc_range = variant.nc();

    let n1min_raw = ceil_div(fo_range.min, fout).max(n1h_range.min * nc_range.min);
    let n1max_raw = (fo_range.max / fout).min(n1h_range.max * nc_range.max);

    if n1min_raw > n1max_raw {
        return None;
    }

    let f3_min = variant.f3().min;
    let n3_max = variant.n3().max;
    let n2h_max = variant.n2h().max;
    let n2l_max = variant.n2l().max;
    let n2h_min = variant.n2h().min;

    let den_bound = (fin / f3_min).min(n3_max);
    let num_bound = n2h_max * n2l_max / 2;
    let r_max = Limit::new(Some(num_bound), Some(den_bound));

    let mut best: Option<Candidate> = None;
    let mut eps_best = f64::INFINITY;

    for n1 in n1min_raw..=n1max_raw {
        let n1h = match largest_n1h(n1, n1h_range.min, n1h_range.max, nc_range.min, nc_range.max) {
            Some(v) => v,
            None => continue,
        };
        let nc = (n1 / n1h as u64) as u32;

        // r approximates n2/2 over n3: fout = fin*n2/(n3*n1), n2 = 2*r.n,
        // so r.n/r.d = fout*n1/(2*fin). Working in halves of n2 guarantees
        // the recovered n2l is even.
        let r_arg = Rational::new(n1 * fout, 2 * fin);

        let mut buf = [Convergent {
            a: 0,
            conv: Rational::new(0, 0),
        }; MAX_CONVERGENTS];
        let last_idx = match find_convergents(&mut buf, r_arg, r_max) {
            Ok(k) if k < MAX_CONVERGENTS => k,
            _ => continue,
        };

        if last_idx == 0 {
            continue;
        }

        // estimate_terms must never under-estimate; this is a debug
        // sanity check, not a correctness dependency.
        debug_assert!(estimate_terms(Some(r_arg), r_max) >= 0);

        // buf[last_idx].a == 0 marks exact termination: r_arg itself is
        // rational within r_max and buf[last_idx].conv is the exact
        // target, not a semi-convergent. The walk below never visits
        // l == 0 for this node, so try it directly here.
        if buf[last_idx].a == 0 {
            let r = buf[last_idx].conv;
            let freq = (2.0 * fin as f64 * r.n as f64) / (r.d as f64 * n1 as f64);
            let e = (freq - fout as f64).abs();
            if e < eps_best {
                if let Some(n2h) = factor_n2h(r.n, n2h_min, n2h_max, n2l_max) {
                    let n2l = 2 * (r.n / n2h as u64);
                    eps_best = e;
                    best = Some(Candidate {
                        n1,
                        n1h,
                        nc,
                        n3: r.d,
                        n2h,
                        n2l,
                        error: e,
                    });
                    if verbose {
                        tracing::trace!(n1, n1h, nc, n3 = r.d, n2h, n2l, error = e, "exact candidate accepted");
                    }
                }
            }
        }

        let mut k = last_idx;
        'walk: while k >= 1 {
            k -= 1;
            let c1 = buf[k + 1];
            let c2 = buf[k];

            let mut l = c1.a;
            while l > 0 {
                l -= 1;
                let mut r = Rational::new(0, 0);
                let l_used = intermediate(&mut r, l, &c1, &c2, r_arg);

                let freq = (2.0 * fin as f64 * r.n as f64) / (r.d as f64 * n1 as f64);
                let e = (freq - fout as f64).abs();

                if e > eps_best {
                    // errors only grow moving away from the target
                    break 'walk;
                }

                if e < eps_best {
                    if let Some(n2h) = factor_n2h(r.n, n2h_min, n2h_max, n2l_max) {
                        let n2l = 2 * (r.n / n2h as u64);
                        eps_best = e;
                        best = Some(Candidate {
                            n1,
                            n1h,
                            nc,
                            n3: r.d,
                            n2h,
                            n2l,
                            error: e,
                        });
                        if verbose {
                            tracing::trace!(n1, n1h, nc, n3 = r.d, n2h, n2l, error = e, "candidate accepted");
                        }
                    }
                } else if (e - eps_best).abs() < f64::EPSILON {
                    if let Some(cur) = best {
                        if n1h > cur.n1h {
                            if let Some(n2h) = factor_n2h(r.n, n2h_min, n2h_max, n2l_max) {
                                let n2l = 2 * (r.n / n2h as u64);
                                best = Some(Candidate {
                                    n1,
                                    n1h,
                                    nc,
                                    n3: r.d,
                                    n2h,
                                    n2l,
                                    error: e,
                                });
                            }
                        }
                    }
                }

                if l_used == 0 {
                    break;
                }
                l = l_used;
            }
        }
    }

    best
}

fn ceil_div(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// Largest `n1h` in `[n1h_min, n1h_max]` dividing `n1` evenly such
/// that the resulting `nc = n1 / n1h` is legal (in range, and `1` or
/// even).
fn largest_n1h(n1: u64, n1h_min: u64, n1h_max: u64, nc_min: u64, nc_max: u64) -> Option<u32> {
    let mut n1h = n1h_max;
    while n1h >= n1h_min {
        if n1 % n1h == 0 {
            let nc = n1 / n1h;
            if nc >= nc_min && nc <= nc_max && (nc == 1 || nc % 2 == 0) {
                return Some(n1h as u32);
            }
        }
        if n1h == 0 {
            break;
        }
        n1h -= 1;
    }
    None
}

/// Largest `n2h` in `[n2h_min, n2h_max]` dividing `n` such that `n2l =
/// 2 * (n / n2h)` is even and within `n2l_max`.
fn factor_n2h(n: u64, n2h_min: u64, n2h_max: u64, n2l_max: u64) -> Option<u32> {
    let mut n2h = n2h_max;
    while n2h >= n2h_min {
        if n % n2h == 0 {
            let n2l = 2 * (n / n2h);
            if n2l <= n2l_max {
                return Some(n2h as u32);
            }
        }
        if n2h == 0 {
            break;
        }
        n2h -= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_109mhz_wideband() {
        let mut p = Si5326Parms::new(true);
        p.bw = 500.0;
        calc_parms(109_000_000, &mut p, false).unwrap();
        assert_eq!(p.fout(), 109_000_000);
        p.validate().unwrap();
    }

    #[test]
    fn solves_500mhz_wideband() {
        let mut p = Si5326Parms::new(true);
        p.bw = 500.0;
        calc_parms(500_000_000, &mut p, false).unwrap();
        assert_eq!(p.fout(), 500_000_000);
        p.validate().unwrap();
    }

    #[test]
    fn idempotent_solve() {
        use pretty_assertions::assert_eq;

        let mut p1 = Si5326Parms::new(true);
        p1.bw = 500.0;
        calc_parms(109_000_000, &mut p1, false).unwrap();

        let mut p2 = Si5326Parms::new(true);
        p2.bw = 500.0;
        calc_parms(109_000_000, &mut p2, false).unwrap();

        assert_eq!(p1, p2);
    }

    #[test]
    fn rejects_impossible_frequency() {
        let mut p = Si5326Parms::new(true);
        p.bw = 500.0;
        assert!(calc_parms(1, &mut p, false).is_err());
    }
}
