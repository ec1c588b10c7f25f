//! Rendering a solved PLL configuration for the CLI.
//!
//! One trait, several renderers, over the single payload this crate
//! produces: a solved [`Si5326Parms`] plus the frequencies derived
//! from it. Used by the CLI's `-v` coefficient summary, `-q` query
//! mode, and `-T` dry-run JSON output.

use serde::Serialize;

use crate::types::Si5326Parms;

/// Everything the CLI prints about one solved (or raw `-C`) PLL
/// configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    /// Output frequency the caller requested, Hz. `None` for a raw
    /// `-C` configuration with no associated solve.
    pub requested_fout: Option<u64>,
    /// PLL input (reference) frequency, Hz.
    pub fin: u64,
    pub n3: u32,
    pub n2h: u32,
    pub n2l: u32,
    pub n1h: u32,
    pub nc: u32,
    pub bwsel: i32,
    /// Realised loop bandwidth, Hz.
    pub bw: f64,
    /// `true` for wide-band, `false` for narrow-band.
    pub wb: bool,
    /// `f3 = fin / n3`, Hz.
    pub f3: u64,
    /// `fo = f3 * n2h * n2l`, the VCO frequency, Hz.
    pub fo: u64,
    /// `fo / (n1h * nc)`, the realised PLL output frequency, Hz.
    pub fout: u64,
}

impl SolveReport {
    /// Build a report from a solved (or raw) [`Si5326Parms`] and the
    /// frequency the caller originally asked for, if any.
    pub fn new(requested_fout: Option<u64>, p: &Si5326Parms) -> Self {
        SolveReport {
            requested_fout,
            fin: p.fin,
            n3: p.n3,
            n2h: p.n2h,
            n2l: p.n2l,
            n1h: p.n1h,
            nc: p.nc,
            bwsel: p.bwsel,
            bw: p.bw,
            wb: p.wb,
            f3: p.f3(),
            fo: p.fo(),
            fout: p.fout(),
        }
    }
}

/// Renders a [`SolveReport`] to a `String` in one particular output
/// style. Implementors provide the per-section pieces plus a default
/// whole-report assembly.
pub trait ReportFormatter {
    /// Format the divider-coefficient line.
    fn format_coefficients(&self, report: &SolveReport) -> String;

    /// Format the derived-frequency line(s).
    fn format_frequencies(&self, report: &SolveReport) -> String;

    /// Render the complete report.
    fn format_report(&self, report: &SolveReport) -> String {
        format!(
            "{}{}",
            self.format_coefficients(report),
            self.format_frequencies(report)
        )
    }
}

/// Multi-line, labeled output for interactive use (`-v`).
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanFormatter;

impl ReportFormatter for HumanFormatter {
    fn format_coefficients(&self, r: &SolveReport) -> String {
        format!(
            "variant:  {}\nn3={} n2h={} n2l={} n1h={} nc={} bwsel={}\nbw={:.1} Hz\n",
            if r.wb { "wide-band" } else { "narrow-band" },
            r.n3, r.n2h, r.n2l, r.n1h, r.nc, r.bwsel, r.bw,
        )
    }

    fn format_frequencies(&self, r: &SolveReport) -> String {
        let mut s = format!("fin={} Hz f3={} Hz fo={} Hz fout={} Hz\n", r.fin, r.f3, r.fo, r.fout);
        if let Some(req) = r.requested_fout {
            s.push_str(&format!("requested={req} Hz error={} Hz\n", r.fout as i64 - req as i64));
        }
        s
    }
}

/// Single-line, query-mode output (`-q`): just the realised frequency
/// and the operating mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortFormatter;

impl ReportFormatter for ShortFormatter {
    fn format_coefficients(&self, r: &SolveReport) -> String {
        if r.wb { "wb".into() } else { "nb".into() }
    }

    fn format_frequencies(&self, r: &SolveReport) -> String {
        format!(" {}\n", r.fout)
    }

    fn format_report(&self, r: &SolveReport) -> String {
        format!("{}{}", self.format_coefficients(r), self.format_frequencies(r))
    }
}

/// JSON output for `-T` dry-run mode and scripted callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format_coefficients(&self, _report: &SolveReport) -> String {
        String::new()
    }

    fn format_frequencies(&self, _report: &SolveReport) -> String {
        String::new()
    }

    fn format_report(&self, report: &SolveReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SolveReport {
        let p = Si5326Parms {
            fin: 250_000_000,
            n3: 10,
            n2h: 1,
            n2l: 218,
            n1h: 5,
            nc: 10,
            bwsel: 1,
            bw: 500.0,
            wb: true,
        };
        SolveReport::new(Some(109_000_000), &p)
    }

    #[test]
    fn human_output_includes_coefficients_and_frequency() {
        let out = HumanFormatter.format_report(&sample());
        assert!(out.contains("n3=10"));
        assert!(out.contains("fout=109000000"));
    }

    #[test]
    fn short_output_is_one_line_per_section() {
        let out = ShortFormatter.format_report(&sample());
        assert_eq!(out, "wb 109000000\n");
    }

    #[test]
    fn json_output_round_trips_fields() {
        let out = JsonFormatter.format_report(&sample());
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["fout"], 109_000_000);
        assert_eq!(parsed["n3"], 10);
    }
}
