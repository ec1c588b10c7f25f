//! `sis8300-clk` — compute Si5326 PLL divider coefficients and drive
//! the SIS8300 digitizer setup sequence.
//!
//! Flag-for-flag port of the reference `c109` utility's option surface
//! (`SPEC_FULL.md` §6), with an added `--config` TOML layer and
//! `tracing`-backed `-v` logging in place of the original's global
//! verbose flag.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use sis8300_clk::config::{known_configs, DigiConfig};
use sis8300_clk::device::{clk_detect, digi_setup, set_sample_count, DeviceHandle, BYPASS_9510_DIVIDER};
use sis8300_clk::report::{HumanFormatter, JsonFormatter, ReportFormatter, ShortFormatter, SolveReport};
use sis8300_clk::sleeper::NanoSleeper;
use sis8300_clk::{calc_parms, ChannelSelector, ClockMode, DigiError, Si5326Parms};

/// `-T W|N`: compute divider settings without touching the device.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum DryRunMode {
    /// Wide-band.
    W,
    /// Narrow-band.
    N,
}

impl DryRunMode {
    fn is_wideband(self) -> bool {
        self == DryRunMode::W
    }
}

/// Compute Si5326 PLL divider coefficients and set up a SIS8300 digitizer.
#[derive(Parser, Debug)]
#[command(name = "sis8300-clk", author, version, about, long_about = None)]
struct Args {
    /// Path to the device node (falls back to `RACC_DEV`).
    #[arg(short = 'd', long = "device", env = "RACC_DEV")]
    device: Option<PathBuf>,

    /// Optional TOML deployment configuration.
    #[arg(long = "config")]
    config_file: Option<PathBuf>,

    /// Route the distribution muxes to the Si5326 clock at 109 MHz.
    #[arg(short = 'S')]
    select: bool,

    /// Do not bypass the 9510 dividers (only meaningful with `-S` in wide-band mode).
    #[arg(short = 'b')]
    no_bypass: bool,

    /// Enforce bypass of the 9510 dividers.
    #[arg(short = 'B')]
    force_bypass: bool,

    /// Disable the external trigger (enabled by default).
    #[arg(short = 'e')]
    disable_exttrig: bool,

    /// Number of 16-sample blocks per channel.
    #[arg(short = 'N', default_value_t = 2)]
    nblks: u32,

    /// Use channels 2, 4, 6, 8 only.
    #[arg(short = '4')]
    quad: bool,

    /// Program the Si5326 for this output frequency, Hz.
    #[arg(short = 'f')]
    freq: Option<u64>,

    /// Read raw config parameters: n3 n2h n2l n1h nc bwsel.
    #[arg(short = 'C')]
    raw_config: bool,

    /// Trailing positional values for `-C`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    config_values: Vec<i64>,

    /// Only compute divider settings without accessing the device. Requires `-f`.
    #[arg(short = 'T', value_enum)]
    dry_run: Option<DryRunMode>,

    /// Set the PLL loop bandwidth, Hz.
    #[arg(short = 'L', default_value_t = 0)]
    loop_bandwidth: i64,

    /// Query the Si5326 operating mode only.
    #[arg(short = 'q')]
    query: bool,

    /// Be verbose.
    #[arg(short = 'v')]
    verbose: bool,

    /// Ignore fixed, hard-configured configurations.
    #[arg(short = 'I')]
    ignore_fixed: bool,

    /// Render output as JSON instead of the human summary.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sis8300_clk=debug")
            .init();
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<DigiConfig, String> {
    match &args.config_file {
        None => Ok(DigiConfig::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("reading config file {}: {e}", path.display()))?;
            toml::from_str(&text).map_err(|e| format!("parsing config file {}: {e}", path.display()))
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let config = load_config(args)?;

    if args.raw_config && args.dry_run.is_some() {
        return Err("Cannot use both: -C and -T".into());
    }
    if args.raw_config && args.freq.is_some() {
        return Err("Cannot use both: -C and -f".into());
    }
    if args.dry_run.is_some() && args.freq.is_none() {
        return Err("if you use -T you must also use -f".into());
    }
    if args.raw_config && args.config_values.len() != 6 {
        return Err(format!(
            "Option -C needs 6 configuration parameters, got {}",
            args.config_values.len()
        ));
    }

    let freq = args
        .freq
        .unwrap_or(if args.select { 109_000_000 } else { 0 });

    let mut raw_parms: Option<Si5326Parms> = None;
    if args.raw_config {
        let v = &args.config_values;
        let mut p = Si5326Parms::new(false);
        p.n3 = parse_field(v[0], "n3")?;
        p.n2h = parse_field(v[1], "n2h")?;
        p.n2l = parse_field(v[2], "n2l")?;
        p.n1h = parse_field(v[3], "n1h")?;
        p.nc = parse_field(v[4], "nc")?;
        p.bwsel = v[5] as i32;
        p.bw = args.loop_bandwidth as f64;
        raw_parms = Some(p);
    }

    let mut div_clkhl = if freq == 0 { 0 } else { BYPASS_9510_DIVIDER };
    if args.no_bypass {
        div_clkhl = 0;
    }
    if args.force_bypass {
        div_clkhl = BYPASS_9510_DIVIDER;
    }

    let sel = if args.quad { ChannelSelector::QUAD } else { ChannelSelector::ALL };
    let exttrig = !args.disable_exttrig;

    // Dry-run path: no device access at all.
    if let Some(dry) = args.dry_run {
        let mut p = Si5326Parms::new(dry.is_wideband());
        p.bw = args.loop_bandwidth as f64;
        calc_parms(freq, &mut p, args.verbose).map_err(|e| e.to_string())?;
        print_report(Some(freq), &p, args);
        print_digitizer_clock(p.fout(), div_clkhl);
        return Ok(());
    }

    let device_path = args
        .device
        .clone()
        .or_else(|| config.device.as_ref().map(|s| PathBuf::from(s.as_str())))
        .ok_or_else(|| "No device - use '-d <device>' or set RACC_DEV env_var".to_string())?;
    let handle = DeviceHandle::open(&device_path).map_err(|e| e.to_string())?;
    let sleeper = NanoSleeper;

    let mut si5326_clk: Option<Si5326Parms> = None;

    if freq > 0 || args.raw_config || args.query {
        let mode = clk_detect(&handle, &sleeper).map_err(|e| e.to_string())?;
        match mode {
            ClockMode::NoReference => {
                println!("Si5326 - no reference detected");
                return Err(DigiError::NoReference.to_string());
            }
            ClockMode::NarrowBand => println!("Si5326 - operating in narrow-band mode"),
            ClockMode::WideBand => println!("Si5326 - operating in wide-band mode"),
        }

        if args.query {
            return Ok(());
        }

        let fixed: &[(u64, Si5326Parms)] = if args.ignore_fixed {
            &[]
        } else {
            let variant = match mode {
                ClockMode::WideBand => sis8300_clk::PllVariant::WideBand,
                _ => sis8300_clk::PllVariant::NarrowBand,
            };
            known_configs(variant)
        };

        if freq > 0 {
            let matched = fixed.iter().find(|(fout, _)| *fout == freq || *fout * 2 == freq);
            match matched {
                Some((fout, parms)) => {
                    div_clkhl = if *fout == freq { BYPASS_9510_DIVIDER } else { 0 };
                    si5326_clk = Some(*parms);
                }
                None => {
                    let mut p = Si5326Parms::new(mode == ClockMode::WideBand);
                    p.bw = args.loop_bandwidth as f64;
                    calc_parms(freq, &mut p, args.verbose)
                        .map_err(|_| format!("Sorry, no configuration for output frequency {freq}Hz found"))?;
                    si5326_clk = Some(p);
                }
            }
        }

        if args.raw_config {
            si5326_clk = raw_parms;
        }
    }

    digi_setup(&handle, si5326_clk.as_ref(), div_clkhl, exttrig, &config, &sleeper)
        .map_err(|e| e.to_string())?;

    if let Err(e) = set_sample_count(&handle, sel, args.nblks * 16) {
        eprintln!("Setting sample count failed: {e}");
    }

    if args.verbose {
        match &si5326_clk {
            Some(p) => print_report(if freq > 0 { Some(freq) } else { None }, p, args),
            None => println!("PLL Bypassed; Output Frequency 250000000Hz"),
        }
        let fout = si5326_clk.as_ref().map_or(250_000_000, Si5326Parms::fout);
        print_digitizer_clock(fout, div_clkhl);
    }

    Ok(())
}

fn parse_field(v: i64, name: &str) -> Result<u32, String> {
    u32::try_from(v).map_err(|_| format!("Option -C: parameter {name} out of range"))
}

fn print_report(requested: Option<u64>, p: &Si5326Parms, args: &Args) {
    let report = SolveReport::new(requested, p);
    let rendered = if args.json {
        JsonFormatter.format_report(&report)
    } else if args.verbose {
        HumanFormatter.format_report(&report)
    } else {
        ShortFormatter.format_report(&report)
    };
    print!("{rendered}");
}

fn print_digitizer_clock(fout: u64, div_clkhl: u32) {
    let ratio: u64 = if div_clkhl > 0xff {
        1
    } else {
        ((div_clkhl & 0xf) + ((div_clkhl >> 4) & 0xf) + 2) as u64
    };
    println!("AD9510 divider ratio:  {ratio:9}");
    println!("Digitizer clock:       {:9}Hz", fout / ratio);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_flag_implies_109mhz() {
        let args = Args::try_parse_from(["sis8300-clk", "-S"]).unwrap();
        assert!(args.select);
    }

    #[test]
    fn raw_config_collects_trailing_values() {
        let args =
            Args::try_parse_from(["sis8300-clk", "-C", "10", "1", "218", "5", "10", "1"]).unwrap();
        assert!(args.raw_config);
        assert_eq!(args.config_values, vec![10, 1, 218, 5, 10, 1]);
    }

    #[test]
    fn dry_run_mode_parses_w_and_n() {
        let args = Args::try_parse_from(["sis8300-clk", "-f", "109000000", "-T", "w"]).unwrap();
        assert_eq!(args.dry_run, Some(DryRunMode::W));
    }

    #[test]
    fn quad_flag_parses() {
        let args = Args::try_parse_from(["sis8300-clk", "-4"]).unwrap();
        assert!(args.quad);
    }
}
