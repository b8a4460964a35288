//! Command-line parsing and overrides applied onto the run configuration.

use std::env;
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::io::export::OutputFormat;

#[cfg(feature = "api")]
const DEFAULT_PORT: u16 = 3000;

/// Parsed command line.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub input: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub rated_kva: Option<f64>,
    pub interval_minutes: Option<i64>,
    pub max_invalid_rows: Option<usize>,
    pub datetime: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub format: OutputFormat,
    pub demo: bool,
    pub seed: Option<u64>,
    pub help: bool,
    #[cfg(feature = "api")]
    pub serve: bool,
    #[cfg(feature = "api")]
    pub port: Option<u16>,
}

impl CliOptions {
    /// Applies flag values on top of the file configuration.
    pub fn apply_overrides(&self, cfg: &mut RunConfig) {
        if let Some(kva) = self.rated_kva {
            cfg.analysis.rated_kva = Some(kva);
        }
        if let Some(minutes) = self.interval_minutes {
            cfg.analysis.interval_minutes = minutes;
        }
        if let Some(max) = self.max_invalid_rows {
            cfg.analysis.max_invalid_rows = max;
        }
        if let Some(dt) = &self.datetime {
            cfg.analysis.target_datetime = Some(dt.clone());
        }
        if let Some(seed) = self.seed {
            cfg.demo.seed = seed;
        }
    }

    #[cfg(feature = "api")]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    fn serving(&self) -> bool {
        #[cfg(feature = "api")]
        {
            self.serve
        }
        #[cfg(not(feature = "api"))]
        {
            false
        }
    }
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(&args)
}

pub fn parse_args_from(args: &[String]) -> Result<CliOptions, String> {
    let mut opts = CliOptions::default();
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                if opts.config.replace(PathBuf::from(path)).is_some() {
                    return Err("--config provided more than once".to_string());
                }
            }
            "--rated-kva" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --rated-kva (expected kVA)")?;
                let kva = raw
                    .parse::<f64>()
                    .map_err(|_| format!("--rated-kva value \"{raw}\" is not a number"))?;
                opts.rated_kva = Some(kva);
            }
            "--interval-minutes" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --interval-minutes")?;
                let minutes = raw
                    .parse::<i64>()
                    .map_err(|_| format!("--interval-minutes value \"{raw}\" is not an integer"))?;
                opts.interval_minutes = Some(minutes);
            }
            "--max-invalid-rows" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --max-invalid-rows")?;
                let max = raw.parse::<usize>().map_err(|_| {
                    format!("--max-invalid-rows value \"{raw}\" is not a non-negative integer")
                })?;
                opts.max_invalid_rows = Some(max);
            }
            "--datetime" => {
                i += 1;
                let dt = args.next_or_err(
                    i,
                    "missing value for --datetime (expected \"YYYY-MM-DD HH:MM:SS\")",
                )?;
                opts.datetime = Some(dt.to_string());
            }
            "--out-dir" => {
                i += 1;
                let dir =
                    args.next_or_err(i, "missing value for --out-dir (expected a directory)")?;
                opts.out_dir = Some(PathBuf::from(dir));
            }
            "--format" => {
                i += 1;
                let raw =
                    args.next_or_err(i, "missing value for --format (expected text or json)")?;
                opts.format = raw.parse()?;
            }
            "--demo" => opts.demo = true,
            "--seed" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let seed = raw
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{raw}\" is not a valid u64"))?;
                opts.seed = Some(seed);
            }
            #[cfg(feature = "api")]
            "--serve" => opts.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                let port = raw
                    .parse::<u16>()
                    .map_err(|_| format!("--port value \"{raw}\" is not a valid u16"))?;
                opts.port = Some(port);
            }
            "--help" | "-h" => opts.help = true,
            other if other.starts_with('-') => return Err(format!("unknown argument: {other}")),
            path => {
                if opts.input.replace(PathBuf::from(path)).is_some() {
                    return Err("more than one input file given".to_string());
                }
            }
        }
        i += 1;
    }

    if opts.help {
        return Ok(opts);
    }
    if opts.demo && opts.input.is_some() {
        return Err("an input file and `--demo` are mutually exclusive; choose one".to_string());
    }
    if opts.input.is_none() && !opts.demo && !opts.serving() {
        return Err("missing input file (or pass --demo)".to_string());
    }

    Ok(opts)
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("load-profile: interval load-profile analysis");
    eprintln!();
    eprintln!("Usage: load-profile [OPTIONS] <input.csv>");
    eprintln!("       load-profile [OPTIONS] --demo");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>            Load settings from a TOML file");
    eprintln!("  --rated-kva <kVA>          Transformer rating; 0 skips capacity analysis");
    eprintln!("  --interval-minutes <n>     Bucket width (default: 15)");
    eprintln!("  --max-invalid-rows <n>     Rows tolerated per failure category (default: 3)");
    eprintln!("  --datetime <ts>            Target instant, \"YYYY-MM-DD HH:MM:SS\"");
    eprintln!("  --out-dir <dir>            Artifact directory (default: input's directory)");
    eprintln!("  --format <text|json>       Report format (default: text)");
    eprintln!("  --demo                     Analyze a generated multi-meter dataset");
    eprintln!("  --seed <u64>               Seed for --demo");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                    Start the HTTP API instead of a batch run");
        eprintln!("  --port <u16>               API port (default: 3000)");
    }
    eprintln!("  --help                     Show this help message");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn input_and_overrides() {
        let opts = parse_args_from(&args(&[
            "feeder.csv",
            "--rated-kva",
            "75",
            "--interval-minutes",
            "30",
            "--datetime",
            "2024-10-08 16:15:00",
            "--format",
            "json",
        ]));
        let opts = opts.ok();
        assert_eq!(
            opts.as_ref().and_then(|o| o.input.as_deref()).and_then(|p| p.to_str()),
            Some("feeder.csv")
        );
        assert_eq!(opts.as_ref().map(|o| o.format), Some(OutputFormat::Json));

        let mut cfg = RunConfig::default();
        if let Some(o) = &opts {
            o.apply_overrides(&mut cfg);
        }
        assert_eq!(cfg.analysis.rated_kva, Some(75.0));
        assert_eq!(cfg.analysis.interval_minutes, 30);
        assert_eq!(cfg.analysis.target_datetime.as_deref(), Some("2024-10-08 16:15:00"));
        assert_eq!(cfg.analysis.max_invalid_rows, 3);
    }

    #[test]
    fn demo_with_seed() {
        let opts = parse_args_from(&args(&["--demo", "--seed", "9"])).ok();
        let mut cfg = RunConfig::default();
        if let Some(o) = &opts {
            o.apply_overrides(&mut cfg);
        }
        assert!(opts.is_some_and(|o| o.demo));
        assert_eq!(cfg.demo.seed, 9);
    }

    #[test]
    fn missing_input_is_error() {
        assert!(parse_args_from(&args(&["--rated-kva", "50"])).is_err());
    }

    #[test]
    fn demo_and_input_are_exclusive() {
        assert!(parse_args_from(&args(&["--demo", "a.csv"])).is_err());
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse_args_from(&args(&["a.csv", "--rated-kva", "big"])).is_err());
        assert!(parse_args_from(&args(&["a.csv", "--format", "xml"])).is_err());
        assert!(parse_args_from(&args(&["a.csv", "--seed"])).is_err());
        assert!(parse_args_from(&args(&["a.csv", "--bogus"])).is_err());
    }

    #[test]
    fn help_needs_no_input() {
        assert!(parse_args_from(&args(&["--help"])).is_ok_and(|o| o.help));
    }
}
