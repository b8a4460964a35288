//! load-profile entry point: CLI wiring, batch runs and the optional API server.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process;

use load_profile::analysis::{Analysis, Pipeline, TracingObserver};
use load_profile::cli::{self, CliOptions};
use load_profile::config::RunConfig;
use load_profile::error::AnalysisError;
use load_profile::io::export::{Artifacts, OutputFormat, artifact_stem};
use load_profile::observability::init_tracing;
use load_profile::report::AnalysisReport;
use load_profile::synth;

/// Exit code for command-line usage errors.
const USAGE_EXIT: i32 = 1;

fn load_config(opts: &CliOptions) -> Result<RunConfig, AnalysisError> {
    let mut cfg = match &opts.config {
        Some(path) => RunConfig::from_toml_file(path)?,
        None => RunConfig::default(),
    };
    opts.apply_overrides(&mut cfg);
    Ok(cfg)
}

/// Where a batch run reads from and writes to.
struct Source {
    name: String,
    stem: String,
    /// `None` means artifacts are only written when `--out-dir` is given.
    default_dir: Option<PathBuf>,
}

fn analyze(
    opts: &CliOptions,
    pipeline: &Pipeline<TracingObserver>,
) -> Result<(Source, Analysis), AnalysisError> {
    if opts.demo {
        let demo = &pipeline.config().demo;
        let mut csv = Vec::new();
        let rows = synth::write_demo_csv(demo, &mut csv)?;
        tracing::info!(rows, meters = demo.meters, seed = demo.seed, "generated demo dataset");
        let source = Source {
            name: format!("demo dataset (seed {})", demo.seed),
            stem: "demo".to_string(),
            default_dir: None,
        };
        return Ok((source, pipeline.run(csv.as_slice())?));
    }

    let Some(path) = &opts.input else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "no input file").into());
    };
    tracing::info!(input = %path.display(), "analyzing");
    let file = File::open(path)?;
    let analysis = pipeline.run(BufReader::new(file))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let source = Source {
        name: path.display().to_string(),
        stem: artifact_stem(path),
        default_dir: Some(dir.to_path_buf()),
    };
    Ok((source, analysis))
}

fn run_batch(opts: &CliOptions, cfg: RunConfig) -> Result<(), AnalysisError> {
    let pipeline = Pipeline::new(cfg, TracingObserver)?;
    let (source, analysis) = analyze(opts, &pipeline)?;

    let report = AnalysisReport::from_analysis(&source.name, &analysis)
        .with_generated_at(chrono::Local::now().naive_local());
    let artifacts = Artifacts::render(&source.stem, &analysis, &report, opts.format)?;

    if let Some(dir) = opts.out_dir.clone().or(source.default_dir) {
        for path in artifacts.write_to(&dir)? {
            tracing::info!(path = %path.display(), "artifact written");
        }
    }

    match opts.format {
        OutputFormat::Text => println!("{report}"),
        OutputFormat::Json => println!("{}", report.to_json().map_err(io::Error::other)?),
    }
    Ok(())
}

#[cfg(feature = "api")]
fn run_server(opts: &CliOptions, cfg: RunConfig) -> Result<(), AnalysisError> {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use load_profile::api::{self, AppState};

    if let Some(first) = cfg.validate().into_iter().next() {
        return Err(first.into());
    }
    let state = Arc::new(AppState::new(cfg));
    let addr = SocketAddr::from(([0, 0, 0, 0], opts.port()));
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(api::serve(state, addr))?;
    Ok(())
}

fn main() {
    init_tracing();

    let opts = match cli::parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(USAGE_EXIT);
        }
    };
    if opts.help {
        cli::print_usage();
        return;
    }

    let result = load_config(&opts).and_then(|cfg| {
        #[cfg(feature = "api")]
        if opts.serve {
            return run_server(&opts, cfg);
        }
        run_batch(&opts, cfg)
    });

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(e.kind().exit_code());
    }
}
