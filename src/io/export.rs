//! CSV export for load profiles and atomic writing of run artifacts.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::analysis::{Analysis, Bucket, LoadProfile};
use crate::report::AnalysisReport;

/// Column header of the load profile and no-load tables.
const HEADER: [&str; 2] = ["datetime", "total_kw"];
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rendering of the summary report artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format \"{other}\" (expected text or json)")),
        }
    }
}

/// Writes buckets as `datetime,total_kw` rows in the given order.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_buckets_csv(buckets: &[Bucket], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER)?;
    for b in buckets {
        wtr.write_record([
            b.bucket_start.format(DATETIME_FORMAT).to_string(),
            b.total_kw.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the load profile table, one row per non-empty bucket.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_load_profile_csv(profile: &LoadProfile, writer: impl Write) -> io::Result<()> {
    write_buckets_csv(profile.buckets(), writer)
}

/// Artifacts of one run, rendered in memory.
#[derive(Debug, Clone)]
pub struct Artifacts {
    files: Vec<(String, Vec<u8>)>,
}

impl Artifacts {
    /// Renders every artifact for `stem`. The no-load table is included only
    /// when there are no-load intervals.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if any rendering fails.
    pub fn render(
        stem: &str,
        analysis: &Analysis,
        report: &AnalysisReport,
        format: OutputFormat,
    ) -> io::Result<Self> {
        let mut files = Vec::with_capacity(3);

        let mut profile = Vec::new();
        write_load_profile_csv(&analysis.profile, &mut profile)?;
        files.push((format!("{stem}_load_profile.csv"), profile));

        let body = match format {
            OutputFormat::Text => format!("{report}\n"),
            OutputFormat::Json => report.to_json().map_err(io::Error::other)?,
        };
        files.push((format!("{stem}_report.{}", format.extension()), body.into_bytes()));

        if !analysis.peaks.no_load.is_empty() {
            let mut no_load = Vec::new();
            write_buckets_csv(&analysis.peaks.no_load, &mut no_load)?;
            files.push((format!("{stem}_no_load.csv"), no_load));
        }

        Ok(Self { files })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(name, _)| name.as_str())
    }

    /// Writes every artifact into `dir`.
    ///
    /// Each file goes to a temporary sibling first; the renames happen only
    /// after every temporary file was written. On failure the temporaries are
    /// removed, and so are the destinations this call already renamed into
    /// place, so a failed write leaves none of this run's artifacts.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if any write or rename fails.
    pub fn write_to(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(self.files.len());
        for (name, bytes) in &self.files {
            let tmp = dir.join(format!(".{name}.tmp"));
            if let Err(e) = fs::write(&tmp, bytes) {
                let _ = fs::remove_file(&tmp);
                discard(&staged);
                return Err(e);
            }
            staged.push((tmp, dir.join(name)));
        }

        for (done, (tmp, dest)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(tmp, dest) {
                for (_, renamed) in &staged[..done] {
                    let _ = fs::remove_file(renamed);
                }
                discard(&staged[done..]);
                return Err(e);
            }
        }

        Ok(staged.into_iter().map(|(_, dest)| dest).collect())
    }
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

/// File stem used to name artifacts for `input` (`feeder.csv` -> `feeder`).
pub fn artifact_stem(input: &Path) -> String {
    input
        .file_stem()
        .map_or_else(|| "load".to_string(), |s| s.to_string_lossy().into_owned())
}
