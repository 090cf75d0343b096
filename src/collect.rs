//! Walks the configured experiment matrix and averages every log in it.
//!
//! Each `[[series]]` entry expands to one report per benchmark directory,
//! holding one mean per thread/partition count. A log that cannot be
//! averaged becomes a gap in its series unless the run is strict.

use crate::averager::AverageError;
use crate::config::{BenchConfig, SeriesConfig};
use crate::template::{self, TemplateError};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Averaged values for one series in one directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesReport {
    pub name: String,
    pub counts: Vec<u32>,
    /// One entry per count; `None` where the log could not be averaged.
    pub values: Vec<Option<f64>>,
}

/// The files a series will read, before any of them are opened.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSeries {
    pub name: String,
    /// Index into `BenchConfig::series`.
    pub series: usize,
    pub files: Vec<(u32, PathBuf)>,
}

/// Resolve every series, directory and count into concrete log paths.
pub fn plan(config: &BenchConfig) -> Result<Vec<PlannedSeries>, CollectError> {
    let mut planned = Vec::new();

    for (index, series) in config.series.iter().enumerate() {
        for dir in resolve_directories(&config.root, &series.directories)? {
            planned.push(plan_directory(index, series, &dir)?);
        }
    }

    Ok(planned)
}

fn plan_directory(
    index: usize,
    series: &SeriesConfig,
    dir: &Path,
) -> Result<PlannedSeries, CollectError> {
    let label = dir_label(dir);
    let name = template::render(&series.name, &[("dir", label.as_str())])?;

    let files = series
        .counts
        .values()
        .into_iter()
        .map(|n| -> Result<(u32, PathBuf), TemplateError> {
            let file = template::render(&series.file, &[("n", n.to_string().as_str())])?;
            Ok((n, dir.join(file)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PlannedSeries {
        name,
        series: index,
        files,
    })
}

/// Average every planned log.
///
/// With `strict` the first failing log aborts the run; otherwise the failure
/// is logged and recorded as `None`.
pub fn collect(config: &BenchConfig, strict: bool) -> Result<Vec<SeriesReport>, CollectError> {
    let planned = plan(config)?;
    let mut reports = Vec::with_capacity(planned.len());

    for p in planned {
        let averager = config.series[p.series].averager();
        let mut counts = Vec::with_capacity(p.files.len());
        let mut values = Vec::with_capacity(p.files.len());

        for (n, path) in &p.files {
            let value = match averager.average(path) {
                Ok(mean) => Some(mean),
                Err(e) if strict => return Err(CollectError::Average(e)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        series = %p.name,
                        count = n,
                        "log skipped"
                    );
                    None
                }
            };
            counts.push(*n);
            values.push(value);
        }

        tracing::info!(
            series = %p.name,
            logs = values.len(),
            missing = values.iter().filter(|v| v.is_none()).count(),
            "series collected"
        );
        reports.push(SeriesReport {
            name: p.name,
            counts,
            values,
        });
    }

    Ok(reports)
}

/// Join each entry onto `root`, expanding glob patterns into sorted directories.
pub fn resolve_directories(root: &Path, entries: &[String]) -> Result<Vec<PathBuf>, CollectError> {
    let mut dirs = Vec::new();

    for entry in entries {
        let full = root.join(entry);
        if !is_pattern(entry) {
            dirs.push(full);
            continue;
        }

        let pattern = full.to_string_lossy().into_owned();
        let paths = glob::glob(&pattern).map_err(|e| CollectError::Pattern {
            pattern: pattern.clone(),
            source: e,
        })?;

        let mut matched = Vec::new();
        for path in paths {
            match path {
                Ok(p) if p.is_dir() => matched.push(p),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    error = %e,
                    pattern = %pattern,
                    "unreadable path while expanding directory pattern"
                ),
            }
        }
        matched.sort();
        if matched.is_empty() {
            tracing::warn!(pattern = %pattern, "directory pattern matched nothing");
        }
        dirs.extend(matched);
    }

    Ok(dirs)
}

fn is_pattern(entry: &str) -> bool {
    entry.contains(['*', '?', '['])
}

/// The directory's base name, used for `{dir}` in series names.
fn dir_label(dir: &Path) -> String {
    match dir.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => dir.display().to_string(),
    }
}

#[derive(Debug)]
pub enum CollectError {
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
    Template(TemplateError),
    Average(AverageError),
}

impl From<TemplateError> for CollectError {
    fn from(e: TemplateError) -> Self {
        CollectError::Template(e)
    }
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Pattern { pattern, source } => {
                write!(f, "bad directory pattern \"{pattern}\": {source}")
            }
            CollectError::Template(e) => write!(f, "{e}"),
            CollectError::Average(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Pattern { source, .. } => Some(source),
            CollectError::Template(e) => Some(e),
            CollectError::Average(e) => Some(e),
        }
    }
}
