//! Rendering of collected series.
//!
//! Collection produces structured `SeriesReport`s; a `Reporter` decides how
//! they are written out.

use crate::collect::SeriesReport;
use std::io::{self, Write};

pub mod json;
pub mod python;
pub mod text;

pub use json::JsonReporter;
pub use python::PythonReporter;
pub use text::TextReporter;

/// Sink for averaged series.
pub trait Reporter {
    /// Emit (or buffer) one series.
    fn report(&mut self, series: &SeriesReport) -> io::Result<()>;

    /// Flush anything buffered and finish the document.
    fn finish(&mut self) -> io::Result<()>;
}

/// Output formats selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// `y_<name> = [..]` list literals, ready to paste into a plot script
    Python,
    /// A single JSON document
    Json,
    /// Aligned plain-text table
    Text,
}

/// Build the reporter for `format` writing to `writer`.
pub fn reporter<'a>(format: Format, writer: Box<dyn Write + 'a>) -> Box<dyn Reporter + 'a> {
    match format {
        Format::Python => Box::new(PythonReporter::new(writer)),
        Format::Json => Box::new(JsonReporter::new(writer)),
        Format::Text => Box::new(TextReporter::new(writer)),
    }
}

/// Report every series and finish.
pub fn write_all(reporter: &mut dyn Reporter, series: &[SeriesReport]) -> io::Result<()> {
    for s in series {
        reporter.report(s)?;
    }
    reporter.finish()
}

#[cfg(test)]
pub(crate) fn sample() -> Vec<SeriesReport> {
    vec![
        SeriesReport {
            name: "des_perf_original_tbb_ftask".to_string(),
            counts: vec![2, 3, 4],
            values: vec![Some(15.0), Some(12.25), None],
        },
        SeriesReport {
            name: "tv80_original_tbb_ftask".to_string(),
            counts: vec![2, 3, 4],
            values: vec![Some(3.5), Some(2.0), Some(1.125)],
        },
    ]
}
