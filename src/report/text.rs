//! Plain-text table output.

use super::Reporter;
use crate::collect::SeriesReport;
use std::io::{self, Write};

const VALUE_WIDTH: usize = 10;

/// Aligned table: a header row of counts, then one row per series.
///
/// A new header is emitted whenever a series uses different counts than the
/// row above it.
pub struct TextReporter<W: Write> {
    writer: W,
    rows: Vec<SeriesReport>,
}

impl<W: Write> TextReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            rows: Vec::new(),
        }
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn report(&mut self, series: &SeriesReport) -> io::Result<()> {
        self.rows.push(series.clone());
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let name_width = self
            .rows
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0)
            .max("series".len());

        let mut last_counts: Option<&[u32]> = None;
        for row in &self.rows {
            if last_counts != Some(row.counts.as_slice()) {
                write!(self.writer, "{:<name_width$}", "series")?;
                for n in &row.counts {
                    write!(self.writer, " {:>width$}", format!("n={n}"), width = VALUE_WIDTH)?;
                }
                writeln!(self.writer)?;
                last_counts = Some(row.counts.as_slice());
            }

            write!(self.writer, "{:<name_width$}", row.name)?;
            for v in &row.values {
                let cell = match v {
                    Some(v) => format!("{v:.3}"),
                    None => "-".to_string(),
                };
                write!(self.writer, " {cell:>width$}", width = VALUE_WIDTH)?;
            }
            writeln!(self.writer)?;
        }

        self.writer.flush()
    }
}
