//! JSON output: the whole run as one document.

use super::Reporter;
use crate::collect::SeriesReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

/// Buffers every series and writes them as a single JSON object on finish.
pub struct JsonReporter<W: Write> {
    writer: W,
    series: Vec<SeriesReport>,
}

#[derive(Debug, Serialize)]
struct JsonDocument<'a> {
    generated_at: DateTime<Utc>,
    series: &'a [SeriesReport],
}

impl<W: Write> JsonReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            series: Vec::new(),
        }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn report(&mut self, series: &SeriesReport) -> io::Result<()> {
        self.series.push(series.clone());
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let doc = JsonDocument {
            generated_at: Utc::now(),
            series: &self.series,
        };
        serde_json::to_writer_pretty(&mut self.writer, &doc)?;
        writeln!(self.writer)?;
        self.writer.flush()
    }
}
