//! Python list-literal output, one assignment per series.

use super::Reporter;
use crate::collect::SeriesReport;
use std::io::{self, Write};

/// Writes `y_<name> = [v1,v2,...]` followed by a blank line.
///
/// Floats are written the way Python's `repr` writes them (`15.0`, `12.25`,
/// `1e+16`, `1.5e-05`), gaps are `None`.
pub struct PythonReporter<W: Write> {
    writer: W,
}

impl<W: Write> PythonReporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> Reporter for PythonReporter<W> {
    fn report(&mut self, series: &SeriesReport) -> io::Result<()> {
        let values: Vec<String> = series.values.iter().map(|v| literal(*v)).collect();
        writeln!(self.writer, "y_{} = [{}]", series.name, values.join(","))?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn literal(value: Option<f64>) -> String {
    match value {
        Some(v) => float_repr(v),
        None => "None".to_string(),
    }
}

/// Shortest round-trip digits, positional for exponents in `-4..16` and
/// `d.ddde±XX` otherwise.
fn float_repr(v: f64) -> String {
    let sci = format!("{v:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(m) => ("-", m),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if (-4..16).contains(&exp) {
        let body = if exp < 0 {
            format!("0.{}{digits}", "0".repeat((-exp - 1) as usize))
        } else {
            let int_len = exp as usize + 1;
            if digits.len() <= int_len {
                format!("{digits}{}.0", "0".repeat(int_len - digits.len()))
            } else {
                format!("{}.{}", &digits[..int_len], &digits[int_len..])
            }
        };
        format!("{sign}{body}")
    } else {
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{sign}{mantissa}e{exp_sign}{:02}", exp.abs())
    }
}
