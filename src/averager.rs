/// Line-addressed field extraction: read the targeted lines of a benchmark
/// log, parse the `<label>:<value>` payload of each and average the results.
///
/// Logs ending in `.zst` are decompressed transparently.
use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// How a targeted line is turned into a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    /// Separator between label and value. A line must split into exactly two parts.
    pub delimiter: String,
    /// Strip trailing `%` signs from the value before parsing.
    pub strip_percent: bool,
}

impl Default for FieldRule {
    fn default() -> Self {
        Self {
            delimiter: ":".to_string(),
            strip_percent: true,
        }
    }
}

/// A number parsed from a targeted line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldValue {
    /// 1-based line number.
    pub line: usize,
    pub value: f64,
}

/// Why a targeted line did not contribute a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The line did not split into exactly two parts.
    Shape { parts: usize },
    /// The value part was not a finite number.
    NotNumeric { raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: SkipReason,
}

/// Everything pulled out of one pass over a log.
#[derive(Debug, Default)]
pub struct Extraction {
    pub values: Vec<FieldValue>,
    pub skipped: Vec<SkippedLine>,
}

impl Extraction {
    /// Arithmetic mean of the parsed values, `None` if nothing parsed.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().map(|v| v.value).sum();
        Some(sum / self.values.len() as f64)
    }
}

/// Averages a fixed set of target lines across log files.
#[derive(Debug, Clone)]
pub struct LineFieldAverager {
    target_lines: BTreeSet<usize>,
    rule: FieldRule,
}

impl LineFieldAverager {
    pub fn new(target_lines: impl IntoIterator<Item = usize>) -> Self {
        Self {
            target_lines: target_lines.into_iter().collect(),
            rule: FieldRule::default(),
        }
    }

    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn target_lines(&self) -> &BTreeSet<usize> {
        &self.target_lines
    }

    /// Read `path` once and return the mean of the targeted fields.
    pub fn average(&self, path: &Path) -> Result<f64, AverageError> {
        let extraction = self.extract_file(path)?;
        let mean = extraction.mean().ok_or_else(|| AverageError::EmptyResult {
            path: path.to_path_buf(),
            skipped: extraction.skipped.len(),
        })?;

        tracing::debug!(
            file = %path.display(),
            parsed = extraction.values.len(),
            skipped = extraction.skipped.len(),
            mean,
            "averaged log file"
        );
        Ok(mean)
    }

    /// Read `path` once and return the raw extraction without reducing it.
    pub fn extract_file(&self, path: &Path) -> Result<Extraction, AverageError> {
        let io_err = |source| AverageError::Io {
            path: path.to_path_buf(),
            source,
        };
        let reader = open_log(path).map_err(io_err)?;
        extract(reader, &self.target_lines, &self.rule).map_err(io_err)
    }
}

/// Average the targeted lines of `path` with the default field rule.
pub fn average(path: &Path, target_lines: &BTreeSet<usize>) -> Result<f64, AverageError> {
    average_with(path, target_lines, &FieldRule::default())
}

/// Average the targeted lines of `path` with an explicit field rule.
pub fn average_with(
    path: &Path,
    target_lines: &BTreeSet<usize>,
    rule: &FieldRule,
) -> Result<f64, AverageError> {
    LineFieldAverager {
        target_lines: target_lines.clone(),
        rule: rule.clone(),
    }
    .average(path)
}

/// Scan `reader` line by line and parse every targeted line.
///
/// Only targeted lines are decoded, so other lines may hold arbitrary bytes.
/// Reading stops after the highest target; targets past the end of input are
/// never seen. Lines that fail to parse are logged and recorded in
/// `Extraction::skipped`.
pub fn extract<R: BufRead>(
    mut reader: R,
    target_lines: &BTreeSet<usize>,
    rule: &FieldRule,
) -> std::io::Result<Extraction> {
    let mut out = Extraction::default();
    let Some(&last_target) = target_lines.last() else {
        return Ok(out);
    };

    let mut buf = Vec::new();
    let mut line_number = 0;
    while line_number < last_target {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;
        if !target_lines.contains(&line_number) {
            continue;
        }

        let result = match std::str::from_utf8(trim_newline(&buf)) {
            Ok(line) => parse_field(line, rule).map_err(|reason| (reason, line.to_string())),
            Err(_) => {
                let raw = String::from_utf8_lossy(trim_newline(&buf)).into_owned();
                Err((SkipReason::NotNumeric { raw: raw.clone() }, raw))
            }
        };

        match result {
            Ok(value) => out.values.push(FieldValue {
                line: line_number,
                value,
            }),
            Err((reason, text)) => {
                match &reason {
                    SkipReason::NotNumeric { raw } => tracing::warn!(
                        line = line_number,
                        raw = %raw,
                        "invalid number on target line, skipping"
                    ),
                    SkipReason::Shape { parts } => tracing::warn!(
                        line = line_number,
                        parts,
                        raw = %text,
                        "target line is not a label/value pair, skipping"
                    ),
                }
                out.skipped.push(SkippedLine {
                    line: line_number,
                    reason,
                });
            }
        }
    }

    Ok(out)
}

fn trim_newline(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

/// Parse the value half of a `<label><delimiter><value>` line.
pub fn parse_field(line: &str, rule: &FieldRule) -> Result<f64, SkipReason> {
    let parts: Vec<&str> = line.split(rule.delimiter.as_str()).collect();
    if parts.len() != 2 {
        return Err(SkipReason::Shape { parts: parts.len() });
    }

    let mut raw = parts[1].trim();
    if rule.strip_percent {
        raw = raw.trim_end_matches('%').trim_end();
    }

    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SkipReason::NotNumeric {
            raw: raw.to_string(),
        }),
    }
}

/// Open a log for line reading, decompressing `.zst` files on the fly.
fn open_log(path: &Path) -> std::io::Result<Box<dyn BufRead>> {
    let file = std::fs::File::open(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("zst") {
        let decoder = zstd::stream::read::Decoder::new(file)?;
        Ok(Box::new(std::io::BufReader::new(decoder)))
    } else {
        Ok(Box::new(std::io::BufReader::new(file)))
    }
}

#[derive(Debug)]
pub enum AverageError {
    /// The log could not be opened or read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// No targeted line produced a value.
    EmptyResult { path: PathBuf, skipped: usize },
}

impl std::fmt::Display for AverageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AverageError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            AverageError::EmptyResult { path, skipped } => write!(
                f,
                "no target line in {} produced a value ({skipped} skipped)",
                path.display()
            ),
        }
    }
}

impl std::error::Error for AverageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AverageError::Io { source, .. } => Some(source),
            AverageError::EmptyResult { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    fn targets(lines: &[usize]) -> BTreeSet<usize> {
        lines.iter().copied().collect()
    }

    #[test]
    fn test_averages_mixed_example() {
        let dir = TempDir::new().unwrap();
        let path = write_log(dir.path(), "log.txt", &["x", "foo:10", "foo:20%", "foo:bad"]);
        let mean = average(&path, &targets(&[2, 3, 4])).unwrap();
        assert!((mean - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_averages_well_formed_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            dir.path(),
            "log.txt",
            &["runtime: 1.5", "runtime: 2.5", "runtime: 4.0"],
        );
        let mean = average(&path, &targets(&[1, 2, 3])).unwrap();
        assert!((mean - 8.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_untargeted_lines_never_count() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            dir.path(),
            "log.txt",
            &["header", "t:1000", "t:2", "garbage:::", "t:4", "t:-999"],
        );
        let mean = average(&path, &targets(&[3, 5])).unwrap();
        assert!((mean - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_percent_suffix_is_stripped() {
        assert_eq!(parse_field("3:12.5%", &FieldRule::default()), Ok(12.5));
        assert_eq!(parse_field("util: 40 %", &FieldRule::default()), Ok(40.0));
    }

    #[test]
    fn test_percent_kept_when_rule_disables_stripping() {
        let rule = FieldRule {
            strip_percent: false,
            ..Default::default()
        };
        assert_eq!(
            parse_field("util:12.5%", &rule),
            Err(SkipReason::NotNumeric {
                raw: "12.5%".to_string()
            })
        );
    }

    #[test]
    fn test_wrong_shape_is_skipped() {
        let rule = FieldRule::default();
        assert_eq!(
            parse_field("no delimiter here", &rule),
            Err(SkipReason::Shape { parts: 1 })
        );
        assert_eq!(
            parse_field("a:b:3", &rule),
            Err(SkipReason::Shape { parts: 3 })
        );
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let rule = FieldRule::default();
        assert!(parse_field("x:NaN", &rule).is_err());
        assert!(parse_field("x:inf", &rule).is_err());
    }

    #[test]
    fn test_custom_delimiter() {
        let rule = FieldRule {
            delimiter: "=".to_string(),
            strip_percent: true,
        };
        assert_eq!(parse_field("speedup = 2.25", &rule), Ok(2.25));
    }

    #[test]
    fn test_malformed_lines_leave_numerator_and_denominator() {
        let dir = TempDir::new().unwrap();
        let path = write_log(dir.path(), "log.txt", &["a:2", "a:oops", "a:4", "a:1:2"]);
        let averager = LineFieldAverager::new([1, 2, 3, 4]);
        let extraction = averager.extract_file(&path).unwrap();
        assert_eq!(extraction.values.len(), 2);
        assert_eq!(extraction.skipped.len(), 2);
        assert_eq!(extraction.skipped[0].line, 2);
        assert_eq!(extraction.skipped[1].line, 4);
        assert_eq!(extraction.mean(), Some(3.0));
    }

    #[test]
    fn test_empty_target_set_is_empty_result() {
        let dir = TempDir::new().unwrap();
        let path = write_log(dir.path(), "log.txt", &["a:1", "a:2"]);
        let err = average(&path, &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, AverageError::EmptyResult { skipped: 0, .. }));
    }

    #[test]
    fn test_nothing_parses_is_empty_result() {
        let dir = TempDir::new().unwrap();
        let path = write_log(dir.path(), "log.txt", &["a:x", "b"]);
        let err = average(&path, &targets(&[1, 2])).unwrap_err();
        match err {
            AverageError::EmptyResult { path: p, skipped } => {
                assert_eq!(p, path);
                assert_eq!(skipped, 2);
            }
            other => panic!("expected EmptyResult, got {other:?}"),
        }
    }

    #[test]
    fn test_targets_past_end_of_file_are_not_found() {
        let dir = TempDir::new().unwrap();
        let path = write_log(dir.path(), "log.txt", &["a:6"]);
        let mean = average(&path, &targets(&[1, 50, 1000])).unwrap();
        assert_eq!(mean, 6.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = average(Path::new("/nonexistent/log.txt"), &targets(&[1])).unwrap_err();
        assert!(matches!(err, AverageError::Io { .. }));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/nonexistent/log.txt"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "a:1\r\na:3%\r\n").unwrap();
        let mean = average(&path, &targets(&[1, 2])).unwrap();
        assert_eq!(mean, 2.0);
    }

    #[test]
    fn test_reads_zstd_compressed_logs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt.zst");
        let compressed = zstd::encode_all("skip\nt:5\nt:7\n".as_bytes(), 3).unwrap();
        std::fs::write(&path, compressed).unwrap();
        let mean = average(&path, &targets(&[2, 3])).unwrap();
        assert_eq!(mean, 6.0);
    }

    #[test]
    fn test_extract_reports_line_numbers() {
        let input = "h\nv:1\nv:2\n";
        let ex = extract(input.as_bytes(), &targets(&[2, 3]), &FieldRule::default()).unwrap();
        assert_eq!(
            ex.values,
            vec![
                FieldValue { line: 2, value: 1.0 },
                FieldValue { line: 3, value: 2.0 }
            ]
        );
        assert!(ex.skipped.is_empty());
    }

    #[test]
    fn test_empty_result_display() {
        let err = AverageError::EmptyResult {
            path: PathBuf::from("des_perf/tbb_log_t2.txt"),
            skipped: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("des_perf/tbb_log_t2.txt"));
        assert!(msg.contains("3 skipped"));
    }

    #[test]
    fn test_non_utf8_untargeted_line_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, b"t:1\n banner \xff\xfe binary\nt:3\n").unwrap();
        let mean = average(&path, &targets(&[1, 3])).unwrap();
        assert_eq!(mean, 2.0);
    }

    #[test]
    fn test_bytes_after_last_target_are_not_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, b"t:1\nt:3\n\xff\n").unwrap();
        let mean = average(&path, &targets(&[1, 2])).unwrap();
        assert_eq!(mean, 2.0);
    }

    #[test]
    fn test_non_utf8_target_line_is_skipped() {
        let input: &[u8] = b"t:1\nt:\xff2\n";
        let ex = extract(input, &targets(&[1, 2]), &FieldRule::default()).unwrap();
        assert_eq!(ex.values.len(), 1);
        assert_eq!(ex.skipped.len(), 1);
        assert_eq!(ex.skipped[0].line, 2);
        assert!(matches!(ex.skipped[0].reason, SkipReason::NotNumeric { .. }));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.contents())
    }

    #[test]
    fn test_invalid_number_emits_warning() {
        let dir = TempDir::new().unwrap();
        let path = write_log(dir.path(), "log.txt", &["x", "foo:10", "foo:20%", "foo:bad"]);

        let (mean, logs) = with_captured_logs(|| average(&path, &targets(&[2, 3, 4])));
        assert_eq!(mean.unwrap(), 15.0);

        let records: Vec<&str> = logs.lines().collect();
        assert_eq!(records.len(), 1, "{logs}");
        assert!(records[0].contains("WARN"));
        assert!(records[0].contains("line=4"));
        assert!(records[0].contains("raw=bad"));
    }

    #[test]
    fn test_wrong_shape_emits_warning() {
        let input: &[u8] = b"a:1\nno pair here\n";
        let (ex, logs) = with_captured_logs(|| {
            extract(input, &targets(&[1, 2]), &FieldRule::default()).unwrap()
        });
        assert_eq!(ex.skipped.len(), 1);

        let records: Vec<&str> = logs.lines().collect();
        assert_eq!(records.len(), 1, "{logs}");
        assert!(records[0].contains("line=2"));
        assert!(records[0].contains("parts=1"));
        assert!(records[0].contains("no pair here"));
    }
}
