use crate::averager::{FieldRule, LineFieldAverager};
use crate::template;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from benchavg.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Base directory that relative series directories are resolved against.
    pub root: PathBuf,
    /// Abort on the first log that cannot be averaged.
    pub strict: bool,
    pub series: Vec<SeriesConfig>,
}

/// One experiment variant: a family of logs sharing a naming convention and
/// line layout, collected across several benchmark directories.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SeriesConfig {
    /// Report name template; `{dir}` is the directory base name.
    pub name: String,
    /// Log file name template; `{n}` is the thread/partition count.
    pub file: String,
    /// Benchmark directories, glob patterns allowed.
    pub directories: Vec<String>,
    pub counts: Counts,
    /// 1-based line numbers to average.
    pub lines: Vec<usize>,
    pub delimiter: String,
    pub strip_percent: bool,
}

/// Thread/partition counts, either an inclusive range or an explicit list.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Counts {
    Range { start: u32, end: u32 },
    List(Vec<u32>),
}

// --- Default implementations ---

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            strict: false,
            series: Vec::new(),
        }
    }
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            name: "{dir}".to_string(),
            file: "log_t{n}.txt".to_string(),
            directories: Vec::new(),
            counts: Counts::default(),
            lines: Vec::new(),
            delimiter: ":".to_string(),
            strip_percent: true,
        }
    }
}

impl Default for Counts {
    fn default() -> Self {
        Counts::Range { start: 2, end: 20 }
    }
}

impl Counts {
    /// The counts in iteration order.
    pub fn values(&self) -> Vec<u32> {
        match self {
            Counts::Range { start, end } => (*start..=*end).collect(),
            Counts::List(list) => list.clone(),
        }
    }
}

impl SeriesConfig {
    pub fn rule(&self) -> FieldRule {
        FieldRule {
            delimiter: self.delimiter.clone(),
            strip_percent: self.strip_percent,
        }
    }

    pub fn averager(&self) -> LineFieldAverager {
        LineFieldAverager::new(self.lines.iter().copied()).with_rule(self.rule())
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(format!("series #{index}: {msg}")));

        if self.directories.is_empty() {
            return invalid("no directories".to_string());
        }
        if self.lines.is_empty() {
            return invalid("no target lines".to_string());
        }
        if self.lines.contains(&0) {
            return invalid("line numbers start at 1".to_string());
        }
        if self.delimiter.is_empty() {
            return invalid("empty delimiter".to_string());
        }
        match &self.counts {
            Counts::Range { start, end } if start > end => {
                return invalid(format!("count range {start}..={end} is empty"));
            }
            Counts::List(list) if list.is_empty() => {
                return invalid("empty count list".to_string());
            }
            _ => {}
        }

        let file_keys = template::placeholders(&self.file);
        if !file_keys.contains(&"n") {
            return invalid(format!("file template \"{}\" lacks {{n}}", self.file));
        }
        if let Some(key) = file_keys.iter().find(|k| **k != "n") {
            return invalid(format!("file template uses unknown placeholder {{{key}}}"));
        }
        if let Some(key) = template::placeholders(&self.name)
            .iter()
            .find(|k| **k != "dir")
        {
            return invalid(format!("name template uses unknown placeholder {{{key}}}"));
        }
        Ok(())
    }
}

impl BenchConfig {
    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.series.is_empty() {
            return Err(ConfigError::Invalid("no [[series]] defined".to_string()));
        }
        for (i, s) in self.series.iter().enumerate() {
            s.validate(i + 1)?;
        }
        Ok(())
    }
}

/// Read, parse and validate a config file.
pub fn load(path: &Path) -> Result<BenchConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: BenchConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Starter config reproducing the three thread-scaling experiments.
pub const STARTER_CONFIG: &str = "\
# benchavg configuration
# Each [[series]] yields one averaged list per directory.

root = \".\"

[[series]]
name = \"{dir}_original_tbb_ftask\"
file = \"tbb_log_t{n}.txt\"
directories = [\"des_perf\", \"vga_lcd\", \"tv80\", \"wb_dma\", \"aes_core\", \"ac97_ctrl\"]
counts = { start = 2, end = 20 }
lines = [3, 5, 7, 9, 11, 13, 15, 17, 19, 21]
strip_percent = false

[[series]]
name = \"{dir}_pbtask_only\"
file = \"pbtask_only_log_t{n}_p{n}.txt\"
directories = [\"des_perf\", \"vga_lcd\", \"tv80\", \"wb_dma\", \"aes_core\", \"ac97_ctrl\"]
counts = { start = 2, end = 20 }
lines = [15, 31, 47, 63, 79, 95, 111, 127, 143, 159]

[[series]]
name = \"{dir}_2queue_pftask_only\"
file = \"2_queue_pftask_only_log_p{n}.txt\"
directories = [\"des_perf\", \"vga_lcd\", \"tv80\", \"wb_dma\", \"aes_core\", \"ac97_ctrl\"]
counts = { start = 2, end = 20 }
lines = [15, 31, 47, 63, 79, 95, 111, 127, 143, 159]
";

/// Write the starter config to `path`. Never overwrites an existing file.
pub fn init(path: &Path) -> Result<(), ConfigError> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => ConfigError::Exists(path.to_path_buf()),
            _ => ConfigError::Write {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
    file.write_all(STARTER_CONFIG.as_bytes())
        .map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Errors from loading or writing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
    Exists(PathBuf),
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
            ConfigError::Exists(path) => {
                write!(f, "{} already exists, not overwriting", path.display())
            }
            ConfigError::Write { path, source } => {
                write!(f, "failed to write config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Write { source, .. } => Some(source),
            ConfigError::Invalid(_) | ConfigError::Exists(_) => None,
        }
    }
}
