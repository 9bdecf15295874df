//! Configuration loading from samplebench.toml
//!
//! Looked up in this order: an explicit `--config` path, a `samplebench.toml`
//! found by walking up from the current directory, then
//! `<config dir>/samplebench/config.toml`. Relative paths inside a file resolve
//! against that file's directory. Command-line flags override whatever is
//! loaded and stay relative to the current directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::BenchError;
use crate::runner::DEFAULT_MAX_OUTPUT_BYTES;
use crate::runtime::RuntimeKind;

pub const CONFIG_FILE_NAME: &str = "samplebench.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BenchConfig {
    #[serde(default)]
    pub samples: SamplesConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplesConfig {
    /// Directory scanned for samples
    #[serde(default = "default_samples_dir")]
    pub directory: PathBuf,
    /// File extensions to pick up; empty accepts every file
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Fixed sample list; when non-empty it replaces scanning and sets the order
    #[serde(default)]
    pub include: Vec<String>,
}

impl Default for SamplesConfig {
    fn default() -> Self {
        Self {
            directory: default_samples_dir(),
            extensions: default_extensions(),
            include: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Per-sample timeout (e.g., "60s", "500ms")
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default)]
    pub runtime: RuntimeKind,
    #[serde(default = "default_node_binary")]
    pub node_binary: PathBuf,
    /// Interpreter for the exec runtime; unset runs the sample file itself
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Cap on captured bytes per output stream
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            runtime: RuntimeKind::default(),
            node_binary: default_node_binary(),
            program: None,
            args: Vec::new(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_samples_dir() -> PathBuf {
    PathBuf::from("samples")
}
fn default_extensions() -> Vec<String> {
    vec!["js".to_string()]
}
fn default_timeout() -> String {
    "60s".to_string()
}
fn default_node_binary() -> PathBuf {
    PathBuf::from("node")
}
fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}
fn default_output_path() -> PathBuf {
    PathBuf::from("data/performance_metrics.csv")
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let raw = std::fs::read_to_string(path).map_err(|source| BenchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|e| BenchError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.rebase(base);
        }
        Ok(config)
    }

    /// Relative paths in a config file are relative to the file's directory.
    fn rebase(&mut self, base: &Path) {
        if self.samples.directory.is_relative() {
            self.samples.directory = base.join(&self.samples.directory);
        }
        if self.output.path.is_relative() {
            self.output.path = base.join(&self.output.path);
        }
    }

    /// Explicit path if given, otherwise discovery, otherwise defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, BenchError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let cwd = std::env::current_dir().ok();
        let found = cwd
            .as_deref()
            .and_then(find_upwards)
            .or_else(user_config_path);
        match found {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn timeout(&self) -> Result<Duration, BenchError> {
        let timeout = parse_duration(&self.runner.timeout)?;
        if timeout.is_zero() {
            return Err(BenchError::InvalidTimeout);
        }
        Ok(timeout)
    }

    /// Commented default configuration, as printed by `samplebench init`.
    pub fn default_toml() -> String {
        r#"# samplebench configuration

[samples]
# Directory scanned for samples (sorted by file name)
directory = "samples"
# Extensions to pick up; an empty list accepts every file
extensions = ["js"]
# Fixed list of sample file names, run in this order (uncomment to enable)
# include = ["simpleLoop.js", "complexCalculation.js", "functionCalls.js"]

[runner]
# Per-sample timeout; the sample is killed and reported as a failure
timeout = "60s"
# "node" runs JavaScript samples and reads V8 heap statistics in the child
# "exec" runs the sample (or `program`) directly; the sample prints its own probe line
runtime = "node"
node_binary = "node"
# Interpreter for the exec runtime (uncomment to enable)
# program = "sh"
# args = []
# Cap on captured bytes per output stream
max_output_bytes = 1048576

[output]
path = "data/performance_metrics.csv"
"#
        .to_string()
    }
}

fn find_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("samplebench").join("config.toml");
    path.is_file().then_some(path)
}

/// Parse a duration string such as "3s", "500ms" or "2m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, BenchError> {
    let invalid = |detail: &str| BenchError::InvalidDuration {
        value: s.to_string(),
        detail: detail.to_string(),
    };

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty duration"));
    }

    let (num_part, unit_part) = trimmed
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| trimmed.split_at(i))
        .unwrap_or((trimmed, "s"));

    let value: f64 = num_part
        .trim()
        .parse()
        .map_err(|_| invalid("not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid("must be a non-negative number"));
    }

    let nanos_per_unit: f64 = match unit_part.to_lowercase().as_str() {
        "ns" => 1.0,
        "us" | "µs" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        "m" | "min" => 60_000_000_000.0,
        _ => return Err(invalid("unknown unit")),
    };

    Ok(Duration::from_nanos((value * nanos_per_unit) as u64))
}
