use std::path::PathBuf;

/// Which part of the taxonomy an error belongs to. Drives the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Environment,
    Io,
    Interrupted,
}

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("Samples directory not found at {path}")]
    SamplesDirNotFound { path: PathBuf },

    #[error("Cannot read samples directory {path}: {source}")]
    SamplesDirUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No samples found in {path}")]
    NoSamplesFound { path: PathBuf },

    #[error("Sample {path} does not exist or is not a regular file")]
    SampleNotFound { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    #[error("Invalid duration '{value}': {detail}")]
    InvalidDuration { value: String, detail: String },

    #[error("Timeout must be greater than zero")]
    InvalidTimeout,

    #[error("Failed to spawn '{program}' for sample {sample}: {source}")]
    SpawnFailed {
        program: String,
        sample: String,
        source: std::io::Error,
    },

    #[error("Failed to prepare the {runtime} runtime: {source}")]
    RuntimeSetup {
        runtime: String,
        source: std::io::Error,
    },

    #[error("Failed to wait for sample {sample}: {source}")]
    WaitFailed {
        sample: String,
        source: std::io::Error,
    },

    #[error("Failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Interrupted; benchmark run aborted")]
    Interrupted,
}

impl BenchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BenchError::SamplesDirNotFound { .. }
            | BenchError::SamplesDirUnreadable { .. }
            | BenchError::NoSamplesFound { .. }
            | BenchError::SampleNotFound { .. }
            | BenchError::ConfigRead { .. }
            | BenchError::ConfigParse { .. }
            | BenchError::InvalidDuration { .. }
            | BenchError::InvalidTimeout => ErrorKind::Configuration,
            BenchError::SpawnFailed { .. }
            | BenchError::RuntimeSetup { .. }
            | BenchError::WaitFailed { .. } => ErrorKind::Environment,
            BenchError::ReportWrite { .. } => ErrorKind::Io,
            BenchError::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// Process exit code for this error: 130 for interruption (128 + SIGINT), 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Interrupted => 130,
            _ => 1,
        }
    }
}
