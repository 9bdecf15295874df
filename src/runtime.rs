use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tempfile::TempPath;

use crate::errors::BenchError;
use crate::probe::MARKER;
use crate::types::SampleDescriptor;

/// How a sample is turned into a child process.
pub trait SampleRuntime {
    fn name(&self) -> &str;

    /// Command that runs `sample` in a fresh process. Stdio is configured by the runner.
    fn command(&self, sample: &SampleDescriptor) -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeKind {
    /// JavaScript samples under Node.js, heap read from V8 inside the child
    #[default]
    Node,
    /// Run the sample directly or through an interpreter; the sample prints its own probe line
    Exec,
}

/// Runs JavaScript samples through `node --require <preload> <sample>`.
///
/// The sample stays the entry module, so `require.main === module` holds for it
/// exactly as under a plain `node sample.js`. The preload hooks process exit,
/// reads V8 heap statistics in the child and writes the probe line synchronously
/// to fd 1. The preload file lives as long as the runtime.
pub struct NodeRuntime {
    pub node_binary: PathBuf,
    preload: TempPath,
}

impl NodeRuntime {
    pub fn new(node_binary: impl Into<PathBuf>) -> Result<Self, BenchError> {
        let setup_err = |source: std::io::Error| BenchError::RuntimeSetup {
            runtime: "node".to_string(),
            source,
        };

        let mut file = tempfile::Builder::new()
            .prefix("samplebench-preload-")
            .suffix(".cjs")
            .tempfile()
            .map_err(setup_err)?;
        file.write_all(node_bootstrap().as_bytes())
            .map_err(setup_err)?;
        file.as_file().sync_all().map_err(setup_err)?;

        Ok(Self {
            node_binary: node_binary.into(),
            preload: file.into_temp_path(),
        })
    }

    pub fn preload_path(&self) -> &Path {
        &self.preload
    }
}

pub fn node_bootstrap() -> String {
    format!(
        r#"const fs = require("fs");
const v8 = require("v8");
process.on("exit", () => {{
  const s = v8.getHeapStatistics();
  fs.writeSync(1, "\n{marker} " + JSON.stringify({{ heap_used_bytes: s.used_heap_size, heap_total_bytes: s.total_heap_size }}) + "\n");
}});
"#,
        marker = MARKER
    )
}

impl SampleRuntime for NodeRuntime {
    fn name(&self) -> &str {
        "node"
    }

    fn command(&self, sample: &SampleDescriptor) -> Command {
        let mut cmd = Command::new(&self.node_binary);
        cmd.arg("--require").arg(self.preload_path()).arg(&sample.path);
        cmd
    }
}

/// Runs `program args... <sample>`, or the sample file itself when `program` is `None`.
pub struct ExecRuntime {
    pub program: Option<String>,
    pub args: Vec<String>,
}

impl SampleRuntime for ExecRuntime {
    fn name(&self) -> &str {
        "exec"
    }

    fn command(&self, sample: &SampleDescriptor) -> Command {
        match &self.program {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.args(&self.args).arg(&sample.path);
                cmd
            }
            None => {
                let mut cmd = Command::new(&sample.path);
                cmd.args(&self.args);
                cmd
            }
        }
    }
}
