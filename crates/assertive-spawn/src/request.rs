//! Launch requests.
//!
//! A [`LaunchRequest`] is forwarded to the launcher untouched. It can be built
//! in code or loaded from YAML:
//!
//! ```yaml
//! command: bash
//! args: ["-c", "exit 3"]
//! working_directory: /tmp
//! environment:
//!   RUST_LOG: debug
//! stdout: piped
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

/// What to connect a child's standard stream to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioMode {
    /// Share the parent's stream.
    #[default]
    Inherit,
    /// Create a pipe; the caller takes it from the process handle.
    Piped,
    /// Connect to the null device.
    Null,
}

impl From<StdioMode> for Stdio {
    fn from(mode: StdioMode) -> Self {
        match mode {
            StdioMode::Inherit => Stdio::inherit(),
            StdioMode::Piped => Stdio::piped(),
            StdioMode::Null => Stdio::null(),
        }
    }
}

/// Command plus the configuration it is launched with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Start from an empty environment instead of the parent's.
    #[serde(default)]
    pub clear_env: bool,
    #[serde(default)]
    pub stdin: StdioMode,
    #[serde(default)]
    pub stdout: StdioMode,
    #[serde(default)]
    pub stderr: StdioMode,
}

impl LaunchRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_directory: None,
            environment: HashMap::new(),
            clear_env: false,
            stdin: StdioMode::default(),
            stdout: StdioMode::default(),
            stderr: StdioMode::default(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn stdin(mut self, mode: StdioMode) -> Self {
        self.stdin = mode;
        self
    }

    pub fn stdout(mut self, mode: StdioMode) -> Self {
        self.stdout = mode;
        self
    }

    pub fn stderr(mut self, mode: StdioMode) -> Self {
        self.stderr = mode;
        self
    }

    /// Load a launch request from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!("Failed to read launch request file: {}", path.as_ref().display())
        })?;

        Self::load_from_string(&content)
    }

    /// Load a launch request from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let request: LaunchRequest =
            serde_yaml::from_str(content).context("Failed to parse YAML launch request")?;

        request.validate()?;
        Ok(request)
    }

    /// Checks applied to file-based requests. The engine itself leaves
    /// legality checks to the launcher.
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(anyhow!("Launch request command cannot be empty"));
        }

        if let Some(key) = self
            .environment
            .keys()
            .find(|key| key.is_empty() || key.contains('='))
        {
            return Err(anyhow!("Invalid environment variable name: '{}'", key));
        }

        Ok(())
    }
}
