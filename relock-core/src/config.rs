use crate::error::{RelockError, Result};
use crate::models::{Invocation, LockMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PROJECT_DIR: &str = "/vercel/share/v0-project";
pub const DEFAULT_PROGRAM: &str = "npm";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Runner settings. Every field has a default, so an empty TOML file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    pub project_dir: PathBuf,
    pub program: String,
    pub mode: LockMode,
    pub timeout_secs: u64,
    /// Treat a non-zero exit from the package manager as a failed run
    pub fail_on_nonzero: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from(DEFAULT_PROJECT_DIR),
            program: DEFAULT_PROGRAM.to_string(),
            mode: LockMode::LockfileOnly,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            fail_on_nonzero: false,
        }
    }
}

/// Command-line values layered on top of the file/defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project_dir: Option<PathBuf>,
    pub program: Option<String>,
    pub mode: Option<LockMode>,
    pub timeout_secs: Option<u64>,
    pub fail_on_nonzero: Option<bool>,
}

impl RunnerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RunnerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Defaults, then the optional file, then `overrides`
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(dir) = overrides.project_dir {
            self.project_dir = dir;
        }
        if let Some(program) = overrides.program {
            self.program = program;
        }
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(fail) = overrides.fail_on_nonzero {
            self.fail_on_nonzero = fail;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(RelockError::InvalidConfiguration(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.program.trim().is_empty() {
            return Err(RelockError::InvalidConfiguration(
                "program must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.program.clone(), self.mode.args(), self.project_dir.clone())
            .with_timeout(self.timeout())
    }
}
