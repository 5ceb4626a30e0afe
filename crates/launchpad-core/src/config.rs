use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "repo.json";
pub const DEFAULT_INTERPRETER_ROOT: &str = "WPy";
pub const DEFAULT_INSTALLER_SCRIPT: &str = "install.py";

/// Declarative launcher settings, read once at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LauncherConfig {
    #[serde(default, alias = "use_pythonw")]
    pub use_alternate_binary: bool,
    #[serde(alias = "venv_folder")]
    pub environment_path: PathBuf,
    #[serde(default = "default_interpreter_root")]
    pub interpreter_root: PathBuf,
    #[serde(default = "default_installer_script")]
    pub installer_script: PathBuf,
}

impl LauncherConfig {
    pub fn new(environment_path: impl Into<PathBuf>) -> Self {
        Self {
            use_alternate_binary: false,
            environment_path: environment_path.into(),
            interpreter_root: default_interpreter_root(),
            installer_script: default_installer_script(),
        }
    }

    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_str(input).context("failed to parse launcher config json")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse launcher config toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, choosing TOML for a `.toml` extension and JSON otherwise.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read launcher config: {}", path.display()))?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            Self::from_toml_str(&raw)
        } else {
            Self::from_json_str(&raw)
        };
        parsed.with_context(|| format!("invalid launcher config: {}", path.display()))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.environment_path.as_os_str().is_empty() {
            return Err(anyhow!("environment_path must not be empty"));
        }
        if self.installer_script.as_os_str().is_empty() {
            return Err(anyhow!("installer_script must not be empty"));
        }
        Ok(())
    }
}

fn default_interpreter_root() -> PathBuf {
    PathBuf::from(DEFAULT_INTERPRETER_ROOT)
}

fn default_installer_script() -> PathBuf {
    PathBuf::from(DEFAULT_INSTALLER_SCRIPT)
}
