//! Phaser configuration stored under `.phaser/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Phaser configuration (TOML).
///
/// Missing fields default to values that drive the `claude` CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PhaserConfig {
    /// Directory for recorded cycles, relative to the repository root.
    pub runs_dir: PathBuf,

    pub executor: ExecutorConfig,

    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Agent executable, looked up on `PATH` when not absolute.
    pub program: String,
    /// Arguments placed before the prompt.
    pub args: Vec<String>,
    /// Flag added only when writes are allowed without approval prompts.
    pub write_flag: Option<String>,
    /// How the prompt reaches the process.
    pub prompt_input: PromptInput,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptInput {
    /// Append the prompt as the final argument.
    #[default]
    Argument,
    /// Write the prompt to the process's stdin.
    Stdin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// External command for `StoreKind::Command`, e.g. `["tasks", "--quiet"]`.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Rewrite checkbox markers in the task document itself.
    #[default]
    Document,
    /// Delegate each mutation to an external command.
    Command,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            args: vec!["-p".to_string()],
            write_flag: Some("--dangerously-skip-permissions".to_string()),
            prompt_input: PromptInput::Argument,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Document,
            command: Vec::new(),
        }
    }
}

impl Default for PhaserConfig {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from(".phaser/runs"),
            executor: ExecutorConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl PhaserConfig {
    pub fn validate(&self) -> Result<()> {
        if self.executor.program.trim().is_empty() {
            return Err(anyhow!("executor.program must not be empty"));
        }
        if self
            .executor
            .write_flag
            .as_deref()
            .is_some_and(|flag| flag.trim().is_empty())
        {
            return Err(anyhow!("executor.write_flag must not be empty when set"));
        }
        if self.store.kind == StoreKind::Command
            && (self.store.command.is_empty() || self.store.command[0].trim().is_empty())
        {
            return Err(anyhow!(
                "store.command must be a non-empty array when store.kind = \"command\""
            ));
        }
        if self.runs_dir.as_os_str().is_empty() {
            return Err(anyhow!("runs_dir must not be empty"));
        }
        Ok(())
    }
}

/// Default config location for a repository root.
pub fn default_config_path(root: &Path) -> PathBuf {
    root.join(".phaser").join("config.toml")
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PhaserConfig::default()`.
pub fn load_config(path: &Path) -> Result<PhaserConfig> {
    if !path.exists() {
        let cfg = PhaserConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PhaserConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
