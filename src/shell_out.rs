//! Command execution helpers for concrete providers
//!
//! Providers inspect and mutate the system by running commands. Output is
//! captured, and by default the locale is forced so that parsers in
//! providers see stable, untranslated messages.

use crate::error::ConvergeError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::{Command, Output};

/// Default locale forced on commands
pub const DEFAULT_LOCALE: &str = "C";

/// Shell helper settings, usually from the `[shell_out]` config table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellOutConfig {
    /// Value for `LC_ALL` in `shell_out`
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Extra environment for every command
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

impl Default for ShellOutConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            environment: BTreeMap::new(),
        }
    }
}

/// Captured result of a command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code; `None` when terminated by a signal
    pub status: Option<i32>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            status: output.status.code(),
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Runs commands with a fixed configuration
#[derive(Debug, Clone, Copy)]
pub struct ShellOut<'a> {
    config: &'a ShellOutConfig,
}

impl<'a> ShellOut<'a> {
    pub fn new(config: &'a ShellOutConfig) -> Self {
        Self { config }
    }

    /// Run with the configured locale; a non-zero exit is not an error
    pub fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        self.execute(cmd, args, Some(&self.config.locale))
    }

    /// Run with the configured locale and fail on a non-zero exit
    pub fn run_checked(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(cmd, args)?;
        if !output.success {
            return Err(ConvergeError::CommandFailed {
                command: command_line(cmd, args),
                status: output
                    .status
                    .map_or_else(|| "signal".to_string(), |code| code.to_string()),
                stderr: output.stderr_str().trim().to_string(),
            }
            .into());
        }
        Ok(output)
    }

    /// Run with the caller's locale untouched
    pub fn run_with_systems_locale(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        self.execute(cmd, args, None)
    }

    fn execute(&self, cmd: &str, args: &[&str], locale: Option<&str>) -> Result<CommandOutput> {
        let mut command = Command::new(cmd);
        command.args(args).envs(&self.config.environment);
        if let Some(locale) = locale {
            command.env("LC_ALL", locale);
        }

        log::debug!("Running: {}", command_line(cmd, args));
        let output = command
            .output()
            .with_context(|| format!("Failed to execute: {}", command_line(cmd, args)))?;

        Ok(output.into())
    }
}

fn command_line(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args.join(" "))
    }
}
