//! Config command - view and manage the DriveMirror configuration
//!
//! Provides the `drivemirror config` subcommands:
//! 1. `init`     - writes a default configuration file
//! 2. `show`     - prints the effective configuration (YAML or JSON)
//! 3. `set`      - sets one value via a dot-notation key
//! 4. `validate` - checks the configuration file and reports problems

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use drivemirror_core::config::Config;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Display the effective configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g. "mirror.copy_concurrency")
        key: String,
        /// New value
        value: String,
    },
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        match self {
            ConfigCommand::Init { force } => self.execute_init(config_path, *force, &*fmt),
            ConfigCommand::Show => self.execute_show(config_path, &*fmt, format),
            ConfigCommand::Set { key, value } => {
                self.execute_set(config_path, key, value, &*fmt, format)
            }
            ConfigCommand::Validate => self.execute_validate(config_path, &*fmt, format),
        }
    }

    fn execute_init(&self, config_path: &Path, force: bool, fmt: &dyn OutputFormatter) -> Result<()> {
        if config_path.exists() && !force {
            anyhow::bail!(
                "{} already exists; pass --force to overwrite it",
                config_path.display()
            );
        }

        write_config(config_path, &Config::default())?;
        info!(config_path = %config_path.display(), "wrote default configuration");

        fmt.success(&format!("wrote {}", config_path.display()));
        fmt.info("set auth.client_id to your application (client) ID before signing in");
        Ok(())
    }

    fn execute_show(
        &self,
        config_path: &Path,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        let config = Config::load_or_default(config_path);

        info!(config_path = %config_path.display(), "showing configuration");

        if matches!(format, OutputFormat::Json) {
            let json = serde_json::to_value(&config)
                .context("serializing the configuration to JSON")?;
            fmt.print_json(&json);
        } else {
            fmt.success(&format!("configuration ({})", config_path.display()));
            fmt.info("");
            let yaml =
                serde_yaml::to_string(&config).context("serializing the configuration to YAML")?;
            for line in yaml.lines() {
                fmt.info(line);
            }
        }
        Ok(())
    }

    fn execute_set(
        &self,
        config_path: &Path,
        key: &str,
        value: &str,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        let mut config = Config::load_or_default(config_path);

        info!(key, value, "setting configuration value");

        if let Err(err) = apply_config_value(&mut config, key, value) {
            fmt.error(&format!("cannot set '{key}': {err:#}"));
            fmt.info("");
            fmt.info("supported keys:");
            for key in SUPPORTED_KEYS {
                fmt.info(&format!("  {key}"));
            }
            anyhow::bail!("unsupported configuration change");
        }

        // Reject values the loader would later refuse.
        let problems = config.validate();
        if !problems.is_empty() {
            let messages: Vec<String> = problems.iter().map(ToString::to_string).collect();
            fmt.error(&format!(
                "invalid value for '{}': {}",
                key,
                messages.join("; ")
            ));
            anyhow::bail!("invalid configuration value");
        }

        write_config(config_path, &config)?;

        if matches!(format, OutputFormat::Json) {
            fmt.print_json(&serde_json::json!({
                "key": key,
                "value": value,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            fmt.success(&format!("set {key} = {value}"));
            fmt.info(&format!("saved to {}", config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(
        &self,
        config_path: &Path,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        if !config_path.exists() {
            fmt.info(&format!(
                "no configuration file at {}; defaults apply",
                config_path.display()
            ));
            fmt.info("run 'drivemirror config init' to create one");
            return Ok(());
        }

        let config = match Config::load(config_path) {
            Ok(config) => config,
            Err(err) => {
                if matches!(format, OutputFormat::Json) {
                    fmt.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("{err:#}")],
                    }));
                } else {
                    fmt.error(&format!("cannot parse {}: {err:#}", config_path.display()));
                }
                anyhow::bail!("configuration file is unreadable");
            }
        };

        let problems = config.validate();

        if matches!(format, OutputFormat::Json) {
            let errors: Vec<String> = problems.iter().map(ToString::to_string).collect();
            fmt.print_json(&serde_json::json!({
                "valid": problems.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": errors,
            }));
        } else if problems.is_empty() {
            fmt.success("configuration is valid");
            if config.auth.client_id.is_empty() {
                fmt.warn("auth.client_id is empty; sign-in will fail until it is set");
            }
        } else {
            fmt.error(&format!(
                "configuration has {} problem{}:",
                problems.len(),
                if problems.len() == 1 { "" } else { "s" }
            ));
            for problem in &problems {
                fmt.info(&format!("  {} - {}", problem.field, problem.message));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("configuration at {} is invalid", config_path.display())
        }
    }
}

fn write_config(config_path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("creating the configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("serializing the configuration")?;
    std::fs::write(config_path, yaml)
        .with_context(|| format!("writing {}", config_path.display()))?;
    Ok(())
}

const SUPPORTED_KEYS: &[&str] = &[
    "mirror.traversal_concurrency",
    "mirror.copy_concurrency",
    "mirror.whole_folder_threshold_mb",
    "mirror.conflict",
    "mirror.mode",
    "mirror.assume_complete_on_denied_progress",
    "polling.interval_secs",
    "auth.client_id",
    "auth.tenant",
    "auth.source_cache_file",
    "auth.dest_cache_file",
    "logging.level",
];

/// Applies a dot-notation key/value pair to a [`Config`].
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- mirror ---
        "mirror.traversal_concurrency" => {
            config.mirror.traversal_concurrency = value
                .parse::<usize>()
                .context("expected a positive integer")?;
        }
        "mirror.copy_concurrency" => {
            config.mirror.copy_concurrency = value
                .parse::<usize>()
                .context("expected a positive integer")?;
        }
        "mirror.whole_folder_threshold_mb" => {
            config.mirror.whole_folder_threshold_mb = value
                .parse::<u64>()
                .context("expected a size in mebibytes")?;
        }
        "mirror.conflict" => {
            config.mirror.conflict = value.parse().context("expected 'fail' or 'replace'")?;
        }
        "mirror.mode" => {
            config.mirror.mode = value
                .parse()
                .context("expected 'interleaved' or 'batched'")?;
        }
        "mirror.assume_complete_on_denied_progress" => {
            config.mirror.assume_complete_on_denied_progress =
                value.parse::<bool>().context("expected true or false")?;
        }

        // --- polling ---
        "polling.interval_secs" => {
            config.polling.interval_secs = value
                .parse::<u64>()
                .context("expected a positive integer")?;
        }

        // --- auth ---
        "auth.client_id" => {
            config.auth.client_id = value.to_string();
        }
        "auth.tenant" => {
            config.auth.tenant = value.to_string();
        }
        "auth.source_cache_file" => {
            config.auth.source_cache_file = optional_path(value);
        }
        "auth.dest_cache_file" => {
            config.auth.dest_cache_file = optional_path(value);
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }

        _ => {
            anyhow::bail!("unknown configuration key '{key}'");
        }
    }
    Ok(())
}

/// Empty string or "none" clears an optional path back to its default.
fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(PathBuf::from(value))
    }
}
