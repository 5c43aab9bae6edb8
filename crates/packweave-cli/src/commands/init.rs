//! `packweave init` writes a default configuration file.

use std::path::{Path, PathBuf};

use crate::{
    cli::InitArgs,
    config::{AppConfig, LOCAL_CONFIG_FILE},
    error::{CliError, CliResult, IntoCli},
    output::OutputManager,
};

/// Write the built-in defaults as TOML.
pub fn execute(args: InitArgs, output: OutputManager) -> CliResult<()> {
    let target = target_path(args.local);

    if target.exists() && !args.force {
        output.warning(&format!(
            "Config already exists at {}  (use --force to overwrite)",
            target.display(),
        ))?;
        return Ok(());
    }

    write_default(&target)?;
    output.success(&format!("Configuration created at {}", target.display()))?;
    Ok(())
}

fn target_path(local: bool) -> PathBuf {
    if local {
        PathBuf::from(LOCAL_CONFIG_FILE)
    } else {
        AppConfig::config_path()
    }
}

fn write_default(path: &Path) -> CliResult<()> {
    let text = toml::to_string_pretty(&AppConfig::default()).map_err(|e| CliError::ConfigError {
        message: format!("Failed to serialise default config: {e}"),
        source: Some(Box::new(e)),
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_cli_context(|| format!("Failed to create config directory '{}'", parent.display()))?;
    }
    std::fs::write(path, text)
        .with_cli_context(|| format!("Failed to write config to '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_target_is_dotfile() {
        assert_eq!(target_path(true), PathBuf::from(".packweave.toml"));
    }

    #[test]
    fn written_default_loads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        write_default(&path).unwrap();

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }
}
