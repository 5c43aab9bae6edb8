//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate never sees it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. `PACKWEAVE__<SECTION>__<KEY>` environment variables
//! 3. `--config FILE`, or else `./.packweave.toml` and the user config file
//! 4. Built-in defaults (always present)

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use packweave_core::domain::{
    PackId,
    transform::{JVM_MARKER, MULTIPLATFORM_MARKER},
};

/// Environment prefix; sections and keys are separated by `__`.
pub const ENV_PREFIX: &str = "PACKWEAVE";

/// Project-local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = ".packweave.toml";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default values for new projects.
    pub defaults: Defaults,
    /// Output settings.
    pub output: OutputConfig,
    /// Where packs come from.
    pub repository: RepositoryConfig,
    /// Marker packs that switch on the path layouts.
    pub transform: TransformConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    pub group: String,
    /// Packs used when `new` gets no `--pack`.
    #[serde(default)]
    pub packs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub no_color: bool,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packs_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    pub multiplatform_marker: String,
    pub jvm_marker: String,
}

impl TransformConfig {
    /// Parse both markers as pack ids.
    pub fn markers(&self) -> anyhow::Result<(PackId, PackId)> {
        let parse = |raw: &str| {
            PackId::parse(raw).map_err(|e| anyhow::anyhow!("invalid transform marker '{raw}': {e}"))
        };
        Ok((parse(&self.multiplatform_marker)?, parse(&self.jvm_marker)?))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: Defaults {
                group: "com.example".into(),
                packs: Vec::new(),
            },
            output: OutputConfig {
                no_color: false,
                format: "auto".into(),
            },
            repository: RepositoryConfig::default(),
            transform: TransformConfig {
                multiplatform_marker: format!("{}:{}", MULTIPLATFORM_MARKER.0, MULTIPLATFORM_MARKER.1),
                jvm_marker: format!("{}:{}", JVM_MARKER.0, JVM_MARKER.1),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from every source.
    ///
    /// `config_file` is the path the user passed via `--config`; unlike the
    /// implicit locations it must exist.
    pub fn load(config_file: Option<&PathBuf>) -> anyhow::Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match config_file {
            Some(path) => {
                builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
            }
            None => {
                builder = builder
                    .add_source(
                        File::from(Self::config_path().as_path())
                            .format(FileFormat::Toml)
                            .required(false),
                    )
                    .add_source(
                        File::from(Path::new(LOCAL_CONFIG_FILE))
                            .format(FileFormat::Toml)
                            .required(false),
                    );
            }
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("defaults.packs")
                    .try_parsing(true),
            )
            .build()?;
        let loaded: Self = config.try_deserialize()?;
        loaded.transform.markers()?;
        Ok(loaded)
    }

    /// Path to the default configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `.packweave.toml` in the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("org", "packweave", "packweave")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE))
    }

    /// Look up a dotted key such as `defaults.group`.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "defaults.group" => self.defaults.group.clone(),
            "defaults.packs" => self.defaults.packs.join(","),
            "output.no_color" => self.output.no_color.to_string(),
            "output.format" => self.output.format.clone(),
            "repository.packs_dir" => path_string(self.repository.packs_dir.as_deref()),
            "repository.archive" => path_string(self.repository.archive.as_deref()),
            "transform.multiplatform_marker" => self.transform.multiplatform_marker.clone(),
            "transform.jvm_marker" => self.transform.jvm_marker.clone(),
            _ => return None,
        };
        Some(value)
    }
}

fn path_string(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}
