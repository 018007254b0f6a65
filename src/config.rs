//! Composition file parsing and structures
//!
//! A YAML document names the sources to mount and how each one is wrapped.
//! [`Config::build`] turns it into a ready [`MergeFilesystem`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::adapter::{
    spooling_factory, FactoryRegistry, MergeFilesystem, RandomAccessFilesystem,
    RecursiveMountFilesystem,
};
use crate::env::substitute_env_vars;
use crate::error::VfsError;
use crate::filesystem::dir::DirFs;
use crate::filesystem::Filesystem;
use crate::path;

// =============================================================================
// Raw Config (Deserialized from YAML)
// =============================================================================

/// Raw configuration as deserialized from YAML.
/// This is converted to `Config` via `resolve()`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory for random-access scratch files
    pub scratch_dir: Option<PathBuf>,

    /// Wrapping defaults applied to every mount
    #[serde(default)]
    pub defaults: MountDefaults,

    /// Sources to mount, in listing order
    pub mounts: Vec<RawMountConfig>,
}

/// Top-level wrapping defaults
#[derive(Debug, Clone, Deserialize)]
pub struct MountDefaults {
    /// Descend into container files
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Spool sequential handles so they support positional reads
    #[serde(default = "default_true")]
    pub random_access: bool,

    /// Container discriminators, extension with the leading dot
    #[serde(default = "default_containers")]
    pub containers: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_containers() -> Vec<String> {
    vec![".zip".to_string()]
}

impl Default for MountDefaults {
    fn default() -> Self {
        Self {
            recursive: true,
            random_access: true,
            containers: default_containers(),
        }
    }
}

/// Raw mount configuration before resolution
#[derive(Debug, Clone, Deserialize)]
pub struct RawMountConfig {
    /// Name of the mount at the root of the merged namespace
    pub key: String,

    /// Where the mount's content comes from
    pub source: SourceConfig,

    /// Overrides for the top-level defaults
    pub recursive: Option<bool>,
    pub random_access: Option<bool>,
    pub containers: Option<Vec<String>>,
}

/// Source of a mount (tagged enum)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Local directory tree
    Directory { path: PathBuf },

    /// Local zip archive
    Zip { path: PathBuf },
}

// =============================================================================
// Resolved Config (Ready for use)
// =============================================================================

/// Top-level configuration (resolved from RawConfig)
#[derive(Debug, Clone)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Directory for random-access scratch files
    pub scratch_dir: PathBuf,

    /// Mounts (fully resolved)
    pub mounts: Vec<MountConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Mount configuration (resolved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    pub key: String,
    pub source: SourceConfig,
    pub recursive: bool,
    pub random_access: bool,
    pub containers: Vec<String>,
}

// =============================================================================
// Resolution Logic
// =============================================================================

impl RawConfig {
    /// Resolve raw config into final config by merging mount overrides with defaults
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let RawConfig {
            logging,
            scratch_dir,
            defaults,
            mounts,
        } = self;

        let mounts = mounts
            .into_iter()
            .map(|raw| MountConfig {
                key: raw.key,
                source: raw.source,
                recursive: raw.recursive.unwrap_or(defaults.recursive),
                random_access: raw.random_access.unwrap_or(defaults.random_access),
                containers: raw
                    .containers
                    .unwrap_or_else(|| defaults.containers.clone()),
            })
            .collect();

        Ok(Config {
            logging,
            scratch_dir: scratch_dir.unwrap_or_else(std::env::temp_dir),
            mounts,
        })
    }
}

/// Container discriminators this build knows how to open
pub fn known_containers() -> FactoryRegistry {
    #[allow(unused_mut)]
    let mut factories = FactoryRegistry::new();
    #[cfg(feature = "zip")]
    factories.insert(
        crate::filesystem::zip::ZIP_EXT.to_string(),
        crate::filesystem::zip::zip_factory(),
    );
    factories
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string, substituting `${VAR}` references first
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let content = substitute_env_vars(content)?;
        let raw: RawConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        raw.resolve()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mounts.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one mount is required".to_string(),
            ));
        }

        let known = known_containers();
        let mut keys = HashSet::new();
        for mount in &self.mounts {
            if mount.key == path::ROOT || !path::valid_path(&mount.key) || mount.key.contains('/')
            {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid mount key {:?}: must be a single path segment",
                    mount.key
                )));
            }
            if !keys.insert(mount.key.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate mount key: {:?}",
                    mount.key
                )));
            }
            if mount.recursive {
                for container in &mount.containers {
                    if !known.contains_key(container) {
                        return Err(ConfigError::ValidationError(format!(
                            "Mount {:?}: unknown container type {:?}",
                            mount.key, container
                        )));
                    }
                }
            }
            if let SourceConfig::Zip { .. } = mount.source {
                if !known.contains_key(".zip") {
                    return Err(ConfigError::ValidationError(format!(
                        "Mount {:?}: zip support is not compiled in",
                        mount.key
                    )));
                }
            }
        }

        Ok(())
    }

    /// Validate, then assemble the merged filesystem
    pub fn build(&self) -> crate::Result<MergeFilesystem> {
        self.validate()?;

        let merge = MergeFilesystem::new();
        for mount in &self.mounts {
            let fs = self.build_mount(mount)?;
            merge.add(mount.key.clone(), fs);
        }
        info!("Composed {} mounts", merge.len());
        Ok(merge)
    }

    fn build_mount(&self, mount: &MountConfig) -> crate::Result<Arc<dyn Filesystem>> {
        let mut fs = open_source(&mount.source)?;

        if mount.random_access {
            fs = Arc::new(RandomAccessFilesystem::new(fs, self.scratch_dir.clone()));
        }

        if mount.recursive {
            let mut known = known_containers();
            known.retain(|ext, _| mount.containers.contains(ext));
            if mount.random_access {
                for factory in known.values_mut() {
                    *factory = spooling_factory(Arc::clone(factory), self.scratch_dir.clone());
                }
            }
            fs = Arc::new(RecursiveMountFilesystem::new(fs, known));

            if mount.random_access {
                fs = Arc::new(RandomAccessFilesystem::new(fs, self.scratch_dir.clone()));
            }
        }

        info!(
            "Mount {:?}: {:?} (recursive: {}, random access: {})",
            mount.key, mount.source, mount.recursive, mount.random_access
        );
        Ok(fs)
    }
}

fn open_source(source: &SourceConfig) -> crate::Result<Arc<dyn Filesystem>> {
    match source {
        SourceConfig::Directory { path } => {
            if !path.is_dir() {
                return Err(VfsError::Config(format!(
                    "Source directory {:?} does not exist",
                    path
                )));
            }
            Ok(Arc::new(DirFs::new(path.clone())))
        }
        #[cfg(feature = "zip")]
        SourceConfig::Zip { path } => Ok(Arc::new(crate::filesystem::zip::ZipFs::from_path(path)?)),
        #[cfg(not(feature = "zip"))]
        SourceConfig::Zip { path } => Err(VfsError::Config(format!(
            "Cannot open {:?}: zip support is not compiled in",
            path
        ))),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for VfsError {
    fn from(err: ConfigError) -> Self {
        VfsError::Config(err.to_string())
    }
}
