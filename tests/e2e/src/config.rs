//! Composition file generation for e2e tests
//!
//! Mirrors the YAML accepted by `vfs_compose::config::Config`, so scenarios
//! can exercise the same path a deployment does: write the file, load it,
//! build the merged filesystem.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Top-level composition file
#[derive(Debug, Clone, Serialize)]
pub struct TestConfig {
    pub logging: LoggingConfig,
    pub scratch_dir: Option<PathBuf>,
    pub defaults: DefaultsConfig,
    pub mounts: Vec<MountConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DefaultsConfig {
    pub recursive: bool,
    pub random_access: bool,
    pub containers: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            random_access: true,
            containers: vec![".zip".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MountConfig {
    pub key: String,
    pub source: SourceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_access: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Directory { path: PathBuf },
    Zip { path: PathBuf },
}

impl TestConfig {
    /// Create a new configuration builder
    pub fn builder() -> TestConfigBuilder {
        TestConfigBuilder::new()
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write configuration to a file
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

/// Builder for test configurations
pub struct TestConfigBuilder {
    config: TestConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TestConfig {
                logging: LoggingConfig::default(),
                scratch_dir: None,
                defaults: DefaultsConfig::default(),
                mounts: Vec::new(),
            },
        }
    }

    pub fn logging_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn scratch_dir(mut self, dir: &Path) -> Self {
        self.config.scratch_dir = Some(dir.to_path_buf());
        self
    }

    pub fn recursive(mut self, enabled: bool) -> Self {
        self.config.defaults.recursive = enabled;
        self
    }

    pub fn random_access(mut self, enabled: bool) -> Self {
        self.config.defaults.random_access = enabled;
        self
    }

    pub fn add_mount(mut self, mount: MountConfig) -> Self {
        self.config.mounts.push(mount);
        self
    }

    /// Mount a local directory under `key` with default wrapping
    pub fn add_directory(self, key: &str, path: &Path) -> Self {
        self.add_mount(MountConfig {
            key: key.to_string(),
            source: SourceConfig::Directory {
                path: path.to_path_buf(),
            },
            recursive: None,
            random_access: None,
        })
    }

    /// Mount a local zip archive under `key` with default wrapping
    pub fn add_zip(self, key: &str, path: &Path) -> Self {
        self.add_mount(MountConfig {
            key: key.to_string(),
            source: SourceConfig::Zip {
                path: path.to_path_buf(),
            },
            recursive: None,
            random_access: None,
        })
    }

    pub fn build(self) -> TestConfig {
        self.config
    }
}
