use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{SurfError, SurfResult};
use crate::search::input::{SelectionLimits, DEFAULT_MAX_ALLOWED_ALL};

/// Settings shared by every `surf` subcommand.
///
/// # Configuration Locations
///
/// Files are layered, later ones overriding earlier ones:
/// 1. Global `$CONFIG_DIR/surf/config.yaml`
/// 2. Local `.surf.yaml` in the current directory
/// 3. A file given with `--config`, which must exist
///
/// Command-line flags override all of them through [`SurfConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// # Concurrent workers per search (default: CPU cores)
/// parallel: 8
///
/// # Buckets or tables searched without a name pattern before --all is required
/// max_allowed_all_resources: 30
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
///
/// # Separator between strings found in protobuf blobs
/// proto_delimiter: " | "
///
/// fail_fast: false
/// vault_address: "https://vault.example.com:8200"
/// consul_address: "https://consul.example.com/ui/dc1"
/// region: "eu-west-1"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfConfig {
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    #[serde(default = "default_max_allowed_all")]
    pub max_allowed_all_resources: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_proto_delimiter")]
    pub proto_delimiter: String,

    #[serde(default)]
    pub fail_fast: bool,

    /// Used to build web links for secret-store matches
    #[serde(default)]
    pub vault_address: Option<String>,

    /// UI base used to build web links for key-value matches
    #[serde(default)]
    pub consul_address: Option<String>,

    #[serde(default)]
    pub region: Option<String>,
}

fn default_parallel() -> usize {
    num_cpus::get().max(1)
}

fn default_max_allowed_all() -> usize {
    DEFAULT_MAX_ALLOWED_ALL
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_proto_delimiter() -> String {
    " ".to_string()
}

impl Default for SurfConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            max_allowed_all_resources: default_max_allowed_all(),
            log_level: default_log_level(),
            proto_delimiter: default_proto_delimiter(),
            fail_fast: false,
            vault_address: None,
            consul_address: None,
            region: None,
        }
    }
}

/// Values given on the command line. `None` leaves the file value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub parallel: Option<usize>,
    pub log_level: Option<String>,
    pub fail_fast: Option<bool>,
    pub vault_address: Option<String>,
    pub consul_address: Option<String>,
    pub region: Option<String>,
}

impl SurfConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SurfResult<Self> {
        Self::load_from(None)
    }

    /// Loads the default locations, then `config_path` on top.
    pub fn load_from(config_path: Option<&Path>) -> SurfResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("surf/config.yaml")),
            Some(PathBuf::from(".surf.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(SurfError::config_error(format!(
                    "config file '{}' does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        let config: SurfConfig = builder.build()?.try_deserialize()?;
        config.validate()
    }

    fn validate(mut self) -> SurfResult<Self> {
        if self.parallel == 0 {
            self.parallel = 1;
        }
        if self.proto_delimiter.is_empty() {
            return Err(SurfError::config_error("proto_delimiter must not be empty"));
        }
        Ok(self)
    }

    /// Command-line values take precedence over file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(parallel) = cli.parallel {
            self.parallel = parallel.max(1);
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        if let Some(fail_fast) = cli.fail_fast {
            self.fail_fast = fail_fast;
        }
        if cli.vault_address.is_some() {
            self.vault_address = cli.vault_address;
        }
        if cli.consul_address.is_some() {
            self.consul_address = cli.consul_address;
        }
        if cli.region.is_some() {
            self.region = cli.region;
        }
        self
    }

    pub fn selection_limits(&self, allow_all: bool) -> SelectionLimits {
        SelectionLimits {
            allow_all,
            max_allowed_all: self.max_allowed_all_resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            parallel: 4
            max_allowed_all_resources: 10
            log_level: "debug"
            proto_delimiter: ","
            fail_fast: true
            vault_address: "https://vault.local:8200"
            region: "eu-west-1"
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = SurfConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.parallel, 4);
        assert_eq!(config.max_allowed_all_resources, 10);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.proto_delimiter, ",");
        assert!(config.fail_fast);
        assert_eq!(config.vault_address.as_deref(), Some("https://vault.local:8200"));
        assert_eq!(config.consul_address, None);
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"region: \"us-east-1\"\n").unwrap();

        let config = SurfConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.parallel, num_cpus::get().max(1));
        assert_eq!(config.max_allowed_all_resources, 30);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.proto_delimiter, " ");
        assert!(!config.fail_fast);
    }

    #[test]
    fn test_merge_with_cli() {
        let file_config = SurfConfig {
            parallel: 4,
            log_level: "info".to_string(),
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        };

        let merged = file_config.merge_with_cli(CliOverrides {
            parallel: Some(16),
            fail_fast: Some(true),
            ..Default::default()
        });
        assert_eq!(merged.parallel, 16); // CLI value
        assert!(merged.fail_fast); // CLI value
        assert_eq!(merged.log_level, "info"); // File value
        assert_eq!(merged.region.as_deref(), Some("eu-west-1")); // File value
    }

    #[test]
    fn test_cli_can_turn_fail_fast_off() {
        let file_config = SurfConfig {
            fail_fast: true,
            ..Default::default()
        };

        let kept = file_config.clone().merge_with_cli(CliOverrides::default());
        assert!(kept.fail_fast);

        let merged = file_config.merge_with_cli(CliOverrides {
            fail_fast: Some(false),
            ..Default::default()
        });
        assert!(!merged.fail_fast);
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"parallel: \"many\"\n").unwrap();

        assert!(SurfConfig::load_from(Some(&config_path)).is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SurfConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(matches!(result, Err(SurfError::Config(_))));
    }
}
