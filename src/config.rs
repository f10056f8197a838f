//! ubgen Configuration
//!
//! Handles parsing and management of ubgen.toml configuration files.
//! Command-line flags take precedence over values loaded here.

use crate::arch::{Reg, Target, TargetKind};
use crate::codegen::GenResult;
use crate::{cycle, ilp};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file searched for
pub const CONFIG_FILE_NAME: &str = "ubgen.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching ubgen.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UbgenConfig {
    /// Instruction set and register pool
    #[serde(default)]
    pub target: TargetConfig,

    /// Cycle-chain (BTB) generator
    #[serde(default)]
    pub cycle: CycleConfig,

    /// ILP chain generator
    #[serde(default)]
    pub ilp: IlpConfig,

    /// Where files are written
    #[serde(default)]
    pub output: OutputConfig,
}

impl UbgenConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: UbgenConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                // Reached root without finding config
                return Ok(Self::default());
            }
        }
    }

    /// Load an explicit file if given, otherwise search from the cwd.
    pub fn resolve(explicit: Option<&Path>) -> ConfigResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Self::load_from_cwd(),
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build the configured target, applying any accumulator override.
    pub fn build_target(&self) -> GenResult<Box<dyn Target>> {
        self.target.arch.build(self.target.accumulator_pool())
    }
}

/// Target selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TargetConfig {
    /// Instruction set ("mips32" or "aarch64")
    #[serde(default)]
    pub arch: TargetKind,

    /// Register numbers replacing the default accumulator pool, in order
    #[serde(default)]
    pub accumulators: Vec<u8>,
}

impl TargetConfig {
    /// The pool override, if one is configured
    pub fn accumulator_pool(&self) -> Option<Vec<Reg>> {
        if self.accumulators.is_empty() {
            None
        } else {
            Some(self.accumulators.iter().copied().map(Reg).collect())
        }
    }
}

/// Cycle-chain generator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleConfig {
    /// Largest size as a power-of-two exponent
    #[serde(default = "default_exponent")]
    pub exponent: u32,

    /// Function symbol prefix
    #[serde(default = "default_cycle_symbol_prefix")]
    pub symbol_prefix: String,

    /// Output file prefix (`<file_prefix><N>.<extension>`)
    #[serde(default = "default_cycle_file_prefix")]
    pub file_prefix: String,

    /// Output file extension
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Also write a declarations header
    #[serde(default)]
    pub header: bool,

    /// Declarations header file name
    #[serde(default = "default_cycle_header_file")]
    pub header_file: String,
}

fn default_exponent() -> u32 {
    14
}

fn default_cycle_symbol_prefix() -> String {
    cycle::DEFAULT_SYMBOL_PREFIX.to_string()
}

fn default_cycle_file_prefix() -> String {
    "cycle_".to_string()
}

fn default_extension() -> String {
    "s".to_string()
}

fn default_cycle_header_file() -> String {
    "cycles.h".to_string()
}

impl CycleConfig {
    /// File name of the routine for `size` labels
    pub fn file_name(&self, size: usize) -> String {
        format!("{}{}.{}", self.file_prefix, size, self.extension)
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            exponent: default_exponent(),
            symbol_prefix: default_cycle_symbol_prefix(),
            file_prefix: default_cycle_file_prefix(),
            extension: default_extension(),
            header: false,
            header_file: default_cycle_header_file(),
        }
    }
}

/// ILP chain generator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IlpConfig {
    /// Widest chain generated
    #[serde(default = "default_max_width")]
    pub max_width: usize,

    /// Loop unroll factor
    #[serde(default = "default_unroll")]
    pub unroll: u32,

    /// Function symbol prefix
    #[serde(default = "default_ilp_symbol_prefix")]
    pub symbol_prefix: String,

    /// Assembly output file
    #[serde(default = "default_asm_file")]
    pub asm_file: String,

    /// Declarations output file
    #[serde(default = "default_header_file")]
    pub header_file: String,
}

fn default_max_width() -> usize {
    ilp::DEFAULT_MAX_WIDTH
}

fn default_unroll() -> u32 {
    ilp::DEFAULT_UNROLL
}

fn default_ilp_symbol_prefix() -> String {
    ilp::DEFAULT_SYMBOL_PREFIX.to_string()
}

fn default_asm_file() -> String {
    "funcs.s".to_string()
}

fn default_header_file() -> String {
    "funcs.h".to_string()
}

impl Default for IlpConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            unroll: default_unroll(),
            symbol_prefix: default_ilp_symbol_prefix(),
            asm_file: default_asm_file(),
            header_file: default_header_file(),
        }
    }
}

/// Output location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Directory receiving generated files
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UbgenConfig::default();
        assert_eq!(config.target.arch, TargetKind::Mips32);
        assert_eq!(config.ilp.max_width, 16);
        assert_eq!(config.ilp.unroll, 4);
        assert_eq!(config.cycle.file_name(64), "cycle_64.s");
        assert!(config.target.accumulator_pool().is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[target]
arch = "arm64"

[cycle]
exponent = 8
header = true

[ilp]
max_width = 8
unroll = 2

[output]
dir = "out"
"#;
        let config: UbgenConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.target.arch, TargetKind::Aarch64);
        assert_eq!(config.cycle.exponent, 8);
        assert!(config.cycle.header);
        assert_eq!(config.cycle.symbol_prefix, "goto_test");
        assert_eq!(config.ilp.max_width, 8);
        assert_eq!(config.ilp.unroll, 2);
        assert_eq!(config.ilp.asm_file, "funcs.s");
        assert_eq!(config.output.dir, PathBuf::from("out"));
    }

    #[test]
    fn test_accumulator_override() {
        let toml_str = r#"
[target]
arch = "mips32"
accumulators = [16, 17, 18]
"#;
        let config: UbgenConfig = toml::from_str(toml_str).unwrap();
        let target = config.build_target().unwrap();
        assert_eq!(target.abi().accumulators, vec![Reg(16), Reg(17), Reg(18)]);

        let bad: UbgenConfig = toml::from_str("[target]\naccumulators = [29]\n").unwrap();
        assert!(bad.build_target().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = UbgenConfig::default();
        config.ilp.unroll = 8;
        config.save(&path).unwrap();

        assert_eq!(UbgenConfig::load(&path).unwrap(), config);
        assert_eq!(UbgenConfig::find_and_load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = UbgenConfig::resolve(Some(Path::new("/nonexistent/ubgen.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
