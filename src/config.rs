//! Configuration types for ewc-export
//!
//! This module defines:
//! - Storage engine tuning (pragmas, commit batching)
//! - Export run configuration with validation
//! - Output file collision policy

use crate::error::ConfigError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Page size limits accepted by SQLite
const MIN_PAGE_SIZE: u32 = 512;
const MAX_PAGE_SIZE: u32 = 65536;

/// Minimum writer channel size
const MIN_CHANNEL_SIZE: usize = 100;

/// Default output extension
pub const DEFAULT_EXTENSION: &str = "ewc";

/// Default number of geometries between progress log lines
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// SQLite `synchronous` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Off,
    Normal,
    Full,
}

impl SyncMode {
    pub fn as_pragma(self) -> &'static str {
        match self {
            SyncMode::Off => "OFF",
            SyncMode::Normal => "NORMAL",
            SyncMode::Full => "FULL",
        }
    }
}

impl FromStr for SyncMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(SyncMode::Off),
            "normal" | "1" => Ok(SyncMode::Normal),
            "full" | "2" => Ok(SyncMode::Full),
            _ => Err(ConfigError::UnknownValue {
                setting: "synchronous",
                value: s.to_string(),
            }),
        }
    }
}

/// SQLite `journal_mode` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Truncate,
    Memory,
    Off,
}

impl JournalMode {
    pub fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Memory => "MEMORY",
            JournalMode::Off => "OFF",
        }
    }
}

impl FromStr for JournalMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wal" => Ok(JournalMode::Wal),
            "delete" => Ok(JournalMode::Delete),
            "truncate" => Ok(JournalMode::Truncate),
            "memory" => Ok(JournalMode::Memory),
            "off" => Ok(JournalMode::Off),
            _ => Err(ConfigError::UnknownValue {
                setting: "journal_mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pragma())
    }
}

/// Storage engine tuning
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub synchronous: SyncMode,
    pub journal_mode: JournalMode,
    /// Page cache size in KiB
    pub cache_size_kib: i64,
    /// Memory-mapped I/O size in bytes
    pub mmap_size: u64,
    /// Database page size; usually the filesystem cluster size
    pub page_size: u32,
    /// WAL pages between automatic checkpoints
    pub wal_autocheckpoint: u32,
    /// Bytes of journal kept after a checkpoint
    pub journal_size_limit: i64,
    /// Hold an exclusive lock for the whole load
    pub exclusive_locking: bool,
    /// Rows per committed batch; 0 keeps the whole load in one transaction
    pub auto_commit_threshold: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            synchronous: SyncMode::Off,
            journal_mode: JournalMode::Wal,
            cache_size_kib: 128_000,
            mmap_size: 536_870_912,
            page_size: 4096,
            wal_autocheckpoint: 10_000,
            journal_size_limit: 67_108_864,
            exclusive_locking: true,
            auto_commit_threshold: 0,
        }
    }
}

impl EngineOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.page_size.is_power_of_two()
            || self.page_size < MIN_PAGE_SIZE
            || self.page_size > MAX_PAGE_SIZE
        {
            return Err(ConfigError::InvalidPageSize {
                size: self.page_size,
                min: MIN_PAGE_SIZE,
                max: MAX_PAGE_SIZE,
            });
        }
        Ok(())
    }
}

/// What to do with an output file left over from a previous run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Delete the file and its sidecars
    #[default]
    Delete,
    /// Move them into a trash directory under a timestamped name.
    /// `None` uses `.trash` next to the output file.
    Trash(Option<PathBuf>),
}

/// Configuration for one export run
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Output path without extension
    pub output_stem: PathBuf,

    /// Output extension, without the dot
    pub extension: String,

    /// Stale output handling
    pub collision: CollisionPolicy,

    /// Storage tuning
    pub engine: EngineOptions,

    /// Emit an Instance row per shape instead of pointing shapes at their group
    pub shape_instances: bool,

    /// Insert instances without bounds and patch them right after
    pub defer_instance_bounds: bool,

    /// Run the storage engine on a dedicated writer thread
    pub threaded_writer: bool,

    /// Bounded channel size for the writer thread
    pub channel_size: usize,

    /// Geometries between progress log lines
    pub progress_interval: u64,

    /// Show a progress spinner on the terminal
    pub show_progress: bool,

    /// Run ANALYZE and switch to read-friendly pragmas after the load
    pub analyze_after_load: bool,
}

impl ExportConfig {
    pub fn new(output_stem: impl Into<PathBuf>) -> Self {
        Self {
            output_stem: output_stem.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            collision: CollisionPolicy::default(),
            engine: EngineOptions::default(),
            shape_instances: false,
            defer_instance_bounds: false,
            threaded_writer: false,
            channel_size: 10_000,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            show_progress: false,
            analyze_after_load: true,
        }
    }

    /// `<stem>.<extension>`
    pub fn output_path(&self) -> PathBuf {
        let mut name = self.output_stem.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.extension);
        PathBuf::from(name)
    }

    /// Name recorded in the settings table
    pub fn display_name(&self) -> String {
        self.output_stem
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;

        if self.extension.is_empty()
            || self.extension.contains(['/', '\\', '.'])
        {
            return Err(ConfigError::InvalidExtension(self.extension.clone()));
        }

        if self.display_name().is_empty() {
            return Err(ConfigError::InvalidOutputPath {
                path: self.output_stem.clone(),
                reason: "Output path has no file name".into(),
            });
        }

        let parent = self.output_stem.parent().unwrap_or(Path::new(""));
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::InvalidOutputPath {
                path: self.output_stem.clone(),
                reason: "Parent directory does not exist".into(),
            });
        }

        if self.threaded_writer && self.channel_size < MIN_CHANNEL_SIZE {
            return Err(ConfigError::InvalidChannelSize {
                size: self.channel_size,
                min: MIN_CHANNEL_SIZE,
            });
        }

        if self.progress_interval == 0 {
            return Err(ConfigError::InvalidProgressInterval);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_output_path() {
        let config = ExportConfig::new("/tmp/out/plant");
        assert_eq!(config.output_path(), PathBuf::from("/tmp/out/plant.ewc"));
        assert_eq!(config.display_name(), "plant");

        let mut config = ExportConfig::new("plant.v2");
        config.extension = "db".into();
        assert_eq!(config.output_path(), PathBuf::from("plant.v2.db"));
    }

    #[test]
    fn test_validate_defaults() {
        let dir = tempdir().unwrap();
        let config = ExportConfig::new(dir.path().join("plant"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        let dir = tempdir().unwrap();

        let mut config = ExportConfig::new(dir.path().join("plant"));
        config.engine.page_size = 3000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPageSize { size: 3000, .. })
        ));

        let mut config = ExportConfig::new(dir.path().join("plant"));
        config.extension = "a/b".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidExtension(_))));

        let mut config = ExportConfig::new(dir.path().join("plant"));
        config.threaded_writer = true;
        config.channel_size = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChannelSize { size: 10, min: 100 })
        ));

        let config = ExportConfig::new(dir.path().join("missing").join("plant"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOutputPath { .. })
        ));
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("FULL".parse::<SyncMode>().unwrap(), SyncMode::Full);
        assert_eq!("off".parse::<SyncMode>().unwrap(), SyncMode::Off);
        assert_eq!("wal".parse::<JournalMode>().unwrap(), JournalMode::Wal);
        assert!("sometimes".parse::<SyncMode>().is_err());
        assert!("bogus".parse::<JournalMode>().is_err());
    }
}
