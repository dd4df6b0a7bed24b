use crate::backup::{BACKUP_CATEGORY, BACKUP_CHAPTER, BACKUP_HISTORY, BACKUP_TRACK};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backup and restore for manga reading libraries.
#[derive(Parser, Debug, Clone)]
#[command(name = "mangavault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "MANGAVAULT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a backup archive of the library.
    Backup {
        /// Output file path (default: automatic backup into the configured directory).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip categories.
        #[arg(long)]
        skip_categories: bool,

        /// Skip chapters.
        #[arg(long)]
        skip_chapters: bool,

        /// Skip tracking records.
        #[arg(long)]
        skip_tracking: bool,

        /// Skip reading history.
        #[arg(long)]
        skip_history: bool,
    },

    /// Restore a backup archive into the library.
    Restore {
        /// Archive file to restore.
        file: PathBuf,
    },

    /// Decode an archive and print a summary without touching the library.
    Inspect {
        /// Archive file to inspect.
        file: PathBuf,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Backup configuration.
    #[serde(default)]
    pub backup: BackupConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/library.db")
}

/// Backup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory for automatic backups.
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,

    /// How many automatic backups to keep.
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Include categories by default.
    #[serde(default = "default_true")]
    pub categories: bool,

    /// Include chapters by default.
    #[serde(default = "default_true")]
    pub chapters: bool,

    /// Include tracking records by default.
    #[serde(default = "default_true")]
    pub tracking: bool,

    /// Include reading history by default.
    #[serde(default = "default_true")]
    pub history: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            retention: default_retention(),
            categories: true,
            chapters: true,
            tracking: true,
            history: true,
        }
    }
}

impl BackupConfig {
    /// Section flags for the enabled sections.
    pub fn flags(&self) -> i32 {
        let mut flags = 0;
        if self.categories {
            flags |= BACKUP_CATEGORY;
        }
        if self.chapters {
            flags |= BACKUP_CHAPTER;
        }
        if self.tracking {
            flags |= BACKUP_TRACK;
        }
        if self.history {
            flags |= BACKUP_HISTORY;
        }
        flags
    }
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("data/backups")
}

fn default_retention() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("mangavault.toml"),
            dirs::config_dir()
                .map(|p| p.join("mangavault").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/mangavault/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# mangavault configuration

[database]
# path = "/var/lib/mangavault/library.db"

[backup]
# Directory for automatic backups
# dir = "/var/lib/mangavault/backups"
# How many automatic backups to keep
retention = 2
# Sections included by default
categories = true
chapters = true
tracking = true
history = true
"#
        .to_string()
    }
}
