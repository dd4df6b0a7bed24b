//! mangavault entry point.

use clap::Parser;
use mangavault::{
    backup::{self, RestoreEngine},
    config::{Cli, Command, Config},
    db::Database,
    source::SourceRegistry,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mangavault=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    match cli.command {
        Command::Init { force } => cmd_init(force).await,
        Command::Backup {
            output,
            skip_categories,
            skip_chapters,
            skip_tracking,
            skip_history,
        } => {
            let mut flags = config.backup.flags();
            if skip_categories {
                flags &= !backup::BACKUP_CATEGORY;
            }
            if skip_chapters {
                flags &= !backup::BACKUP_CHAPTER;
            }
            if skip_tracking {
                flags &= !backup::BACKUP_TRACK;
            }
            if skip_history {
                flags &= !backup::BACKUP_HISTORY;
            }
            cmd_backup(&config, output, flags).await
        }
        Command::Restore { file } => cmd_restore(&config, file).await,
        Command::Inspect { file } => cmd_inspect(file).await,
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit config.toml to configure paths and backup retention.");
    println!("Then run: mangavault backup");

    Ok(())
}

/// Create a backup archive.
///
/// Without `--output` this is an automatic backup: it lands in the
/// configured directory under the timestamped naming convention and old
/// backups beyond the retention count are pruned.
async fn cmd_backup(
    config: &Config,
    output: Option<PathBuf>,
    flags: i32,
) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let registry = SourceRegistry::new(db.clone());
    let retention = config.backup.retention;

    let auto = output.is_none();
    let dest = output.unwrap_or_else(|| config.backup.dir.clone());

    // Encoding reads the whole library; keep it off the async executor
    let path = tokio::task::spawn_blocking(move || {
        backup::write_backup_file(&db, &registry, &dest, flags, auto, retention)
    })
    .await??;

    println!("Backup written: {}", path.display());
    Ok(())
}

/// Restore an archive into the library.
async fn cmd_restore(config: &Config, file: PathBuf) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    let report = tokio::task::spawn_blocking(move || -> mangavault::Result<_> {
        let backup = backup::read_backup_file(&file)?;
        RestoreEngine::new(db).restore(&backup)
    })
    .await??;

    println!("Restore complete: {}", report);
    Ok(())
}

/// Print an archive summary without touching the library.
async fn cmd_inspect(file: PathBuf) -> anyhow::Result<()> {
    let archive = backup::read_backup_file(&file)?;

    let chapters: usize = archive.mangas.iter().map(|m| m.chapters.len()).sum();
    let tracks: usize = archive.mangas.iter().map(|m| m.tracking.len()).sum();
    let history: usize = archive.mangas.iter().map(|m| m.history.len()).sum();

    println!("Backup version: {}", archive.version);
    println!("Entries:        {}", archive.mangas.len());
    println!("Chapters:       {}", chapters);
    println!("Categories:     {}", archive.categories.len());
    println!("Tracking:       {}", tracks);
    println!("History:        {}", history);
    println!("Sources:");
    for source in &archive.sources {
        if source.lang.is_empty() {
            println!("  {} ({})", source.name, source.id);
        } else {
            println!("  {} [{}] ({})", source.name, source.lang, source.id);
        }
    }

    Ok(())
}
