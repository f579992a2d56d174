use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use sqlmig_core::MigrateConfig;
use sqlmig_sqlite::Migrator;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "sqlmig.yml";

#[derive(Debug, Parser)]
#[command(name = "sqlmig")]
#[command(about = "Apply and author sequenced SQL migrations against a SQLite database")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Path to a YAML config file (default: ./sqlmig.yml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database file path (overrides config).
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Migrations directory (overrides config).
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Ledger table name (overrides config).
    #[arg(long, global = true)]
    table: Option<String>,
    /// Enable debug logging.
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ensure the ledger exists and apply all pending scripts.
    Up,
    /// Apply ad-hoc SQL as a new numbered migration and write it to disk.
    New(NewArgs),
    /// Show applied, pending, missing, and modified migrations.
    Status(StatusArgs),
}

#[derive(Debug, Args)]
struct NewArgs {
    /// Migration name, used as the filename slug ([a-zA-Z0-9_-]+).
    #[arg(long)]
    name: String,
    /// SQL text to apply.
    #[arg(long, required_unless_present = "file", conflicts_with = "file")]
    sql: Option<String>,
    /// File containing the SQL to apply.
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Emit the status as JSON.
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let result = resolve_config(&cli.global).and_then(|config| match cli.command {
        Command::Up => run_up(&config),
        Command::New(args) => run_new(&config, args),
        Command::Status(args) => run_status(&config, args),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Installs a stderr fmt subscriber honoring `RUST_LOG`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Loads the config file (explicit or default) and applies CLI overrides.
fn resolve_config(args: &GlobalArgs) -> Result<MigrateConfig, String> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            load_config(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => MigrateConfig::default(),
    };

    if let Some(db) = &args.db {
        config.database = db.clone();
    }
    if let Some(dir) = &args.dir {
        config.migrations_dir = dir.clone();
    }
    if let Some(table) = &args.table {
        config.ledger_table = table.clone();
    }
    debug!(?config, "resolved configuration");
    Ok(config)
}

fn load_config(path: &Path) -> Result<MigrateConfig, String> {
    MigrateConfig::load(path)
        .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))
}

/// Opens the database and runs bootstrap; `up` and `new` start here.
fn open_migrator(config: &MigrateConfig) -> Result<Migrator, String> {
    let migrator = Migrator::from_config(config).map_err(|e| {
        format!(
            "Failed to open database '{}': {e}",
            config.database.display()
        )
    })?;
    migrator
        .bootstrap()
        .map_err(|e| format!("Bootstrap failed: {e}"))?;
    Ok(migrator)
}

// ---------------------------------------------------------------------------
// up
// ---------------------------------------------------------------------------

fn run_up(config: &MigrateConfig) -> Result<(), String> {
    let mut migrator = open_migrator(config)?;
    let report = migrator
        .apply_pending()
        .map_err(|e| format!("Migration failed: {e}"))?;

    if report.is_empty() {
        println!("Database is up to date.");
    } else {
        println!("Applied {} migration(s):", report.applied.len());
        for filename in &report.applied {
            println!("  {filename}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// new
// ---------------------------------------------------------------------------

fn run_new(config: &MigrateConfig, args: NewArgs) -> Result<(), String> {
    let sql = match (args.sql, args.file) {
        (Some(sql), _) => sql,
        (None, Some(path)) => fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read SQL file '{}': {e}", path.display()))?,
        (None, None) => return Err("Specify either --sql or --file".to_string()),
    };

    let mut migrator = open_migrator(config)?;
    let filename = migrator
        .create_and_apply(&args.name, &sql)
        .map_err(|e| format!("Failed to create migration: {e}"))?;
    println!(
        "Created and applied {}",
        migrator.scripts_dir().join(&filename).display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

fn run_status(config: &MigrateConfig, args: StatusArgs) -> Result<(), String> {
    // Read-only: no bootstrap, so the ledger table and directory are left alone.
    let migrator = Migrator::from_config(config).map_err(|e| {
        format!(
            "Failed to open database '{}': {e}",
            config.database.display()
        )
    })?;
    let status = migrator
        .status()
        .map_err(|e| format!("Failed to read migration status: {e}"))?;

    if args.json {
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| format!("Failed to serialize status: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    println!("Migration Status:");
    println!("  Database: {}", config.database.display());
    println!("  Directory: {}", config.migrations_dir.display());
    println!("  Applied: {}", status.applied.len());
    for record in &status.applied {
        println!("    {}  {}", record.applied_at, record.filename);
    }
    println!("  Pending: {}", status.pending.len());
    for filename in &status.pending {
        println!("    {filename}");
    }
    if !status.missing.is_empty() {
        println!("  Missing on disk: {}", status.missing.join(", "));
    }
    if !status.modified.is_empty() {
        println!("  Modified since applied: {}", status.modified.join(", "));
    }
    println!(
        "  Latest: {}",
        status.latest.as_deref().unwrap_or("(none)")
    );
    println!("  Next sequence: {:03}", status.next_sequence);
    Ok(())
}
