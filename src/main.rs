use sqlite_generator::config::GeneratorConfig;
use sqlite_generator::generate_sqlite;
use sqlite_generator::ingestion::list_columns;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlite-generator")]
#[command(about = "Build a SQLite database from schema.sql and a directory of CSV files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recreate the database, apply the schema and load every CSV file (default)
    Generate(GenerateArgs),
    /// Print the column names of every CSV file
    Columns {
        /// Path to data directory (default: ./data)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct GenerateArgs {
    /// Database file to recreate (default: ./database.sqlite)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Schema file (default: ./schema.sql)
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Path to data directory (default: ./data)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Do not enable foreign key enforcement on the connection
    #[arg(long)]
    no_foreign_keys: bool,

    /// Create tables that the schema does not declare from the CSV header
    #[arg(long)]
    create_missing_tables: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base = GeneratorConfig::from_current_dir()?.with_env_overrides();

    match cli.command.unwrap_or_else(|| Commands::Generate(GenerateArgs::default())) {
        Commands::Generate(args) => run_generate(base, args),
        Commands::Columns { data_dir } => {
            let data_dir = data_dir.unwrap_or(base.data_dir);
            let listing = match list_columns(&data_dir) {
                Some(listing) => listing,
                None => return Ok(()),
            };
            if listing.is_empty() {
                println!("No CSV files found.");
            }
            for entry in listing {
                if let Some(columns) = entry.columns {
                    println!("{}: {}", entry.file, columns.join(", "));
                }
            }
            Ok(())
        }
    }
}

fn run_generate(mut config: GeneratorConfig, args: GenerateArgs) -> Result<()> {
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(schema) = args.schema {
        config.schema_path = schema;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    config.enforce_foreign_keys = !args.no_foreign_keys;
    config.create_missing_tables = args.create_missing_tables;

    let summary = generate_sqlite(&config)
        .with_context(|| format!("Failed to generate {}", config.database_path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.load);
    }

    info!("Wrote {}", summary.database_path.display());
    Ok(())
}
