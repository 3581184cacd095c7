use catalog_lens::api::{self, respond, ApiResponse};
use catalog_lens::config::{init_tracing, AppConfig};
use catalog_lens::{CatalogEngine, QueryParams, SqliteStore};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "catalog-lens")]
#[command(about = "Schemaless CSV catalog: ingest, inspect, filter and group")]
#[command(version)]
struct Args {
    /// SQLite database (overrides CATALOG_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CSV file (the original file is left in place)
    Ingest {
        csv_file: PathBuf,
    },
    /// Print every stored record
    List,
    /// Print the inferred schema with per-field value counts
    Schema,
    /// Print records matching key=value filters
    Query {
        /// Validate filters against the fixed product catalog instead of the
        /// inferred schema
        #[arg(long)]
        catalog: bool,

        #[arg(value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Print matching records grouped by one field
    Group {
        /// Field to group by
        #[arg(long = "by")]
        by: String,

        #[arg(value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
}

fn parse_filter(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let mut config = AppConfig::from_env()?;
    init_tracing();

    let args = Args::parse();
    if let Some(db) = args.db {
        config.database_path = db;
    }

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let engine = CatalogEngine::new(Arc::new(store), config.identifier_generator());

    let response = match args.command {
        Commands::Ingest { csv_file } => ingest(&engine, &config, csv_file).await?,
        Commands::List => respond(engine.fetch_all().await, api::records_body),
        Commands::Schema => respond(engine.schema().await, api::schema_body),
        Commands::Query { catalog, filters } => {
            let params: QueryParams = filters.into_iter().collect();
            let result = if catalog {
                engine.query_catalog(&params).await
            } else {
                engine.query(&params).await
            };
            respond(result, api::records_body)
        }
        Commands::Group { by, filters } => {
            let mut params: QueryParams = filters.into_iter().collect();
            params.insert(catalog_lens::grouping::GROUP_BY_PARAM.to_string(), by);
            respond(engine.grouped(&params).await, api::grouped_body)
        }
    };

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(if response.status == 200 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// The pipeline deletes what it ingests, so hand it a copy in the upload dir.
async fn ingest(engine: &CatalogEngine, config: &AppConfig, csv_file: PathBuf) -> Result<ApiResponse> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;

    let staged = config
        .upload_dir
        .join(format!("{}.csv", Uuid::new_v4().simple()));
    tokio::fs::copy(&csv_file, &staged)
        .await
        .with_context(|| format!("Failed to read CSV file {}", csv_file.display()))?;
    info!("Staged {} as {}", csv_file.display(), staged.display());

    Ok(respond(engine.ingest(&staged).await, api::ingested_body))
}
