use std::path::{Path, PathBuf};

use anyhow::anyhow;
use clap::Parser as ClapParser;
use clap::Subcommand;
use dremio_sql::client::DremioClient;
use dremio_sql::config::Config;
use dremio_sql::job::Page;
use dremio_sql::references::{TableReference, extract_table_references};
use indexmap::IndexMap;
use serde::Serialize;
use std::time::Instant;

#[derive(clap::Parser)]
#[command(name = "dremio-sql")]
#[command(about = "Dremio SQL runner and table reference extractor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract table references from one or more SQL files.
    Tables(TablesCommand),
    /// Run a SQL file against a cluster and print a page of its results.
    Query(QueryCommand),
}

#[derive(clap::Args)]
struct TablesCommand {
    /// Path to the SQL file or directory containing SQL files.
    #[arg(value_name = "SQL_[FILE|DIR]")]
    sql: PathBuf,
    /// Pretty-print the output references.
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Args)]
struct QueryCommand {
    /// Path to the TOML config file with the cluster and credentials.
    #[arg(short, long)]
    config: PathBuf,
    /// Path to the SQL file to run.
    #[arg(value_name = "SQL_FILE")]
    sql: PathBuf,
    /// Index of the first result row.
    #[arg(long)]
    offset: Option<u64>,
    /// Maximum number of result rows.
    #[arg(long)]
    limit: Option<u64>,
    /// Overrides `tracker.poll_interval_ms` of the config file.
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    /// Overrides `tracker.timeout_secs` of the config file.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Pretty-print the output results.
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OutReferences {
    Ok { references: Vec<TableReference> },
    ErrReferences { error: String },
}

fn read_sql(sql_file_path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(sql_file_path)
        .map_err(|_| anyhow!("Failed to read sql file {}", sql_file_path.display()))
}

fn output_references(sql_file_path: &Path) -> anyhow::Result<OutReferences> {
    let sql = read_sql(sql_file_path)?;
    let out_references = match extract_table_references(&sql) {
        Ok(references) => OutReferences::Ok { references },
        Err(err) => OutReferences::ErrReferences {
            error: format!(
                "Could not extract table references from SQL in file {} due to error: {}",
                sql_file_path.display(),
                err
            ),
        },
    };
    Ok(out_references)
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn tables(tables_command: &TablesCommand) -> anyhow::Result<String> {
    let sql_file_or_dir = &tables_command.sql;
    if sql_file_or_dir.is_dir() {
        let mut file_references: IndexMap<String, OutReferences> = IndexMap::new();
        let mut sql_in_dir: Vec<_> = std::fs::read_dir(sql_file_or_dir)?
            .filter_map(|res| res.ok())
            .map(|entry| entry.path())
            .filter(|file| file.extension().is_some_and(|ext| ext == "sql"))
            .collect();
        sql_in_dir.sort();

        for sql_file in sql_in_dir {
            let out_references = output_references(&sql_file)?;
            file_references.insert(
                std::path::absolute(sql_file)?.display().to_string(),
                out_references,
            );
        }
        to_json(&file_references, tables_command.pretty)
    } else {
        to_json(&output_references(sql_file_or_dir)?, tables_command.pretty)
    }
}

async fn query(query_command: &QueryCommand) -> anyhow::Result<String> {
    let config = Config::from_file(&query_command.config)?;
    let credentials = config.credentials.as_ref().ok_or_else(|| {
        anyhow!(
            "Missing [credentials] section in config file {}",
            query_command.config.display()
        )
    })?;
    let sql = read_sql(&query_command.sql)?;

    let mut tracker = config.tracker.clone();
    if let Some(poll_interval_ms) = query_command.poll_interval_ms {
        tracker.poll_interval_ms = poll_interval_ms;
    }
    if query_command.timeout_secs.is_some() {
        tracker.timeout_secs = query_command.timeout_secs;
    }
    let options = tracker.run_options(Page {
        offset: query_command.offset,
        limit: query_command.limit,
    });

    let client = DremioClient::login(&config.cluster, credentials).await?;
    let results = client.run_query_and_get_results(&sql, &options).await?;
    log::info!("Fetched {} of {} rows", results.rows.len(), results.row_count);
    to_json(&results, query_command.pretty)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let now = Instant::now();

    env_logger::init();
    let cli = Cli::parse();

    let out_str = match &cli.command {
        Commands::Tables(tables_command) => tables(tables_command)?,
        Commands::Query(query_command) => query(query_command).await?,
    };
    println!("{}", out_str);

    let elapsed = now.elapsed();
    log::info!("Elapsed: {:.2?}", elapsed);

    Ok(())
}
