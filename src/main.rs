//! starmill CLI: convert a sheet for a tenant and query its cube.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use starmill::{convert, ConvertConfig, CubeQueryManager, RawTable, Store};

#[derive(Parser)]
#[command(name = "starmill", version, about = "Spreadsheet to star schema converter")]
struct Cli {
    /// SQLite database path.
    #[arg(long, global = true, default_value = "starmill.db", env = "STARMILL_DB")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON cell array into the tenant's star schema and cube.
    Convert {
        #[arg(long)]
        tenant: String,
        /// Path to a JSON file holding a 2-D array of cells (header first).
        #[arg(long)]
        input: PathBuf,
        /// Optional TOML settings file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Fact column names; overrides the config file's list.
        #[arg(long = "fact")]
        facts: Vec<String>,
        /// Date-column prefix; overrides the config file's value.
        #[arg(long)]
        date_prefix: Option<String>,
    },
    /// Print the cube's min/max dates.
    Borders {
        #[arg(long)]
        tenant: String,
    },
    /// Print each dimension's distinct values.
    Dimensions {
        #[arg(long)]
        tenant: String,
    },
    /// Print cube rows, optionally grouped by year or month.
    Cube {
        #[arg(long)]
        tenant: String,
        /// Grouping period: "year", "month", or anything else for raw rows.
        #[arg(long, default_value = "")]
        group: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut store = Store::open(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;

    match cli.command {
        Commands::Convert {
            tenant,
            input,
            config,
            facts,
            date_prefix,
        } => {
            let mut cfg = match config {
                Some(path) => ConvertConfig::from_toml_file(&path)?,
                None => ConvertConfig::default(),
            };
            if !facts.is_empty() {
                cfg.fact_columns = facts;
            }
            if let Some(prefix) = date_prefix {
                cfg.date_prefix = prefix;
            }

            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let table = RawTable::from_json(&text).map_err(starmill::ConvertError::from)?;
            let outcome = convert(&mut store, &tenant, &table, &cfg)?;

            println!(
                "{}",
                json!({
                    "view": outcome.view_name,
                    "fact_rows": outcome.fact_rows,
                    "dimension_tables": outcome.dimension_tables,
                    "date_min": outcome.date_min.map(|d| d.to_string()),
                    "date_max": outcome.date_max.map(|d| d.to_string()),
                })
            );
        }
        Commands::Borders { tenant } => {
            let mgr = CubeQueryManager::new(&store, &tenant)?;
            let (min, max) = mgr.date_borders()?;
            println!("{}", json!({ "min": min, "max": max }));
        }
        Commands::Dimensions { tenant } => {
            let mgr = CubeQueryManager::new(&store, &tenant)?;
            let mut obj = serde_json::Map::new();
            for (name, values) in mgr.dimension_values()? {
                obj.insert(name, json!(values));
            }
            println!("{}", serde_json::Value::Object(obj));
        }
        Commands::Cube { tenant, group } => {
            let mgr = CubeQueryManager::new(&store, &tenant)?;
            let rows: Vec<serde_json::Value> =
                mgr.cube(&group)?.iter().map(|r| r.to_json()).collect();
            println!("{}", serde_json::Value::Array(rows));
        }
    }

    Ok(())
}
