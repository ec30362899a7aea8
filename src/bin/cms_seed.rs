use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use school_cms::db::{self, ColumnValues};
use school_cms::resource::{self, Schema};
use school_cms::{config, validate};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Insert records from a YAML or JSON file into the CMS store"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Seed file: a map from resource name to a list of objects.
    #[arg(long)]
    file: PathBuf,

    /// Abort on the first invalid entry instead of skipping it.
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.default_database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    // JSON is valid YAML, so one parser covers both.
    let seed: BTreeMap<String, Vec<Map<String, Value>>> =
        serde_yaml::from_str(&content).context("parsing seed file")?;

    for (name, entries) in &seed {
        let resource =
            resource::by_name(name).ok_or_else(|| anyhow!("unknown resource {name:?}"))?;
        let mut inserted = 0usize;
        for (idx, body) in entries.iter().enumerate() {
            let checked = match resource.schema {
                Schema::Fields(rules) => validate::validate(body, rules),
                Schema::Document => validate::validate_document(body),
            };
            if let Err(err) = checked {
                if args.strict {
                    return Err(anyhow!("{name}[{idx}]: {err}"));
                }
                warn!(resource = name.as_str(), idx, error = %err, "skipping invalid entry");
                continue;
            }
            let values = ColumnValues::for_insert(resource, body)?;
            db::insert_record(&pool, resource, &values).await?;
            inserted += 1;
        }
        let total = db::count_records(&pool, resource).await?;
        info!(resource = name.as_str(), inserted, total, "seeded");
    }

    Ok(())
}
