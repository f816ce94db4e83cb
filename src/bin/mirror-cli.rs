use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use mirror_router::catalog::{Mirror, MirrorCatalog, NewMirror};
use mirror_router::config::{load_or_default, RouterConfig};
use mirror_router::observability::logging::init_logging_with_writer;
use mirror_router::AppContext;

#[derive(Parser)]
#[command(name = "mirror-cli")]
#[command(about = "Offline tooling for the mirror router databases", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults plus environment when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the catalog for a client address
    Rank {
        ip: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show geo and ASN data for an address
    Resolve { ip: String },
    /// List every mirror in catalog order
    Mirrors,
    /// List distinct url protocol labels
    UrlTypes,
    /// Insert or replace mirrors from a JSON array file
    Import { file: PathBuf },
    /// Delete a mirror by name
    Remove { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    // stdout carries the JSON result
    init_logging_with_writer(&config.observability, std::io::stderr);

    match cli.command {
        Commands::Rank { ip, limit } => {
            let limit = limit.unwrap_or(config.ranking.default_limit);
            let context = AppContext::open(config).await?;
            let (identity, ranked) = context.router.rank_detailed_for(&ip).await?;
            let mirrors: Vec<_> = ranked
                .iter()
                .take(limit)
                .map(|r| {
                    json!({
                        "tier": r.tier,
                        "distance": r.distance,
                        "mirror": r.mirror.view(),
                    })
                })
                .collect();
            print_json(&json!({ "client": identity, "mirrors": mirrors }))?;
        }
        Commands::Resolve { ip } => {
            let context = AppContext::open(config).await?;
            print_json(&context.router.identify(&ip).await?)?;
        }
        Commands::Mirrors => {
            let catalog = open_catalog(&config).await?;
            let views: Vec<_> = catalog.list_mirrors().await?.iter().map(Mirror::view).collect();
            print_json(&views)?;
        }
        Commands::UrlTypes => {
            let catalog = open_catalog(&config).await?;
            print_json(&catalog.url_types().await?)?;
        }
        Commands::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let mirrors: Vec<NewMirror> = serde_json::from_str(&content)?;
            let catalog = open_catalog(&config).await?;
            let mut imported = Vec::with_capacity(mirrors.len());
            for new in &mirrors {
                imported.push(catalog.insert_mirror(new).await?.name);
            }
            print_json(&json!({ "imported": imported }))?;
        }
        Commands::Remove { name } => {
            let catalog = open_catalog(&config).await?;
            let removed = catalog.delete_mirror(&name).await?;
            print_json(&json!({ "name": name, "removed": removed }))?;
        }
    }

    Ok(())
}

async fn open_catalog(config: &RouterConfig) -> Result<MirrorCatalog, Box<dyn std::error::Error>> {
    Ok(MirrorCatalog::open(
        Path::new(&config.catalog.database_path),
        config.catalog.max_connections,
    )
    .await?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
