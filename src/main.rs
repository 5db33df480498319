use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod db;
mod error;
mod import;
mod models;
mod report;
mod server;
mod stats;
mod store;

use crate::models::StatsScope;
use crate::stats::GradeStatistics;
use crate::store::{GradeStore, MemoryStore};

#[derive(Parser)]
#[command(name = "grade-stats")]
#[command(about = "Weighted grade statistics for learners", long_about = None)]
struct Cli {
    /// Upper bound on pooled Postgres connections
    #[arg(long, global = true, default_value_t = 5)]
    max_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample grade records
    Seed,
    /// Import score records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print a statistics report as JSON
    Stats {
        /// Restrict to one class (0-300)
        #[arg(long)]
        class: Option<String>,
        /// Read records from a CSV file instead of Postgres
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "grade-report.md")]
        out: PathBuf,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Serve GET /stats and GET /stats/{id}
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(cli.max_connections).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(cli.max_connections).await?;
            let inserted = db::seed(&pool).await?;
            println!("Inserted {inserted} seed records.");
        }
        Commands::Import { csv } => {
            let pool = connect(cli.max_connections).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Stats { class, csv } => {
            let stats = GradeStatistics::new(open_store(csv.as_deref(), cli.max_connections).await?);
            let report = match class.as_deref() {
                Some(class_id) => stats.for_class(class_id).await?,
                None => stats.global().await?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Report { out, csv } => {
            let stats = GradeStatistics::new(open_store(csv.as_deref(), cli.max_connections).await?);
            let overall = stats.global().await?;
            let classes = stats.class_breakdown().await?;
            let passing = stats.passing_learners(StatsScope::All).await?;
            let report = report::build_report(chrono::Utc::now(), &overall, &classes, &passing);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { bind, csv } => {
            let stats = GradeStatistics::new(open_store(csv.as_deref(), cli.max_connections).await?);
            server::serve(bind, stats).await?;
        }
    }

    Ok(())
}

async fn connect(max_connections: u32) -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn open_store(csv: Option<&Path>, max_connections: u32) -> anyhow::Result<Arc<dyn GradeStore>> {
    match csv {
        Some(path) => Ok(Arc::new(MemoryStore::from_csv(path)?)),
        None => Ok(Arc::new(db::PgStore::new(connect(max_connections).await?))),
    }
}
