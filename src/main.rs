use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grade_snapshot::{
    pipeline, report, CanvasClient, EngineConfig, JsonFileSessionStore, PageContext,
    SnapshotStore,
};

#[derive(Parser)]
#[command(name = "grade-snapshot")]
#[command(about = "Course grade snapshot cache for a learning-management site", long_about = None)]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Session file shared between invocations
    #[arg(long, global = true, default_value = ".grade-snapshot-session.json")]
    session: PathBuf,
    /// HTTP request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate snapshots for every course in a CSV file (id,name)
    Populate {
        #[arg(long)]
        csv: PathBuf,
        /// Also write a markdown report
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the cached snapshot for a course
    Show {
        #[arg(long)]
        course: String,
    },
    /// Refresh one course according to the page's refresh policy
    Refresh {
        #[arg(long)]
        course: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "course-grades")]
        page: PageContext,
        #[arg(long)]
        force: bool,
    },
    /// Generate a markdown report of cached snapshots
    Report {
        #[arg(long, default_value = "grades.md")]
        out: PathBuf,
    },
    /// Drop every cached snapshot and classification
    Clear,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn build_store(cli: &Cli, config: &EngineConfig) -> anyhow::Result<SnapshotStore> {
    let base_url = std::env::var("CANVAS_BASE_URL")
        .context("CANVAS_BASE_URL must be set to the learning-management site")?;
    let token = std::env::var("CANVAS_TOKEN").context("CANVAS_TOKEN must be set")?;

    let client = CanvasClient::new(&base_url, &token, Duration::from_secs(cli.timeout_secs))
        .context("failed to build HTTP client")?;
    let session = JsonFileSessionStore::open(&cli.session)
        .with_context(|| format!("failed to open session {}", cli.session.display()))?;

    SnapshotStore::new(config, Arc::new(client), Arc::new(session))
        .context("invalid course name patterns")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let store = build_store(&cli, &config)?;

    match &cli.command {
        Commands::Populate { csv, report: out } => {
            let courses = pipeline::read_courses_csv(csv)
                .with_context(|| format!("failed to read courses from {}", csv.display()))?;
            let batch = pipeline::populate_all(&store, &courses, config.concurrency()).await;
            println!(
                "Processed {} courses: {} succeeded ({} already cached), {} failed.",
                batch.processed, batch.succeeded, batch.skipped, batch.failed
            );
            if let Some(out) = out {
                let text = report::build_report(&store.snapshots(), &config.rating_scale, Some(&batch));
                std::fs::write(out, text)?;
                println!("Report written to {}.", out.display());
            }
        }
        Commands::Show { course } => match store.get(course) {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => println!("No snapshot cached for course {course}."),
        },
        Commands::Refresh {
            course,
            name,
            page,
            force,
        } => match store.refresh(course, name, *page, *force).await {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => println!("No grade available for course {course}."),
        },
        Commands::Report { out } => {
            let text = report::build_report(&store.snapshots(), &config.rating_scale, None);
            std::fs::write(out, text)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Clear => {
            let removed = store.clear_all();
            println!("Cleared {removed} cached snapshots.");
        }
    }

    Ok(())
}
