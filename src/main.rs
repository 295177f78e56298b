use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showrunner::config::Config;
use showrunner::error::{Error, ShowrunnerErrorTrait};
use showrunner::models::ScheduleItem;
use showrunner::scheduler::time::{generate_time_slots, parse_date, parse_time};
use showrunner::scheduler::{GenerationOutcome, GenerationRequest, ScheduleEngine};
use showrunner::storage::repository::SharedSqliteRepository;
use showrunner::storage::{create_sqlite_repository, CatalogSnapshot, WatchQueueRepository};
use showrunner::utils::{format_minutes_human, truncate_text};

#[derive(Parser)]
#[command(
    name = "showrunner",
    version,
    about = "Generate personal viewing schedules from shows, movies and time slots",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (defaults to SHOWRUNNER_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the daily slot labels between two times
    Slots {
        /// Start time (HH:MM)
        start: String,

        /// End time (HH:MM); at or before start crosses midnight
        end: String,

        /// Step in minutes
        #[arg(default_value = "30")]
        step: u32,
    },

    /// Resolve a local time on a date to a UTC instant
    ParseTime {
        /// Local time (HH:MM)
        label: String,

        /// Calendar date (YYYY-MM-DD)
        date: String,

        /// Signed offset (±HH:MM)
        #[arg(short, long, allow_hyphen_values = true)]
        offset: Option<String>,
    },

    /// Load contents and episodes from a JSON snapshot into the database
    ImportCatalog {
        /// Snapshot file
        file: PathBuf,
    },

    /// Replace a user's watch queue
    Queue {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Content ids in rotation order
        content_ids: Vec<String>,
    },

    /// Generate a schedule for a user
    Generate {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Request file (.toml or .json)
        #[arg(short, long)]
        request: PathBuf,

        /// Compute the schedule without storing items or cursors
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Print the full outcome as JSON
        #[arg(long, default_value = "false")]
        json: bool,

        /// Also write the outcome to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print Prometheus metrics after the run
        #[arg(long, default_value = "false")]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let err = Error::from(e);
            tracing::error!(category = err.category().as_str(), error = %err, "Command failed");
            eprintln!("Error: {}", err.user_message());
            ExitCode::from(err.category().exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    if let Err(e) = showrunner::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    match cli.command {
        Commands::Slots { start, end, step } => {
            for label in generate_time_slots(&start, &end, step)? {
                println!("{label}");
            }
        }

        Commands::ParseTime { label, date, offset } => {
            let date = parse_date(&date)?;
            let instant = parse_time(&label, date, offset.as_deref())?;
            println!("{}", instant.to_rfc3339());
        }

        Commands::ImportCatalog { file } => {
            tracing::info!(file = %file.display(), "Starting catalog import");
            let snapshot = CatalogSnapshot::load(&file).await?;
            let repo = open_repository(&config)?;
            let stats = snapshot.import_into(repo.as_ref())?;
            println!("Imported {} contents, {} episodes", stats.contents, stats.episodes);
        }

        Commands::Queue { user, content_ids } => {
            let repo = open_repository(&config)?;
            repo.set_queue(&user, &content_ids)?;
            println!("Queue for {user}: {} item(s)", content_ids.len());
        }

        Commands::Generate {
            user,
            request,
            dry_run,
            json,
            output,
            metrics,
        } => {
            tracing::info!(user = %user, request = %request.display(), dry_run, "Starting generate command");
            let request = load_request(&request).await?;
            let repo = open_repository(&config)?;
            let engine = ScheduleEngine::from_repository(repo, config.engine.clone());

            let outcome = if dry_run {
                engine.preview(&user, &request).await?
            } else {
                engine.generate_and_commit(&user, &request).await?
            };

            if json {
                println!("{}", outcome.to_json()?);
            } else {
                print_outcome(&outcome, dry_run);
            }

            if let Some(path) = output {
                outcome.save_to_file(&path).await?;
                println!("Outcome written to {}", path.display());
            }

            if metrics {
                let text = showrunner::metrics::gather_metrics().map_err(|e| anyhow::anyhow!("{e}"))?;
                print!("{text}");
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().map_err(|e| Error::config(e.to_string()))?;
    Ok(config)
}

fn open_repository(config: &Config) -> Result<SharedSqliteRepository> {
    create_sqlite_repository(&config.database.sqlite_path)
        .with_context(|| format!("Failed to open {}", config.database.sqlite_path.display()))
}

async fn load_request(path: &Path) -> Result<GenerationRequest> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;

    let request = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON request: {}", path.display()))?,
        _ => toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML request: {}", path.display()))?,
    };

    Ok(request)
}

fn format_item(item: &ScheduleItem) -> String {
    let episode = match (item.season, item.episode) {
        (Some(season), Some(episode)) => format!(" S{season:02}E{episode:02}"),
        _ => String::new(),
    };
    let rerun = if item.is_rerun { " (rerun)" } else { "" };
    format!(
        "{}  {}{} [{}]{}",
        item.scheduled_at.format("%Y-%m-%d %H:%M UTC"),
        truncate_text(&item.content_id, 32),
        episode,
        format_minutes_human(item.duration_minutes),
        rerun
    )
}

fn print_outcome(outcome: &GenerationOutcome, dry_run: bool) {
    if dry_run {
        println!("Dry run: nothing was stored");
    }
    println!("Run {}", outcome.run_id);
    print!("{}", outcome.summary.display());

    if outcome.is_nothing_schedulable() {
        println!("{}", showrunner::scheduler::schedule::NO_CONTENT_AVAILABLE);
        return;
    }

    let grouped = outcome.items_by_date();
    let mut dates: Vec<_> = grouped.keys().copied().collect();
    dates.sort();
    for date in dates {
        println!("\n{date}");
        for item in &grouped[&date] {
            println!("  {}", format_item(item));
        }
    }
}

/// Setup tracing subscriber for logging
fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("showrunner=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("showrunner={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
