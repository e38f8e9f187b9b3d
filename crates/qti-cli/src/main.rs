//! qti-session - QTI item session runner
//!
//! Drives persisted item sessions one command at a time, the way a
//! delivery system handles one request per candidate action:
//! - Catalog loading and validation
//! - Store initialization
//! - Session engine
//! - Session lifecycle commands

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use qti_config::{Catalog, ResponseProcessingTemplate, load_catalog};
use qti_core::{AttemptResult, ItemSession, ResponseSet, SessionEngine};
use qti_store::{SqliteStore, Store};
use qti_util::{
    CandidateId, ItemId, SystemClock, database_path, default_config_path, format_timestamp,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// qti-session - Run QTI assessment item sessions
#[derive(Parser, Debug)]
#[command(name = "qti-session")]
#[command(about = "Run timed QTI assessment item sessions", long_about = None)]
struct Args {
    /// Item catalog path (default: ~/.config/qti-session/items.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set QTI_SESSION_DATA_DIR env var)
    #[arg(short, long, env = "QTI_SESSION_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Identifies one candidate's session on one item
#[derive(clap::Args, Debug)]
struct SessionTarget {
    /// Candidate identifier
    #[arg(long)]
    candidate: String,

    /// Item identifier
    #[arg(long)]
    item: String,
}

impl SessionTarget {
    fn ids(&self) -> Result<(CandidateId, ItemId)> {
        let candidate = CandidateId::parse(&self.candidate).context("Invalid candidate")?;
        let item = ItemId::parse(&self.item).context("Invalid item")?;
        Ok((candidate, item))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the item catalog
    Validate,

    /// List catalog items
    Items,

    /// Begin a candidate's session on an item
    Begin(SessionTarget),

    /// Open a new attempt
    Attempt(SessionTarget),

    /// End the open attempt with the given responses
    Submit {
        #[command(flatten)]
        target: SessionTarget,

        /// Response value as IDENTIFIER=VALUE (containers comma-separated)
        #[arg(short, long = "response", value_name = "ID=VALUE")]
        responses: Vec<String>,
    },

    /// Close the session, abandoning any open attempt
    Close(SessionTarget),

    /// Show a session's state, timing and variables
    Status(SessionTarget),

    /// List stored sessions
    Sessions {
        /// Only sessions of this candidate
        #[arg(long)]
        candidate: Option<String>,
    },

    /// Discard a stored session
    Reset(SessionTarget),

    /// Show recent audit events
    History {
        /// Number of events to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Serialize)]
struct StatusView {
    candidate: String,
    item: String,
    state: String,
    duration: String,
    num_attempts: u32,
    remaining_attempts: Option<u32>,
    remaining_time: Option<String>,
    completion_status: Option<String>,
    attemptable: bool,
    variables: Vec<(String, Option<String>)>,
}

impl StatusView {
    fn capture(candidate: &CandidateId, session: &mut ItemSession) -> Self {
        let variables = session
            .variables()
            .iter()
            .map(|(id, value)| (id.to_string(), value.map(ToString::to_string)))
            .collect();

        Self {
            candidate: candidate.to_string(),
            item: session.item_id().to_string(),
            state: session.state().to_string(),
            duration: session.duration().to_string(),
            num_attempts: session.num_attempts(),
            remaining_attempts: session.remaining_attempts(),
            remaining_time: session.remaining_time().map(|d| d.to_string()),
            completion_status: session.completion_status().map(|c| c.to_string()),
            attemptable: session.is_attemptable(),
            variables,
        }
    }

    fn print(&self) {
        println!("Session {} / {}", self.candidate, self.item);
        println!("  State: {}", self.state);
        println!("  Duration: {}", self.duration);
        println!("  Attempts: {}", self.num_attempts);
        println!(
            "  Remaining attempts: {}",
            self.remaining_attempts
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unlimited".into())
        );
        println!(
            "  Remaining time: {}",
            self.remaining_time.as_deref().unwrap_or("unlimited")
        );
        if let Some(status) = &self.completion_status {
            println!("  Completion: {}", status);
        }
        println!("  Attemptable: {}", if self.attemptable { "yes" } else { "no" });
        println!("  Variables:");
        for (id, value) in &self.variables {
            println!("    {} = {}", id, value.as_deref().unwrap_or("NULL"));
        }
    }
}

fn parse_responses(session: &ItemSession, raw: &[String]) -> Result<ResponseSet> {
    let mut responses = ResponseSet::new();
    for entry in raw {
        let Some((identifier, value)) = entry.split_once('=') else {
            bail!("Response '{}' must be written as IDENTIFIER=VALUE", entry);
        };
        let identifier = identifier.trim();
        let value = session
            .parse_value(identifier, value)
            .with_context(|| format!("Invalid value for response '{}'", identifier))?;
        responses.insert(identifier, Some(value));
    }
    Ok(responses)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_items(catalog: &Catalog) {
    for item in &catalog.items {
        let attempts = match item.control.attempts.max_attempts {
            0 => "unlimited".to_string(),
            n => n.to_string(),
        };
        let processing = match &item.response_processing {
            ResponseProcessingTemplate::None => "none",
            ResponseProcessingTemplate::MatchCorrect { .. } => "match_correct",
        };
        println!(
            "{}\t{}\tmin={}\tmax={}\tattempts={}\tprocessing={}{}",
            item.id,
            item.title.as_deref().unwrap_or("-"),
            item.time_limits
                .min_time
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            item.time_limits
                .max_time
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            attempts,
            processing,
            if item.adaptive { "\tadaptive" } else { "" }
        );
    }
}

fn open_engine(args: &Args, catalog: Catalog) -> Result<SessionEngine> {
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| catalog.session.data_dir.clone());
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let db_path = database_path(&data_dir);
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open store at {:?}", db_path))?,
    );
    debug!(path = %db_path.display(), "Store opened");

    Ok(SessionEngine::new(catalog, store, Arc::new(SystemClock)))
}

fn print_attempt(result: &AttemptResult) {
    println!(
        "Attempt accepted: duration {}, session {}{}",
        result.duration,
        result.state,
        if result.late_submission {
            " (late submission)"
        } else {
            ""
        }
    );
}

fn run(args: Args) -> Result<()> {
    let catalog = load_catalog(&args.config)
        .with_context(|| format!("Failed to load catalog from {:?}", args.config))?;

    info!(
        config_path = %args.config.display(),
        item_count = catalog.items.len(),
        "Catalog loaded"
    );

    match &args.command {
        Command::Validate => {
            println!("✓ Catalog is valid ({} items)", catalog.items.len());
            return Ok(());
        }
        Command::Items => {
            print_items(&catalog);
            return Ok(());
        }
        _ => {}
    }

    let engine = open_engine(&args, catalog)?;

    match &args.command {
        Command::Validate | Command::Items => {}
        Command::Begin(target) => {
            let (candidate, item) = target.ids()?;
            engine.with_session(&candidate, &item, |s| s.begin_session())?;
            println!("Session begun for {} on {}", candidate, item);
        }
        Command::Attempt(target) => {
            let (candidate, item) = target.ids()?;
            let remaining = engine.with_session(&candidate, &item, |s| {
                s.begin_attempt()?;
                Ok(s.remaining_time())
            })?;
            match remaining {
                Some(time) => println!("Attempt open, {} remaining", time),
                None => println!("Attempt open"),
            }
        }
        Command::Submit { target, responses } => {
            let (candidate, item) = target.ids()?;
            let session = engine.open(&candidate, &item)?;
            let responses = parse_responses(&session, responses)?;

            let result = engine.with_session(&candidate, &item, |s| s.end_attempt(responses))?;
            if args.json {
                print_json(&serde_json::json!({
                    "state": result.state,
                    "duration": result.duration,
                    "late_submission": result.late_submission,
                }))?;
            } else {
                print_attempt(&result);
            }
        }
        Command::Close(target) => {
            let (candidate, item) = target.ids()?;
            engine.with_session(&candidate, &item, |s| s.end_item_session())?;
            println!("Session closed");
        }
        Command::Status(target) => {
            let (candidate, item) = target.ids()?;
            let view = engine.inspect(&candidate, &item, |s| StatusView::capture(&candidate, s))?;

            if args.json {
                print_json(&view)?;
            } else {
                view.print();
            }
        }
        Command::Sessions { candidate } => {
            let candidate = candidate
                .as_deref()
                .map(CandidateId::parse)
                .transpose()
                .context("Invalid candidate")?;
            let records = engine.sessions(candidate.as_ref())?;

            if args.json {
                print_json(&records)?;
            } else {
                for record in records {
                    println!(
                        "{}\t{}\t{}\t{}",
                        record.candidate_id,
                        record.item_id,
                        record.state,
                        format_timestamp(&record.updated_at)
                    );
                }
            }
        }
        Command::Reset(target) => {
            let (candidate, item) = target.ids()?;
            if engine.reset(&candidate, &item)? {
                println!("Session discarded");
            } else {
                println!("No stored session");
            }
        }
        Command::History { limit } => {
            let events = engine.history(*limit)?;

            if args.json {
                print_json(&events)?;
            } else {
                for event in events {
                    println!(
                        "{}\t{}",
                        format_timestamp(&event.timestamp),
                        serde_json::to_string(&event.event)?
                    );
                }
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if qti_util::is_mock_time_active() {
        info!("Mock time active");
    }

    run(args)
}
