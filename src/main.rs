use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coursetrack::api::{ApiClient, TokenManager};
use coursetrack::config::{FileResumeStore, ProgressCache, ResumeStore, ResumeToken};
use coursetrack::progression::UnitStatus;
use coursetrack::watch::{
    Clock, FlushSource, ManualClock, PlayerEvent, ProgressSync, SystemClock, TimedEvent,
    run_tracker,
};
use coursetrack::{Config, ContentGraph, ProgressionEngine, WatchSessionTracker};
use futures_util::future::try_join3;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coursetrack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the lock state of every item in a course
    Units {
        /// Course ID (defaults to course_id in config.json)
        course: Option<String>,
    },
    /// Fetch the saved playback position of a video
    Resume {
        /// Video ID
        video: String,
        /// Remember this video as the place to resume the course
        #[arg(long, requires = "unit")]
        course: Option<String>,
        /// Unit containing the video
        #[arg(long, requires = "course")]
        unit: Option<String>,
    },
    /// Show where a course was last left off
    Last {
        /// Course ID (defaults to course_id in config.json)
        course: Option<String>,
    },
    /// Run a recorded player-event log through the watch tracker
    Replay {
        /// JSON file with timestamped player events
        events: PathBuf,
        /// Video ID the events belong to
        #[arg(long, default_value = "replay")]
        video: String,
        /// Video duration in seconds
        #[arg(short, long)]
        duration: f64,
        /// Send the resulting flushes to the backend
        #[arg(long)]
        send: bool,
    },
    /// Track a video live from player events on stdin (one JSON event per line)
    Watch {
        /// Video ID
        video: String,
        /// Video duration in seconds
        #[arg(short, long)]
        duration: f64,
    },
    /// Check quiz availability for a unit
    Quiz {
        /// Unit ID
        unit: String,
        /// Start a quiz session if one is available
        #[arg(long)]
        generate: bool,
    },
    /// Store the backend bearer token in the system keyring
    Login {
        /// Bearer token
        token: String,
    },
    /// Remove the stored bearer token
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursetrack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Units { course } => {
            let course_id = config.course(course.as_deref())?;
            show_units(&connect(&config)?, course_id).await?;
        }
        Commands::Resume { video, course, unit } => {
            let client = connect(&config)?;
            let position = client.resume_position(&video).await?;
            println!("{}", serde_json::to_string_pretty(&position)?);

            if let (Some(course_id), Some(unit_id)) = (course, unit) {
                let mut store = FileResumeStore::open_default()?;
                let token = ResumeToken {
                    course_id,
                    unit_id,
                    content_id: video,
                    timestamp: SystemClock.now_ms(),
                };
                store.save(token)?;
            }
        }
        Commands::Last { course } => {
            let course_id = config.course(course.as_deref())?;
            let store = FileResumeStore::open_default()?;
            match store.load(course_id)? {
                Some(token) => println!("{}", serde_json::to_string_pretty(&token)?),
                None => println!("Nothing to resume in {course_id}"),
            }
        }
        Commands::Replay { events, video, duration, send } => {
            replay(&config, &events, &video, duration, send).await?;
        }
        Commands::Watch { video, duration } => {
            watch_stdin(&config, &video, duration).await?;
        }
        Commands::Quiz { unit, generate } => {
            let client = connect(&config)?;
            let availability = client.quiz_availability(&unit).await?;
            println!("{}", serde_json::to_string_pretty(&availability)?);

            if generate {
                if !availability.available {
                    let reason = availability.reason.as_deref().unwrap_or("no reason given");
                    anyhow::bail!("Quiz for {unit} is not available: {reason}");
                }
                let session = client.generate_quiz(&unit).await?;
                println!("Quiz session {} with {} questions", session.id, session.questions.len());
            }
        }
        Commands::Login { token } => {
            TokenManager::set_token(&token)?;
            println!("Stored token {}", TokenManager::mask_token(&token));
        }
        Commands::Logout => {
            TokenManager::delete_token()?;
            println!("Token removed");
        }
    }

    Ok(())
}

/// Build an authenticated client
fn connect(config: &Config) -> Result<ApiClient> {
    let token = TokenManager::resolve()?;
    Ok(ApiClient::from_config(config, Some(token))?)
}

async fn show_units(client: &ApiClient, course_id: &str) -> Result<()> {
    let (units, reviews, status) = try_join3(
        client.course_units(course_id),
        client.units_needing_review(course_id),
        client.progression_status(course_id),
    )
    .await
    .with_context(|| format!("Failed to fetch course {course_id}"))?;

    let mut engine = ProgressionEngine::new(ContentGraph::build(&units));
    if let Some(conflict) = engine.reconcile(&status, reviews) {
        println!("Progression blocked by {}. Remaining:", conflict.blocking_unit_title);
        for item in &conflict.remaining {
            println!("  - [{}] {}", item.kind.label(), item.title);
        }
        println!();
    }

    let locks = engine.lock_state();
    for unit in engine.graph().units() {
        match engine.unit_status(&unit.id) {
            UnitStatus::NeedsReview => println!("{} (new content to review)", unit.title),
            UnitStatus::Open => println!("{}", unit.title),
        }
        for item in &unit.content {
            let status = match locks.get(&item.id).and_then(|lock| lock.message()) {
                Some(reason) => format!("locked: {reason}"),
                None if item.is_complete() => "done".to_string(),
                None => "open".to_string(),
            };
            println!("  [{}] {} ({status})", item.tag().label(), item.title);
        }
    }

    Ok(())
}

async fn replay(
    config: &Config,
    path: &Path,
    video: &str,
    duration: f64,
    send: bool,
) -> Result<()> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let events: Vec<TimedEvent> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse player events in {:?}", path))?;

    let clock = ManualClock::new(events.first().map_or(0, |e| e.at));
    let mut tracker = WatchSessionTracker::with_clock(video, duration, clock.clone());
    let mut sync = if send {
        let mut sync = ProgressSync::new(connect(config)?, ProgressCache::open_default()?);
        sync.resend_unacknowledged().await;
        Some(sync)
    } else {
        None
    };

    let mut flushes = Vec::new();
    for TimedEvent { at, event } in events {
        clock.set(at);
        flushes.extend(tracker.handle(event));
    }
    flushes.extend(tracker.on_unmount());

    for flush in flushes {
        println!("{}", serde_json::to_string(&flush)?);
        match sync.as_mut() {
            Some(sync) => {
                let sequence = flush.sequence;
                let outcome = sync.dispatch(&mut tracker, flush).await;
                if let Some(error) = outcome.error() {
                    eprintln!("flush {sequence} {}: {error}", outcome_label(&outcome));
                }
            }
            None => tracker.acknowledge(flush.sequence),
        }
    }

    if let Some(sync) = sync {
        sync.into_cache().save()?;
    }

    let state = tracker.state();
    eprintln!(
        "watched {:.1}s over {} sessions, {} of {} segments, furthest {:.1}s",
        state.lifetime_watch_time_seconds,
        tracker.sessions().len(),
        state.segments.len(),
        coursetrack::watch::SegmentSet::total_segments(duration),
        state.furthest_position,
    );

    Ok(())
}

fn outcome_label(outcome: &coursetrack::watch::DispatchOutcome) -> &'static str {
    use coursetrack::watch::DispatchOutcome;
    match outcome {
        DispatchOutcome::Delivered => "delivered",
        DispatchOutcome::Retrying(_) => "queued for retry",
        DispatchOutcome::Dropped(_) => "dropped",
        DispatchOutcome::Rejected(_) => "rejected",
    }
}

async fn watch_stdin(config: &Config, video: &str, duration: f64) -> Result<()> {
    let client = connect(config)?;
    let resume = client.resume_position(video).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "no resume position, starting from the beginning");
        Default::default()
    });

    let tracker = WatchSessionTracker::new(video, duration).with_resume(&resume);
    let mut sync = ProgressSync::new(client, ProgressCache::open_default()?);
    sync.resend_unacknowledged().await;
    let (tx, rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    let reader_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    reader_cancel.cancel();
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match serde_json::from_str::<PlayerEvent>(&line) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "ignoring malformed event"),
                    },
                    // End of input unmounts the player
                    Ok(None) | Err(_) => break,
                }
            }
        }
    });

    let tracker = run_tracker(tracker, &mut sync, rx, config.flush_interval(), cancel).await;
    sync.into_cache().save()?;

    eprintln!(
        "watched {:.1}s, position {:.1}s",
        tracker.state().lifetime_watch_time_seconds,
        tracker.position()
    );

    Ok(())
}
