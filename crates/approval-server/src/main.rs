//! Approval workflow host
//!
//! Runs a single review against the back office, queues one in the review
//! inbox, or watches the inbox and processes reviews as they arrive.

use anyhow::Context;
use approval_core::approval_types::{ReviewSubmission, TaskId, UserId};
use approval_core::{
    paths, ApprovalBackend, ApprovalWorkflowAdvancer, MaharatApiClient, MaharatConfig,
    MaharatError, ReviewInbox, ReviewWorker,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Exit code when the back office refuses the status update for lack of a main budget
const EXIT_NO_MAIN_BUDGET: i32 = 2;

fn cli() -> Command {
    Command::new("approval-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Maharat approval workflow advancer")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file path [default: /app/config/maharat.json]"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Review inbox directory (overrides inbox.root from the config)"),
        )
        .arg(
            Arg::new("task-id")
                .long("task-id")
                .value_name("ID")
                .help("Task being reviewed")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("user-id")
                .long("user-id")
                .value_name("ID")
                .help("User submitting the review")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("action")
                .long("action")
                .value_name("ACTION")
                .help("Approve, Refer or Reject"),
        )
        .arg(
            Arg::new("description")
                .long("description")
                .value_name("TEXT")
                .help("Reviewer comment"),
        )
        .arg(
            Arg::new("referred-to")
                .long("referred-to")
                .value_name("ID")
                .help("User a referral is addressed to")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("submit")
                .long("submit")
                .help("Queue the review in the inbox instead of running it")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("monitor-reviews")
                .long("monitor-reviews")
                .help("Process queued reviews and watch for new ones")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["task-id", "submit"]),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();

    let config_path = config_path_from_args(&matches);
    let config = MaharatConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    log::info!("Loaded configuration from {}", config_path.display());

    let reviews_root = matches
        .get_one::<String>("data-dir")
        .cloned()
        .unwrap_or_else(|| config.inbox.root.display().to_string());
    if let Err(e) = paths::init_reviews_root(reviews_root) {
        log::warn!("Reviews root initialization warning: {}", e);
    }
    log::info!("Using review inbox at {}", paths::reviews_root().display());

    if matches.get_flag("monitor-reviews") {
        let client = MaharatApiClient::new(config.api.clone())?;
        let advancer = Arc::new(ApprovalWorkflowAdvancer::with_config(client, config.workflow.clone()));
        let inbox = Arc::new(ReviewInbox::new(paths::reviews_root())?);
        return monitor_reviews(ReviewWorker::new(inbox, advancer)).await;
    }

    let (task_id, requester, submission) = review_from_args(&matches)?;

    if matches.get_flag("submit") {
        let inbox = ReviewInbox::new(paths::reviews_root())?;
        let request_id = inbox.submit(task_id, requester, submission)?;
        println!("{}", request_id);
        return Ok(());
    }

    let client = MaharatApiClient::new(config.api.clone())?;
    let advancer = ApprovalWorkflowAdvancer::with_config(client, config.workflow.clone());
    run_review(&advancer, task_id, requester, submission).await
}

fn config_path_from_args(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(paths::config_path)
}

fn review_from_args(matches: &ArgMatches) -> anyhow::Result<(TaskId, UserId, ReviewSubmission)> {
    let task_id = matches
        .get_one::<u64>("task-id")
        .copied()
        .context("--task-id is required (or use --monitor-reviews)")?;
    let user_id = matches
        .get_one::<u64>("user-id")
        .copied()
        .context("--user-id is required")?;

    // Empty values are left to review validation so they are reported the same way everywhere
    let description = matches.get_one::<String>("description").cloned().unwrap_or_default();
    let action = matches.get_one::<String>("action").cloned().unwrap_or_default();

    let mut submission = ReviewSubmission::new(description, action);
    if let Some(referred_to) = matches.get_one::<u64>("referred-to") {
        submission = submission.referred_to(UserId::new(*referred_to));
    }

    Ok((TaskId::new(task_id), UserId::new(user_id), submission))
}

async fn run_review(
    advancer: &ApprovalWorkflowAdvancer<MaharatApiClient>,
    task_id: TaskId,
    requester: UserId,
    submission: ReviewSubmission,
) -> anyhow::Result<()> {
    submission.validate()?;

    let task = advancer.backend().load_task(task_id).await?;

    match advancer.advance(&task, &submission, requester).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(MaharatError::NoMainBudget { message, partial }) => {
            eprintln!("{}", message);
            if let Some(report) = partial {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            std::process::exit(EXIT_NO_MAIN_BUDGET);
        }
        Err(e) => Err(e.into()),
    }
}

async fn monitor_reviews(worker: ReviewWorker<MaharatApiClient>) -> anyhow::Result<()> {
    let pending_dir = worker.inbox().state_dir(approval_core::ReviewState::Pending);
    log::info!("Monitoring review requests in {}/", pending_dir.display());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| match result {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => log::error!("Watcher error: {}", e),
        },
        notify::Config::default(),
    )?;
    watcher.watch(&pending_dir, RecursiveMode::NonRecursive)?;

    // Whatever was queued while nobody was watching
    match worker.process_pending().await {
        Ok(handled) => log::info!("Processed {} queued reviews, watching for new ones", handled),
        Err(e) => log::error!("Failed to list queued reviews, watching for new ones: {}", e),
    }

    while let Some(event) = rx.recv().await {
        log::debug!("File system event: {:?}", event);

        // The inbox writes a temporary and renames it into place
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            continue;
        }

        for path in event.paths {
            if let Err(e) = worker.process_file(&path).await {
                log::error!("Failed to process review file {:?}: {}", path, e);
            }
        }
    }

    log::warn!("File watcher stopped");
    Ok(())
}
