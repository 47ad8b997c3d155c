use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use paperflow::config::load_config;
use paperflow::db::{user_repo, Database};
use paperflow::processor::{ExtractorRegistry, ImageThumbnailer};
use paperflow::worker::POLL_INTERVAL;
use paperflow::{
    logging, Alerting, Config, DocumentPaths, Pipeline, Stores, WorkItem, WorkerPool,
};
use tracing::{error, info, warn};

const USAGE: &str = "usage: paperflow <config.json> [add-user <name>]";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(config_path) = args.first().map(PathBuf::from) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.logging);

    let result = match args.get(1).map(String::as_str) {
        None => run(config),
        Some("add-user") => match args.get(2) {
            Some(name) => add_user(&config, name),
            None => {
                eprintln!("{}", USAGE);
                return ExitCode::from(2);
            }
        },
        Some(other) => {
            eprintln!("unknown command '{}'\n{}", other, USAGE);
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_database(config: &Config) -> paperflow::Result<Database> {
    let path = config.database_path().ok_or_else(|| {
        paperflow::PaperflowError::InvalidValue(
            "no database_path configured and no home directory found".to_string(),
        )
    })?;
    Ok(Database::open(&path)?)
}

/// Registers a user and creates their inbox directory.
fn add_user(config: &Config, name: &str) -> paperflow::Result<()> {
    let db = open_database(config)?;
    let user = user_repo::insert(&db, name)?;
    let inbox = config.input_directory.join(name);
    paperflow::storage::ensure_directory(&inbox)?;
    info!(user_id = user.id, "Added user '{}' with inbox {}", name, inbox.display());
    Ok(())
}

fn run(config: Config) -> paperflow::Result<()> {
    let db = open_database(&config)?;
    let stores = Stores::from_database(db);

    paperflow::storage::ensure_directory(&config.input_directory)?;
    let paths = DocumentPaths::new(&config.documents_directory, &config.thumbnail_directory);
    let pipeline = Pipeline::new(
        stores,
        None,
        Arc::new(ExtractorRegistry::new(&config.extraction)),
        Arc::new(ImageThumbnailer::default()),
        paths,
    );

    if config.alerting.enabled {
        warn!("Alerting is enabled but no mail transport is configured; worker faults are logged only");
    }
    let alerting = Alerting::new(config.alerting.enabled, None);

    let pool = Arc::new(WorkerPool::new(
        pipeline,
        alerting,
        config.worker_count,
        config.queue_capacity,
    )?);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            info!("Received interrupt, shutting down...");
            shutdown.store(true, Ordering::Relaxed);
        })
        .map_err(|e| paperflow::PaperflowError::Internal(format!("signal handler: {}", e)))?;
    }

    let scanner = paperflow::InboxScanner::new(&config.input_directory);
    for path in scanner.scan()? {
        submit(&pool, &shutdown, path);
    }

    let watcher = {
        let shutdown = Arc::clone(&shutdown);
        let pool = Arc::clone(&pool);
        thread::Builder::new()
            .name("paperflow-inbox".to_string())
            .spawn(move || {
                let flag = Arc::clone(&shutdown);
                scanner.watch(
                    move |path| {
                        submit(&pool, &flag, path);
                    },
                    shutdown,
                )
            })
            .map_err(|e| paperflow::WorkerError::SpawnFailed(e.to_string()))?
    };

    while !shutdown.load(Ordering::Relaxed) && !watcher.is_finished() {
        thread::sleep(Duration::from_millis(200));
    }
    shutdown.store(true, Ordering::Relaxed);
    pool.shutdown();

    match watcher.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Inbox watcher failed: {}", e),
        Err(_) => error!("Inbox watcher panicked"),
    }

    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.wait(),
        Err(_) => warn!("Worker pool still referenced; not waiting for workers"),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Queues an inbox file, waiting while every worker queue is full. Returns
/// the id of the task that took the file.
fn submit(pool: &WorkerPool, shutdown: &AtomicBool, path: PathBuf) -> Option<usize> {
    let shown = path.display().to_string();
    let item = WorkItem::File(path);
    loop {
        match pool.submit(item.clone()) {
            Ok(task_id) => {
                info!(task_id, "Queued {}", shown);
                return Some(task_id);
            }
            Err(e) if e.is_queue_full() && !shutdown.load(Ordering::Relaxed) => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                warn!("Could not queue {}: {}", shown, e);
                return None;
            }
        }
    }
}
