use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer_opt, Config as DebouncerConfig, DebouncedEventKind};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::WorkerError;
use crate::processor::DocumentFormat;

/// Finds new files in per-user inbox directories laid out as
/// `input_directory/<user>/<file>`.
pub struct InboxScanner {
    input_directory: PathBuf,
}

impl InboxScanner {
    pub fn new<P: AsRef<Path>>(input_directory: P) -> Self {
        Self {
            input_directory: input_directory.as_ref().to_path_buf(),
        }
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    /// Lists supported files currently sitting in any user's inbox.
    pub fn scan(&self) -> Result<Vec<PathBuf>, WorkerError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.input_directory)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| WorkerError::ScanFailed {
                path: self.input_directory.clone(),
                source: e,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if is_supported(path) {
                debug!("Found document: {}", path.display());
                files.push(path.to_path_buf());
            }
        }

        info!(
            "Scanned {} documents in {}",
            files.len(),
            self.input_directory.display()
        );
        Ok(files)
    }

    /// Polls the inbox tree and calls `callback` for every new or changed
    /// supported file until `shutdown` is set.
    pub fn watch<F>(&self, callback: F, shutdown: Arc<AtomicBool>) -> Result<(), WorkerError>
    where
        F: Fn(PathBuf) + Send + 'static,
    {
        let input_dir = self.input_directory.clone();

        // PollWatcher also works on network and container mounts
        let poll_config = NotifyConfig::default().with_poll_interval(Duration::from_secs(2));

        let debouncer_config = DebouncerConfig::default()
            .with_timeout(Duration::from_millis(500))
            .with_notify_config(poll_config);

        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&input_dir, RecursiveMode::Recursive)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Watching inbox directory: {}", input_dir.display());

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Inbox watcher shutting down...");
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    for event in events {
                        if !matches!(event.kind, DebouncedEventKind::Any) {
                            continue;
                        }
                        let path = event.path;
                        if path.is_file() && is_inbox_file(&input_dir, &path) && is_supported(&path)
                        {
                            info!("New document detected: {}", path.display());
                            callback(path);
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Watch error: {:?}", e);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    error!("Watch channel disconnected");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentFormat::from_extension)
        .is_some()
}

/// True for `input_dir/<user>/<file>`; deeper or shallower paths are ignored.
fn is_inbox_file(input_dir: &Path, path: &Path) -> bool {
    path.strip_prefix(input_dir)
        .map(|rel| rel.components().count() == 2)
        .unwrap_or(false)
}
