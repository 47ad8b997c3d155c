//! A single long-lived worker ("task") with its own bounded queue.
//!
//! Items are processed one at a time. A panic while processing an item is
//! caught and turned into a cancellation of the in-flight document, then
//! reported; the worker then keeps serving its queue.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, info, info_span, warn};

use crate::alert::{AlertDetails, Alerting};
use crate::error::{PaperflowError, Result, WorkerError};
use crate::models::Document;
use crate::pipeline::{Pipeline, SourceFile};
use crate::worker::item::WorkItem;

/// How long the loop waits for an item before re-checking for shutdown.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Reason recorded on documents whose processing panicked.
pub const SERVER_ERROR: &str = "server error";

/// State shared with metrics readers. Locks are held only for a field
/// read or write.
#[derive(Debug)]
struct TaskState {
    idle: bool,
    document_id: Option<String>,
    started_at: Option<Instant>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            idle: true,
            document_id: None,
            started_at: None,
        }
    }
}

/// Marks the task busy for one item and idle again when dropped, whichever
/// way handling the item ends.
struct BusyGuard {
    state: Arc<RwLock<TaskState>>,
}

impl BusyGuard {
    fn start(state: &Arc<RwLock<TaskState>>, document_id: Option<&str>) -> Self {
        {
            let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
            state.idle = false;
            state.started_at = Some(Instant::now());
            state.document_id = document_id.map(str::to_string);
        }
        Self {
            state: Arc::clone(state),
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.idle = true;
        state.started_at = None;
        state.document_id = None;
    }
}

/// Cloneable handle for enqueueing work and reading a task's state.
#[derive(Clone)]
pub struct TaskHandle {
    id: usize,
    sender: Sender<WorkItem>,
    capacity: usize,
    state: Arc<RwLock<TaskState>>,
}

impl TaskHandle {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queues `item` without blocking.
    pub fn enqueue(&self, item: WorkItem) -> Result<()> {
        self.try_enqueue(item).map_err(|e| match e {
            TrySendError::Full(_) => PaperflowError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => WorkerError::ChannelClosed.into(),
        })
    }

    /// Like [`TaskHandle::enqueue`] but hands the item back on failure.
    pub(crate) fn try_enqueue(
        &self,
        item: WorkItem,
    ) -> std::result::Result<(), TrySendError<WorkItem>> {
        self.sender.try_send(item)
    }

    pub fn queue_depth(&self) -> usize {
        self.sender.len()
    }

    pub fn is_idle(&self) -> bool {
        self.read().idle
    }

    /// Milliseconds spent on the current item, 0 when idle.
    pub fn processing_duration_ms(&self) -> u64 {
        self.read()
            .started_at
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn document_being_processed(&self) -> Option<String> {
        self.read().document_id.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, TaskState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct FileProcessor {
    id: usize,
    receiver: Receiver<WorkItem>,
    state: Arc<RwLock<TaskState>>,
    shutdown: Arc<AtomicBool>,
    pipeline: Pipeline,
    alerting: Alerting,
    /// Document being processed; outlives a panic so it can be cancelled.
    current: Option<Document>,
}

impl FileProcessor {
    /// Creates a task and its handle without starting a thread.
    pub fn new(
        id: usize,
        capacity: usize,
        pipeline: Pipeline,
        alerting: Alerting,
        shutdown: Arc<AtomicBool>,
    ) -> (Self, TaskHandle) {
        let (sender, receiver) = bounded(capacity);
        let state = Arc::new(RwLock::new(TaskState::default()));
        let handle = TaskHandle {
            id,
            sender,
            capacity,
            state: Arc::clone(&state),
        };
        let task = Self {
            id,
            receiver,
            state,
            shutdown,
            pipeline,
            alerting,
            current: None,
        };
        (task, handle)
    }

    /// Starts the task on its own thread.
    pub fn spawn(
        id: usize,
        capacity: usize,
        pipeline: Pipeline,
        alerting: Alerting,
        shutdown: Arc<AtomicBool>,
    ) -> Result<(TaskHandle, JoinHandle<()>)> {
        let (task, handle) = Self::new(id, capacity, pipeline, alerting, shutdown);
        let join = thread::Builder::new()
            .name(format!("paperflow-task-{}", id))
            .spawn(move || task.run())
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
        Ok((handle, join))
    }

    /// Serves the queue until shutdown is requested or every handle is dropped.
    pub fn run(mut self) {
        debug!("Task {} started", self.id);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("Task {} received shutdown signal", self.id);
                break;
            }

            match self.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(item) => self.handle(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Task {} queue disconnected", self.id);
                    break;
                }
            }
        }

        debug!("Task {} stopped", self.id);
    }

    fn handle(&mut self, item: WorkItem) {
        let _span = info_span!("task", task_id = self.id).entered();
        let _busy = BusyGuard::start(&self.state, item.document_id());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(item)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(document_id = ?self.current_id(), "process item: {}", e);
                if self.current.is_some() {
                    self.cancel_contained(&e.to_string());
                }
            }
            Err(payload) => self.recover_panic(payload),
        }

        self.current = None;
    }

    fn process(&mut self, item: WorkItem) -> Result<()> {
        match item {
            WorkItem::File(path) => self.process_file(&path),
            WorkItem::Document {
                document,
                source_file,
            } => self.process_document(*document, source_file),
        }
    }

    /// Ingests a new inbox file: duplicate check, record creation, then
    /// hash, thumbnail and content steps.
    fn process_file(&mut self, path: &Path) -> Result<()> {
        info!("task {}, process file {}", self.id, path.display());

        let mut source = SourceFile::new(path);
        let hash = source.hash()?;

        match self.pipeline.stores().documents.get_by_hash(None, &hash) {
            Ok(_) => {
                info!("file {} is a duplicate, ignore file", path.display());
                return Ok(());
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let document = self.create_document_record(path, &hash)?;
        self.set_current(document);

        source = self.store_source(source, &hash);

        let pipeline = &self.pipeline;
        let Some(doc) = self.current.as_mut() else {
            return Ok(());
        };

        pipeline.update_hash(doc, &mut source)?;

        info!("generate thumbnail");
        if let Err(e) = pipeline.generate_thumbnail(doc, &source) {
            warn!("generate thumbnail: {}", e);
        }

        info!("parse content");
        if let Err(e) = pipeline.parse_content(doc, &source) {
            warn!("parse document content: {}", e);
        }

        Ok(())
    }

    /// Runs every step for an existing document. A hash failure aborts the
    /// item; later steps are best-effort.
    fn process_document(&mut self, document: Document, source_file: PathBuf) -> Result<()> {
        info!("task {}, process document {}", self.id, document.id);
        self.set_current(document);

        let pipeline = &self.pipeline;
        let Some(doc) = self.current.as_mut() else {
            return Ok(());
        };
        let mut source = SourceFile::new(source_file);

        pipeline.update_hash(doc, &mut source)?;

        if let Err(e) = pipeline.generate_thumbnail(doc, &source) {
            warn!("generate thumbnail: {}", e);
        }
        if let Err(e) = pipeline.parse_content(doc, &source) {
            warn!("parse document content: {}", e);
        }
        if let Err(e) = pipeline.run_rules(doc) {
            warn!("run rules: {}", e);
        }
        if let Err(e) = pipeline.index_search_content(doc) {
            warn!("index search content: {}", e);
        }

        Ok(())
    }

    /// Creates the record for an inbox file. The owner is the user named
    /// like the file's parent directory.
    fn create_document_record(&self, path: &Path, hash: &str) -> Result<Document> {
        let user_name = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PaperflowError::InvalidValue(format!(
                    "no user directory in path {}",
                    path.display()
                ))
            })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PaperflowError::InvalidValue(format!("no file name in path {}", path.display()))
            })?;

        let stores = self.pipeline.stores();
        let user = stores.users.get_user_by_name(user_name).map_err(|e| {
            if e.is_not_found() {
                PaperflowError::NotFound(format!(
                    "user '{}'; ensure the user has a properly named inbox directory",
                    user_name
                ))
            } else {
                e
            }
        })?;

        let mut document = Document::new(user.id, file_name, hash.to_string());
        document.size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        stores.documents.create(&document)?;
        info!(document_id = %document.id, user = user_name, "created document record");
        Ok(document)
    }

    /// Moves a freshly ingested file into the documents directory. On failure
    /// the file is processed where it is.
    fn store_source(&self, source: SourceFile, hash: &str) -> SourceFile {
        let inbox_path = source.path().to_path_buf();
        drop(source);
        match self.pipeline.paths().store(&inbox_path, hash) {
            Ok(stored) => SourceFile::new(stored),
            Err(e) => {
                warn!("store file {}: {}", inbox_path.display(), e);
                SourceFile::new(inbox_path)
            }
        }
    }

    /// Cancels the in-flight document, then alerts. Neither a panicking
    /// store nor a panicking alert sink may take the worker down.
    fn recover_panic(&mut self, payload: Box<dyn Any + Send>) {
        let message = format!(
            "fatal error in processing task {}: panic: {}",
            self.id,
            panic_message(payload.as_ref())
        );
        let backtrace = std::backtrace::Backtrace::capture().to_string();
        let document_id = self.current_id();

        error!(
            task_id = self.id,
            document_id = ?document_id,
            stack = %backtrace,
            "panic in task: {}",
            message
        );

        self.cancel_contained(SERVER_ERROR);

        let details = AlertDetails {
            message,
            task_id: self.id,
            document_id,
            backtrace,
        };
        let alerting = &self.alerting;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| alerting.notify(&details))) {
            error!(
                task_id = self.id,
                "panic while sending alert: {}",
                panic_message(payload.as_ref())
            );
        }
    }

    fn cancel_contained(&mut self, reason: &str) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.cancel(reason))) {
            error!(
                task_id = self.id,
                document_id = ?self.current_id(),
                "panic while cancelling document: {}",
                panic_message(payload.as_ref())
            );
            self.current = None;
        }
    }

    fn cancel(&mut self, reason: &str) {
        if let Some(doc) = self.current.as_mut() {
            if let Err(e) = self.pipeline.cancel_document_processing(doc, reason) {
                error!("cancel document processing: {}", e);
                return;
            }
        }
        self.current = None;
        self.write().document_id = None;
    }

    fn set_current(&mut self, document: Document) {
        self.write().document_id = Some(document.id.clone());
        self.current = Some(document);
    }

    fn current_id(&self) -> Option<String> {
        self.current.as_ref().map(|d| d.id.clone())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TaskState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_busy_guard_resets_state_on_unwind() {
        let state = Arc::new(RwLock::new(TaskState::default()));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _busy = BusyGuard::start(&state, Some("doc-1"));
            {
                let busy = state.read().unwrap();
                assert!(!busy.idle);
                assert_eq!(busy.document_id.as_deref(), Some("doc-1"));
                assert!(busy.started_at.is_some());
            }
            panic!("handler blew up");
        }));

        assert!(result.is_err());
        let after = state.read().unwrap_or_else(PoisonError::into_inner);
        assert!(after.idle);
        assert!(after.document_id.is_none());
        assert!(after.started_at.is_none());
    }

    #[test]
    fn test_task_state_defaults_to_idle() {
        let state = TaskState::default();
        assert!(state.idle);
        assert!(state.document_id.is_none());
        assert!(state.started_at.is_none());
    }
}
