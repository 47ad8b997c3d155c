use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::TrySendError;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::alert::Alerting;
use crate::error::{PaperflowError, Result, WorkerError};
use crate::pipeline::Pipeline;
use crate::worker::item::WorkItem;
use crate::worker::task::{FileProcessor, TaskHandle};

/// Point-in-time view of one worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub id: usize,
    pub idle: bool,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub processing_duration_ms: u64,
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub workers: Vec<WorkerStats>,
}

impl PoolStats {
    pub fn busy(&self) -> usize {
        self.workers.iter().filter(|w| !w.idle).count()
    }

    pub fn queued(&self) -> usize {
        self.workers.iter().map(|w| w.queue_depth).sum()
    }
}

/// Fixed set of worker tasks, each with its own bounded queue.
pub struct WorkerPool {
    handles: Vec<TaskHandle>,
    joins: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(
        pipeline: Pipeline,
        alerting: Alerting,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Result<Self> {
        if worker_count == 0 {
            return Err(PaperflowError::InvalidValue(
                "worker_count must be > 0".to_string(),
            ));
        }
        if queue_capacity == 0 {
            return Err(PaperflowError::InvalidValue(
                "queue_capacity must be > 0".to_string(),
            ));
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(worker_count);
        let mut joins = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let (handle, join) = FileProcessor::spawn(
                id,
                queue_capacity,
                pipeline.clone(),
                alerting.clone(),
                Arc::clone(&shutdown),
            )?;
            handles.push(handle);
            joins.push(join);
        }

        info!(
            "Started {} workers (queue capacity {})",
            worker_count, queue_capacity
        );

        Ok(Self {
            handles,
            joins,
            shutdown,
        })
    }

    /// Hands `item` to the least-loaded worker: idle workers first, then the
    /// shortest queue. Returns the chosen worker id.
    pub fn submit(&self, item: WorkItem) -> Result<usize> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed.into());
        }

        let mut candidates: Vec<&TaskHandle> = self.handles.iter().collect();
        candidates.sort_by_key(|h| (!h.is_idle(), h.queue_depth(), h.id()));

        let mut item = item;
        for handle in candidates {
            match handle.try_enqueue(item) {
                Ok(()) => {
                    debug!(task_id = handle.id(), "item queued");
                    return Ok(handle.id());
                }
                Err(TrySendError::Full(returned)) => item = returned,
                Err(TrySendError::Disconnected(_)) => {
                    return Err(WorkerError::ChannelClosed.into())
                }
            }
        }

        let capacity = self.handles.first().map(TaskHandle::capacity).unwrap_or(0);
        Err(PaperflowError::QueueFull { capacity })
    }

    pub fn handles(&self) -> &[TaskHandle] {
        &self.handles
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self
                .handles
                .iter()
                .map(|h| WorkerStats {
                    id: h.id(),
                    idle: h.is_idle(),
                    queue_depth: h.queue_depth(),
                    queue_capacity: h.capacity(),
                    processing_duration_ms: h.processing_duration_ms(),
                    document_id: h.document_being_processed(),
                })
                .collect(),
        }
    }

    /// Asks every worker to stop after its current item.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Closes every queue and joins the worker threads. Items already queued
    /// are drained unless shutdown was requested.
    pub fn wait(self) {
        drop(self.handles);

        for (i, join) in self.joins.into_iter().enumerate() {
            if let Err(e) = join.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}
