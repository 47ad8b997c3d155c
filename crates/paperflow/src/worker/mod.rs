pub mod item;
pub mod pool;
pub mod scanner;
pub mod task;

pub use item::WorkItem;
pub use pool::{PoolStats, WorkerPool, WorkerStats};
pub use scanner::InboxScanner;
pub use task::{FileProcessor, TaskHandle, DEFAULT_QUEUE_CAPACITY, POLL_INTERVAL, SERVER_ERROR};

// Re-export crossbeam_channel for use in main
pub use crossbeam_channel;
