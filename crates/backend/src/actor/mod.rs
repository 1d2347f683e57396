//! Long-running tasks of the daemon
//!
//! # Architecture
//!
//! - Each component runs as a long-lived task with its own event loop
//! - The watcher and the processor communicate over a bounded `mpsc` queue
//! - The processor and the status refresher share one [`RunState`]
//! - Every loop selects on a child of the daemon's `CancellationToken`
//!
//! ```text
//! FileWatcher ──(changed paths, bounded)──> Processor ──> RunState <── StatusRefresher
//! ```

mod processor;
mod state;
mod status;
mod watcher;

#[cfg(test)]
mod __tests__;

pub use processor::Processor;
pub use state::RunState;
pub use status::StatusRefresher;
pub use watcher::{FileWatcher, RegisterError};
