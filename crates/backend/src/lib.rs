mod actor;
mod db;

mod domain;
pub use domain::{config, identifier};

pub mod dirs;
pub mod extract;
pub mod metadata;
pub mod presence;
pub mod upload;

pub use actor::{FileWatcher, Processor, RegisterError, RunState, StatusRefresher};
pub use db::{CacheRecord, DbError, DedupCache};

mod daemon;
pub use daemon::{Daemon, DaemonError, resolve_log_paths};
