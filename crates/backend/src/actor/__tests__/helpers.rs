//! Test helpers for actor integration tests.
//!
//! Provides in-process fakes for every external collaborator and
//! `PipelineContext`, which owns temporary log and data directories plus a
//! real dedup cache.

use std::{
  path::PathBuf,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::{Duration, SystemTime},
};

use async_trait::async_trait;
use filetime::FileTime;
use tempfile::TempDir;

use crate::{
  db::DedupCache,
  domain::{config::CacheConfig, identifier::Identifier},
  metadata::{AvatarMetadata, MetadataError, MetadataSource},
  presence::{DetailedStatus, PresenceError, PresenceSink},
  upload::{SubmitOutcome, TargetKind, UploadDispatcher, UploadTarget},
};

pub const AVATAR_A: &str = "avtr_11111111-2222-3333-4444-555555555555";
pub const AVATAR_B: &str = "avtr_aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";
pub const AVATAR_C: &str = "avtr_01234567-89ab-cdef-0123-456789abcdef";

pub fn id(raw: &str) -> Identifier {
  Identifier::parse(raw).expect("valid test identifier")
}

/// A line in the shape the client writes when switching avatars.
pub fn log_line(avatar: &str) -> String {
  format!("2025.01.01 12:00:00 Log        -  [Behaviour] Switching Player to avatar {avatar}\n")
}

// ============================================================================
// Presence
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
  Status(String),
  Detailed(DetailedStatus),
}

/// Records every push. `fail_detailed` makes detailed pushes fail; the
/// connected flag only changes through the trait.
#[derive(Default)]
pub struct RecordingPresence {
  connected: AtomicBool,
  fail_detailed: AtomicBool,
  events: Mutex<Vec<PresenceEvent>>,
}

impl RecordingPresence {
  pub fn connected() -> Arc<Self> {
    let sink = Self::default();
    sink.connected.store(true, Ordering::SeqCst);
    Arc::new(sink)
  }

  pub fn disconnected() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn fail_detailed(&self) {
    self.fail_detailed.store(true, Ordering::SeqCst);
  }

  pub fn events(&self) -> Vec<PresenceEvent> {
    self.events.lock().expect("presence lock").clone()
  }

  pub fn statuses(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        PresenceEvent::Status(s) => Some(s),
        PresenceEvent::Detailed(_) => None,
      })
      .collect()
  }

  pub fn last(&self) -> Option<PresenceEvent> {
    self.events().pop()
  }
}

#[async_trait]
impl PresenceSink for RecordingPresence {
  async fn connect(&self) -> Result<(), PresenceError> {
    self.connected.store(true, Ordering::SeqCst);
    Ok(())
  }

  fn is_connected(&self) -> bool {
    self.connected.load(Ordering::SeqCst)
  }

  fn mark_disconnected(&self) {
    self.connected.store(false, Ordering::SeqCst);
  }

  async fn push_status(&self, text: &str) -> Result<(), PresenceError> {
    if !self.is_connected() {
      return Err(PresenceError::NotConnected);
    }
    self
      .events
      .lock()
      .expect("presence lock")
      .push(PresenceEvent::Status(text.to_string()));
    Ok(())
  }

  async fn push_detailed_status(&self, status: &DetailedStatus) -> Result<(), PresenceError> {
    if !self.is_connected() {
      return Err(PresenceError::NotConnected);
    }
    if self.fail_detailed.load(Ordering::SeqCst) {
      return Err(PresenceError::Update("rejected".into()));
    }
    self
      .events
      .lock()
      .expect("presence lock")
      .push(PresenceEvent::Detailed(status.clone()));
    Ok(())
  }

  async fn close(&self) {
    self.connected.store(false, Ordering::SeqCst);
  }
}

// ============================================================================
// Metadata
// ============================================================================

/// Answers every lookup with metadata built from fixed fields, or fails.
pub struct FixedMetadata {
  name: String,
  author: String,
  description: String,
  fail: AtomicBool,
  calls: AtomicUsize,
}

impl FixedMetadata {
  pub fn new(name: &str, author: &str, description: &str) -> Arc<Self> {
    Arc::new(Self {
      name: name.to_string(),
      author: author.to_string(),
      description: description.to_string(),
      fail: AtomicBool::new(false),
      calls: AtomicUsize::new(0),
    })
  }

  pub fn failing() -> Arc<Self> {
    let source = Self::new("", "", "");
    source.fail.store(true, Ordering::SeqCst);
    source
  }

  pub fn set_failing(&self, fail: bool) {
    self.fail.store(fail, Ordering::SeqCst);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl MetadataSource for FixedMetadata {
  async fn fetch(&self, id: &Identifier) -> Result<AvatarMetadata, MetadataError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail.load(Ordering::SeqCst) {
      return Err(MetadataError::Status(503));
    }
    Ok(AvatarMetadata::normalized(
      id.clone(),
      &self.name,
      &self.author,
      &self.description,
      "https://img.example/avatar.png",
    ))
  }
}

// ============================================================================
// Upload targets
// ============================================================================

/// Target that answers every submission with a fixed outcome and records
/// what it was sent.
pub struct FakeTarget {
  kind: TargetKind,
  outcome: SubmitOutcome,
  submitted: Mutex<Vec<Identifier>>,
}

impl FakeTarget {
  pub fn new(kind: TargetKind, outcome: SubmitOutcome) -> Arc<Self> {
    Arc::new(Self {
      kind,
      outcome,
      submitted: Mutex::new(Vec::new()),
    })
  }

  pub fn submitted(&self) -> Vec<Identifier> {
    self.submitted.lock().expect("target lock").clone()
  }
}

#[async_trait]
impl UploadTarget for FakeTarget {
  fn kind(&self) -> TargetKind {
    self.kind
  }

  async fn submit(&self, id: &Identifier) -> SubmitOutcome {
    self.submitted.lock().expect("target lock").push(id.clone());
    self.outcome
  }
}

pub fn dispatcher(targets: &[Arc<FakeTarget>]) -> Arc<UploadDispatcher> {
  let targets = targets
    .iter()
    .map(|t| Arc::clone(t) as Arc<dyn UploadTarget>)
    .collect();
  Arc::new(UploadDispatcher::new(targets))
}

// ============================================================================
// Context
// ============================================================================

/// Temporary log directory plus a real cache in its own data directory.
pub struct PipelineContext {
  pub log_dir: TempDir,
  #[allow(dead_code)]
  pub data_dir: TempDir,
  pub cache: DedupCache,
}

impl PipelineContext {
  pub async fn new() -> Self {
    let log_dir = TempDir::new().expect("create log temp dir");
    let data_dir = TempDir::new().expect("create data temp dir");
    let cache = DedupCache::open(&data_dir.path().join("avatars.sqlite"), &CacheConfig::default())
      .await
      .expect("open cache");

    Self {
      log_dir,
      data_dir,
      cache,
    }
  }

  pub fn log_path(&self, name: &str) -> PathBuf {
    self.log_dir.path().join(name)
  }

  /// Create (or overwrite) a log file.
  pub fn write_log(&self, name: &str, content: &str) -> PathBuf {
    let path = self.log_path(name);
    std::fs::write(&path, content).expect("write log file");
    path
  }
}

/// Append to `path` and push its mtime `secs` into the future so the change
/// is visible regardless of filesystem timestamp granularity.
pub fn append_and_bump(path: &std::path::Path, content: &str, secs: u64) {
  use std::io::Write;

  let mut file = std::fs::OpenOptions::new()
    .append(true)
    .create(true)
    .open(path)
    .expect("open log file");
  file.write_all(content.as_bytes()).expect("append log file");
  drop(file);

  let when = SystemTime::now() + Duration::from_secs(secs);
  filetime::set_file_mtime(path, FileTime::from_system_time(when)).expect("set mtime");
}
