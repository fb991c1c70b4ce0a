//! Placement engine
//!
//! Keeps a company's task graph consistent after completions and derives
//! per-recipient submissions from dependency artifacts.
//!
//! ```no_run
//! use placement_core::{Engine, EngineConfig, InMemoryStore};
//! use placement_graph::TaskId;
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let store = Arc::new(InMemoryStore::load_json("snapshot.json").await?);
//! let engine = Engine::new(store, EngineConfig::load("placement.toml")?);
//!
//! let report = engine.complete_task(&TaskId::from("collect-documents")).await?;
//! for change in &report.updated {
//!     println!("{}: {} -> {}", change.task_id, change.from, change.to);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod propagation;
pub mod store;
pub mod submission;
pub mod synthesis;

pub use config::{
    CacheConfig, EngineConfig, PropagationConfig, SynthesisConfig, DEFAULT_SUBJECT_TEMPLATE,
};
pub use engine::Engine;
pub use error::{ConfigError, EngineError, Result, StoreError, TaskFailure};
pub use lock::CompanyLocks;
pub use propagation::{plan, Plan, PropagationReport, RunKind};
pub use store::{InMemoryStore, Snapshot, StatusChange, TaskStore};
pub use submission::{Attachment, Submission, SubmissionId, SubmissionStatus};
pub use synthesis::{
    normalize_recipient, recipient_name, synthesize, DependencyOutput, SourceBlock,
    SynthesisReport,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
