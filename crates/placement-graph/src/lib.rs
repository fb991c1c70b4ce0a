//! Placement task graph
//!
//! The data model and the pure rules of a company's workflow:
//!
//! - [`Task`], [`TaskStatus`], [`InterfaceType`]: the node model, with status
//!   spellings normalized at the serde boundary
//! - [`resolve`]: dependency gating for a single task
//! - [`validate_transition`]: which status writes are legal for which cause
//! - [`derive_interface_type`]: the one decision of how a task is presented
//! - [`TaskGraph`]: forward-edge index with cycle detection
//!
//! Nothing here performs I/O; the engine in `placement-core` feeds it
//! snapshots from the store.

#![warn(unreachable_pub)]

pub mod dag;
pub mod ids;
pub mod interface;
pub mod resolver;
pub mod status;
pub mod task;

pub use dag::{GraphError, TaskGraph};
pub use ids::{CompanyId, TaskId};
pub use interface::{derive_interface_type, effective_interface_type, SubmissionRules};
pub use resolver::{resolve, resolve_excluding_self, ResolveError, StatusLookup};
pub use status::{
    allowed_transitions, validate_transition, StatusParseError, TaskStatus, TransitionCause,
    TransitionError,
};
pub use task::{InterfaceType, Task};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
