//! Placement artifacts
//!
//! Artifacts are the immutable text outputs of completed tasks. This crate
//! holds the artifact record, selection of the current generation of a
//! multi-part output, and the lenient parser that splits generated text into
//! per-recipient blocks.
//!
//! ```
//! use placement_artifact::{parse, DocumentShape};
//!
//! let outcome = parse(r#"<artifact id="Acme">Dear Acme,</artifact>"#);
//! assert_eq!(outcome.shape, DocumentShape::Tagged);
//! assert_eq!(outcome.blocks[0].id.as_deref(), Some("Acme"));
//! ```

#![warn(unreachable_pub)]

pub mod artifact;
pub mod cache;
pub mod hash;
pub mod heading;
pub mod parser;

pub use artifact::{current_parts, Artifact, ArtifactId, CurrentParts, PartIssue};
pub use cache::{CacheStats, ParseCache, DEFAULT_CAPACITY};
pub use hash::{ContentHash, HashError};
pub use heading::first_heading;
pub use parser::{parse, DocumentShape, ParseDiagnostic, ParseOutcome, ParsedBlock};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
