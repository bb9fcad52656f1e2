//! On-demand diagram rendering for mmdgen.
//!
//! Diagram artifacts (`.png`, `.svg`, `.pdf`) are rendered lazily from sources
//! stored next to them and cached on disk, validated by modification time:
//!
//! - [`url`]: request path decomposition into base name, size and extension
//! - [`staleness`]: the simple and calendar-day invalidation policies
//! - [`extract`]: diagram block extraction from markdown documents
//! - [`invoker`]: external renderer process with timeout and atomic publish
//! - [`lock`]: per-artifact render serialization
//! - [`generator`]: the pipeline tying the above together
//!
//! # Example
//!
//! ```ignore
//! use mmdgen_render::{Generator, GeneratorConfig, Renderer, Resolution};
//!
//! let generator = Generator::new(config, Renderer::new("mmdc", Vec::new()));
//! match generator.resolve("/docs/flow.300x200.svg").await? {
//!     Resolution::Passthrough => { /* serve as a plain static file */ }
//!     Resolution::Missing => { /* 404 */ }
//!     resolution => serve(resolution.artifact()),
//! }
//! ```

mod atomic;
mod consts;
mod error;
pub mod extract;
mod format;
pub mod generator;
pub mod invoker;
pub mod lock;
pub mod staleness;
pub mod url;

pub use error::RenderError;
pub use extract::{extract, extract_block};
pub use format::OutputFormat;
pub use generator::{Generator, GeneratorConfig, Resolution, SourceMode};
pub use invoker::Renderer;
pub use lock::{RenderGuard, RenderLocks};
pub use staleness::{StalenessMode, artifact_is_stale, is_stale};
pub use url::{DecomposedPath, Size, decompose};
