//! Markdown/MDX document pipeline with cached compiler construction and
//! include splicing.
//!
//! A document source is parsed with [`comrak`], run through a chain of
//! transform stages, and emitted as a processed artifact. Two pieces do the
//! heavy lifting:
//!
//! - the [`CompilerCache`] memoizes compiler construction per
//!   `(group, format)` key, invalidated only by an explicit configuration
//!   fingerprint;
//! - the include resolver rewrites `[[include|./other.mdx]]` directives by
//!   reading the referenced file, stripping its front-matter, re-parsing the
//!   body with the host grammar, and splicing the result into the tree in
//!   place, reporting every resolved path to an optional
//!   [`DependencyRecorder`].
//!
//! ```no_run
//! use quire::{BuildOptions, build};
//!
//! # async fn demo() -> Result<(), quire::PipelineError> {
//! let artifact = build("docs", "v1", "# Hello", BuildOptions::default()).await?;
//! assert!(artifact.html.contains("Hello"));
//! # Ok(())
//! # }
//! ```
//!
//! Pipeline futures are not `Send`: the syntax arena lives on the calling
//! task. Await them inline or via `spawn_local`.

pub mod builder;
pub mod cache;
pub mod config;
pub mod pipeline;

pub use builder::{build, build_document};
pub use cache::registry::{CompilerCache, shared_cache};
pub use pipeline::compiler::{
    DocumentCompiler, ProcessRequest, Transform, TransformContext, TransformFuture,
};
pub use pipeline::types::{
    BuildOptions, CompilerSettings, DependencyRecorder, Format, PipelineError, ProcessedDocument,
};
