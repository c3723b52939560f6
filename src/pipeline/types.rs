use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::compiler::Transform;

/// Syntax flavour a compiler instance is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Md,
    Mdx,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Md => "md",
            Format::Mdx => "mdx",
        }
    }

    /// Resolve the effective format: an explicit choice wins, else the file
    /// extension decides (case-sensitive suffix match), else MDX.
    pub fn infer(explicit: Option<Format>, file_path: Option<&Path>) -> Format {
        if let Some(format) = explicit {
            return format;
        }
        if let Some(path) = file_path.and_then(Path::to_str) {
            if path.ends_with(".mdx") {
                return Format::Mdx;
            }
            if path.ends_with(".md") {
                return Format::Md;
            }
        }
        Format::Mdx
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-tunable compiler configuration. Everything here participates in
/// the configuration fingerprint the caller supplies; two fingerprints are
/// assumed equal only when these settings are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// GitHub-flavoured extensions: tables, strikethrough, autolinks, task
    /// lists.
    pub gfm: bool,
    /// Footnote syntax.
    pub footnotes: bool,
    /// Smart punctuation substitution.
    pub smart_punctuation: bool,
    /// Fence token opening and closing a front-matter preamble.
    pub front_matter_delimiter: String,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            gfm: true,
            footnotes: true,
            smart_punctuation: false,
            front_matter_delimiter: "---".to_string(),
        }
    }
}

/// Sink notified with every file path the pipeline reads while resolving
/// includes, so a host build system can invalidate its outputs when those
/// files change. Called once per resolved occurrence; duplicates are the
/// sink's business.
pub trait DependencyRecorder: Send + Sync {
    fn add_dependency(&self, path: &Path);
}

/// Per-build options accepted by the entry point.
#[derive(Clone, Default)]
pub struct BuildOptions {
    /// Overrides the content group used for compiler caching.
    pub collection: Option<String>,
    /// Path of the document being built; anchors include resolution.
    pub file_path: Option<PathBuf>,
    /// Explicit front-matter of the host document, forwarded into the
    /// artifact metadata under the `frontmatter` key.
    pub frontmatter: Option<Map<String, Value>>,
    /// Free-form metadata merged into the artifact.
    pub data: Option<Map<String, Value>>,
    /// Explicit syntax format; inferred from `file_path` when absent.
    pub format: Option<Format>,
    /// Compiler configuration applied when a new instance is constructed.
    pub settings: CompilerSettings,
    /// Transforms run after the include resolver, in the given order.
    pub transforms: Vec<Arc<dyn Transform>>,
    /// Optional dependency sink; reporting is skipped silently when absent.
    pub recorder: Option<Arc<dyn DependencyRecorder>>,
}

impl BuildOptions {
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_frontmatter(mut self, frontmatter: Map<String, Value>) -> Self {
        self.frontmatter = Some(frontmatter);
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn DependencyRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }
}

/// Artifact returned once the full pipeline has run. Owned by the caller;
/// nothing in the pipeline keeps a handle to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    /// Compiled output ready for the host to embed or persist.
    pub html: String,
    /// Path the document was built from, when known.
    pub file_path: Option<PathBuf>,
    /// Merged caller metadata: the `data` bag plus explicit front-matter
    /// under the `frontmatter` key.
    pub metadata: Map<String, Value>,
    /// Format the compiler was constructed for.
    pub format: Format,
}

/// Structured errors surfaced by the pipeline. Nothing is retried
/// internally and nothing is formatted for end users; callers own
/// presentation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed compiler options, surfaced at construction. A failed
    /// construction never replaces a previously cached instance.
    #[error("compiler configuration rejected: {message}")]
    Configuration { message: String },
    /// The host document has no path, so a relative include specifier has
    /// nothing to resolve against. No fallback base directory is guessed.
    #[error("include `{specifier}` cannot be resolved: the document has no path")]
    UnanchoredInclude { specifier: String },
    /// The resolved include target could not be read.
    #[error("include `{specifier}` failed to read `{path}`: {source}")]
    IncludeRead {
        specifier: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// HTML emission failed.
    #[error("markdown rendering failed: {message}")]
    Render { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_format_wins_over_extension() {
        let path = PathBuf::from("/docs/a.md");
        assert_eq!(
            Format::infer(Some(Format::Mdx), Some(&path)),
            Format::Mdx
        );
    }

    #[test]
    fn format_inferred_from_extension() {
        assert_eq!(
            Format::infer(None, Some(Path::new("/docs/a.mdx"))),
            Format::Mdx
        );
        assert_eq!(
            Format::infer(None, Some(Path::new("/docs/a.md"))),
            Format::Md
        );
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        assert_eq!(
            Format::infer(None, Some(Path::new("/docs/a.MD"))),
            Format::Mdx
        );
    }

    #[test]
    fn format_defaults_to_mdx() {
        assert_eq!(Format::infer(None, None), Format::Mdx);
        assert_eq!(Format::infer(None, Some(Path::new("/docs/a.txt"))), Format::Mdx);
    }
}
