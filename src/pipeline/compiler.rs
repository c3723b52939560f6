//! Compiler construction and the parse → transform → emit pipeline.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use comrak::nodes::AstNode;
use comrak::options::{ListStyleType, Options};
use comrak::{Arena, format_html, parse_document};
use serde_json::{Map, Value};

use super::include::IncludeResolver;
use super::types::{
    CompilerSettings, DependencyRecorder, Format, PipelineError, ProcessedDocument,
};

/// Boxed future returned by transform stages. Not `Send`: transforms hold
/// references into the task-local syntax arena.
pub type TransformFuture<'t> = Pin<Box<dyn Future<Output = Result<(), PipelineError>> + 't>>;

/// A pipeline stage that receives the parsed tree and may mutate it before
/// emission.
pub trait Transform: Send + Sync {
    fn transform<'t, 'a: 't>(
        &'t self,
        root: &'a AstNode<'a>,
        ctx: &'t TransformContext<'a>,
    ) -> TransformFuture<'t>;
}

/// Shared context handed to every transform stage.
pub struct TransformContext<'a> {
    /// Arena the host tree was parsed into. Nested parses must allocate
    /// here so spliced nodes share the tree's lifetime.
    pub arena: &'a Arena<'a>,
    /// Compiler running the pipeline, for grammar-consistent nested parses.
    pub compiler: &'a DocumentCompiler,
    /// Path of the document the tree was parsed from, when known.
    pub file_path: Option<PathBuf>,
    /// Optional sink for resolved file dependencies.
    pub recorder: Option<&'a dyn DependencyRecorder>,
}

impl<'a> TransformContext<'a> {
    /// Context for content spliced in from `path`, inheriting everything
    /// but the anchoring document path.
    pub fn for_included(&self, path: PathBuf) -> TransformContext<'a> {
        TransformContext {
            arena: self.arena,
            compiler: self.compiler,
            file_path: Some(path),
            recorder: self.recorder,
        }
    }
}

/// One pipeline invocation over a tagged input.
pub struct ProcessRequest {
    pub source: String,
    pub file_path: Option<PathBuf>,
    pub metadata: Map<String, Value>,
    pub recorder: Option<Arc<dyn DependencyRecorder>>,
}

impl ProcessRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file_path: None,
            metadata: Map::new(),
            recorder: None,
        }
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn DependencyRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }
}

/// A parser/compiler instance for one syntax format.
///
/// Construction is the expensive step the compiler cache memoizes. Once
/// handed out, an instance is immutable and safe to share across builds;
/// the cache only ever replaces its own pointer to it.
pub struct DocumentCompiler {
    format: Format,
    options: Options<'static>,
    transforms: Vec<Arc<dyn Transform>>,
}

impl DocumentCompiler {
    /// Construct a compiler for `format`. The include resolver always runs
    /// first; `extra_transforms` follow in their given order.
    pub fn new(
        format: Format,
        settings: &CompilerSettings,
        development: bool,
        extra_transforms: Vec<Arc<dyn Transform>>,
    ) -> Result<Self, PipelineError> {
        let options = build_comrak_options(format, settings, development)?;

        let mut transforms: Vec<Arc<dyn Transform>> =
            Vec::with_capacity(extra_transforms.len() + 1);
        transforms.push(Arc::new(IncludeResolver));
        transforms.extend(extra_transforms);

        Ok(Self {
            format,
            options,
            transforms,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Parse raw text with this compiler's configured grammar. Used for the
    /// host document and for every included body, so spliced content always
    /// sees the same syntax extensions.
    pub fn parse<'a>(&self, arena: &'a Arena<'a>, source: &str) -> &'a AstNode<'a> {
        parse_document(arena, source, &self.options)
    }

    /// Run the full parse → transform → emit pipeline.
    ///
    /// The returned future is not `Send`; the syntax arena lives on the
    /// calling task for the duration of the pipeline.
    pub async fn process(
        &self,
        request: ProcessRequest,
    ) -> Result<ProcessedDocument, PipelineError> {
        let ProcessRequest {
            source,
            file_path,
            metadata,
            recorder,
        } = request;

        let arena = Arena::new();
        let root = self.parse(&arena, &source);
        let ctx = TransformContext {
            arena: &arena,
            compiler: self,
            file_path: file_path.clone(),
            recorder: recorder.as_deref(),
        };

        for transform in &self.transforms {
            transform.transform(root, &ctx).await?;
        }

        let html = emit_html(root, &self.options)?;
        Ok(ProcessedDocument {
            html,
            file_path,
            metadata,
            format: self.format,
        })
    }
}

fn emit_html<'a>(root: &'a AstNode<'a>, options: &Options<'static>) -> Result<String, PipelineError> {
    let mut html = String::new();
    format_html(root, options, &mut html).map_err(|err| PipelineError::Render {
        message: err.to_string(),
    })?;
    Ok(html)
}

fn build_comrak_options(
    format: Format,
    settings: &CompilerSettings,
    development: bool,
) -> Result<Options<'static>, PipelineError> {
    let delimiter = settings.front_matter_delimiter.trim();
    if delimiter.is_empty() || delimiter.contains(char::is_whitespace) {
        return Err(PipelineError::Configuration {
            message: format!(
                "front-matter delimiter `{}` must be a single non-empty token",
                settings.front_matter_delimiter
            ),
        });
    }

    let mut options = Options::default();

    let ext = &mut options.extension;
    if settings.gfm {
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;
    }
    ext.footnotes = settings.footnotes;
    ext.front_matter_delimiter = Some(delimiter.to_string());
    // Include directives ride on wikilink syntax: [[include|./other.mdx]].
    ext.wikilinks_title_after_pipe = true;

    options.parse.smart = settings.smart_punctuation;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.list_style = ListStyleType::Dash;
    render.sourcepos = development;
    // MDX passes embedded component markup through untouched.
    render.r#unsafe = matches!(format, Format::Mdx);

    Ok(options)
}
