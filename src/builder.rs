//! Build entry point: option normalization, cache lookup, pipeline
//! dispatch.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::cache::registry::{CompilerCache, shared_cache};
use crate::config;
use crate::pipeline::compiler::{DocumentCompiler, ProcessRequest};
use crate::pipeline::types::{BuildOptions, Format, PipelineError, ProcessedDocument};

/// Compile one document through the process-wide shared cache.
pub async fn build(
    group: &str,
    config_fingerprint: &str,
    source: &str,
    options: BuildOptions,
) -> Result<ProcessedDocument, PipelineError> {
    build_document(shared_cache(), group, config_fingerprint, source, options).await
}

/// Compile one document, constructing or reusing a compiler from `cache`.
///
/// The effective format is the explicit option, else the file extension,
/// else MDX. `options.collection`, when set, overrides `group` for cache
/// keying. Construction and pipeline errors propagate untranslated; there
/// are no retries and no internal timeouts.
pub async fn build_document(
    cache: &CompilerCache,
    group: &str,
    config_fingerprint: &str,
    source: &str,
    options: BuildOptions,
) -> Result<ProcessedDocument, PipelineError> {
    let BuildOptions {
        collection,
        file_path,
        frontmatter,
        data,
        format,
        settings,
        transforms,
        recorder,
    } = options;

    let format = Format::infer(format, file_path.as_deref());
    let group = collection.as_deref().unwrap_or(group);
    let development = config::development_mode();

    let compiler = cache.get_or_build(group, format, config_fingerprint, || {
        debug!(
            target = "builder",
            group,
            format = format.as_str(),
            development,
            "constructing document compiler"
        );
        DocumentCompiler::new(format, &settings, development, transforms).map(Arc::new)
    })?;

    let mut metadata = data.unwrap_or_default();
    if let Some(frontmatter) = frontmatter {
        metadata.insert("frontmatter".to_string(), Value::Object(frontmatter));
    }

    let request = ProcessRequest {
        source: source.to_string(),
        file_path,
        metadata,
        recorder,
    };
    compiler.process(request).await
}
