//! Include-directive resolution.
//!
//! An include directive is a wikilink whose target is the reserved tag
//! `include`: `[[include|./other.mdx]]`. One synchronous walk collects
//! every directive in document order, all of them resolve concurrently
//! (read, strip front-matter, re-parse with the host grammar, recurse into
//! the parsed subtree), and each parsed result is spliced over its
//! directive node in place. Each site mutates only its own node, so
//! out-of-order read completion cannot corrupt the tree.

use std::path::{Component, Path, PathBuf};

use comrak::nodes::{AstNode, NodeValue};
use futures::future::try_join_all;
use tracing::debug;

use super::compiler::{Transform, TransformContext, TransformFuture};
use super::frontmatter;
use super::types::PipelineError;

/// Reserved wikilink target marking an include directive.
pub const INCLUDE_TAG: &str = "include";

/// Transform stage that inlines include directives. Registered first in
/// every compiler's chain, ahead of caller-supplied transforms.
pub struct IncludeResolver;

impl Transform for IncludeResolver {
    fn transform<'t, 'a: 't>(
        &'t self,
        root: &'a AstNode<'a>,
        ctx: &'t TransformContext<'a>,
    ) -> TransformFuture<'t> {
        resolve_includes(root, ctx)
    }
}

fn resolve_includes<'t, 'a: 't>(
    root: &'a AstNode<'a>,
    ctx: &'t TransformContext<'a>,
) -> TransformFuture<'t> {
    Box::pin(async move {
        let mut sites = Vec::new();
        collect_sites(root, &mut sites);
        if sites.is_empty() {
            return Ok(());
        }

        let base = ctx
            .file_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);

        debug!(
            target = "pipeline::include",
            count = sites.len(),
            "resolving include directives"
        );

        let jobs = sites
            .into_iter()
            .map(|site| resolve_site(site, base.as_deref(), ctx));
        try_join_all(jobs).await?;
        Ok(())
    })
}

struct IncludeSite<'a> {
    node: &'a AstNode<'a>,
    specifier: String,
}

async fn resolve_site<'a>(
    site: IncludeSite<'a>,
    base: Option<&Path>,
    ctx: &TransformContext<'a>,
) -> Result<(), PipelineError> {
    let specifier = Path::new(&site.specifier);
    let target = if specifier.is_absolute() {
        normalize(specifier)
    } else {
        // A relative specifier is meaningless without an anchoring document
        // path; no working directory is guessed.
        let Some(base) = base else {
            return Err(PipelineError::UnanchoredInclude {
                specifier: site.specifier.clone(),
            });
        };
        normalize(&base.join(specifier))
    };

    let raw = tokio::fs::read_to_string(&target)
        .await
        .map_err(|source| PipelineError::IncludeRead {
            specifier: site.specifier.clone(),
            path: target.clone(),
            source,
        })?;

    if let Some(recorder) = ctx.recorder {
        recorder.add_dependency(&target);
    }

    let (_, body) = frontmatter::split(&raw);
    let parsed = ctx.compiler.parse(ctx.arena, body);

    // Includes inside the spliced content resolve relative to the file they
    // came from. Cycles are not detected; they fail when the stack or the
    // filesystem gives out.
    let nested = ctx.for_included(target);
    resolve_includes(parsed, &nested).await?;

    splice(site.node, parsed);
    Ok(())
}

fn collect_sites<'a>(node: &'a AstNode<'a>, sites: &mut Vec<IncludeSite<'a>>) {
    if let Some(specifier) = include_specifier(node) {
        // Directives are leaves for traversal: the specifier child is not
        // walked.
        sites.push(IncludeSite { node, specifier });
        return;
    }

    let mut child = node.first_child();
    while let Some(next) = child {
        collect_sites(next, sites);
        child = next.next_sibling();
    }
}

fn include_specifier<'a>(node: &'a AstNode<'a>) -> Option<String> {
    {
        let data = node.data.borrow();
        let NodeValue::WikiLink(link) = &data.value else {
            return None;
        };
        if link.url != INCLUDE_TAG {
            return None;
        }
    }

    // A directive without a plain-text first child is left untouched; not
    // an error.
    let first = node.first_child()?;
    let data = first.data.borrow();
    match &data.value {
        NodeValue::Text(text) => Some(text.to_string()),
        _ => None,
    }
}

/// Overwrite `node` with the parsed root: its value becomes the root's and
/// its children become the root's children, preserving the node's position
/// in the parent's child sequence. The directive is indistinguishable
/// afterwards.
fn splice<'a>(node: &'a AstNode<'a>, parsed: &'a AstNode<'a>) {
    {
        let mut data = node.data.borrow_mut();
        let new = parsed.data.borrow();
        data.value = new.value.clone();
        data.sourcepos = new.sourcepos;
    }

    while let Some(child) = node.first_child() {
        child.detach();
    }
    while let Some(child) = parsed.first_child() {
        child.detach();
        node.append(child);
    }
}

/// Lexically normalize `.` and `..` segments. Absolute inputs stay
/// absolute.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use comrak::Arena;
    use comrak::nodes::{Ast, LineColumn, NodeWikiLink};

    use super::*;
    use crate::pipeline::compiler::DocumentCompiler;
    use crate::pipeline::types::{CompilerSettings, Format};

    fn test_compiler() -> DocumentCompiler {
        DocumentCompiler::new(Format::Mdx, &CompilerSettings::default(), false, Vec::new())
            .expect("compiler")
    }

    #[test]
    fn collects_directives_in_document_order() {
        let compiler = test_compiler();
        let arena = Arena::new();
        let root = compiler.parse(
            &arena,
            "[[include|./a.md]]\n\nmiddle\n\n[[include|b/c.md]]\n",
        );

        let mut sites = Vec::new();
        collect_sites(root, &mut sites);
        let specs: Vec<_> = sites.iter().map(|site| site.specifier.as_str()).collect();
        assert_eq!(specs, ["./a.md", "b/c.md"]);
    }

    #[test]
    fn ordinary_wikilinks_are_not_directives() {
        let compiler = test_compiler();
        let arena = Arena::new();
        let root = compiler.parse(&arena, "[[notes|./a.md]]\n");

        let mut sites = Vec::new();
        collect_sites(root, &mut sites);
        assert!(sites.is_empty());
    }

    #[test]
    fn directive_without_children_is_skipped() {
        let arena = Arena::new();
        let node = arena.alloc(AstNode::new(RefCell::new(Ast::new(
            NodeValue::WikiLink(NodeWikiLink {
                url: INCLUDE_TAG.to_string(),
            }),
            LineColumn { line: 1, column: 1 },
        ))));

        assert!(include_specifier(node).is_none());
        let mut sites = Vec::new();
        collect_sites(node, &mut sites);
        assert!(sites.is_empty());
    }

    #[test]
    fn directive_with_non_text_first_child_is_skipped() {
        let arena = Arena::new();
        let node = arena.alloc(AstNode::new(RefCell::new(Ast::new(
            NodeValue::WikiLink(NodeWikiLink {
                url: INCLUDE_TAG.to_string(),
            }),
            LineColumn { line: 1, column: 1 },
        ))));
        let child = arena.alloc(AstNode::new(RefCell::new(Ast::new(
            NodeValue::Emph,
            LineColumn { line: 1, column: 1 },
        ))));
        node.append(child);

        assert!(include_specifier(node).is_none());
    }

    #[test]
    fn normalize_collapses_relative_segments() {
        assert_eq!(
            normalize(Path::new("/docs/./b.mdx")),
            PathBuf::from("/docs/b.mdx")
        );
        assert_eq!(
            normalize(Path::new("/docs/sub/../b.mdx")),
            PathBuf::from("/docs/b.mdx")
        );
        assert_eq!(
            normalize(Path::new("docs/../../b.mdx")),
            PathBuf::from("../b.mdx")
        );
    }

    #[test]
    fn normalize_keeps_absolute_roots() {
        assert_eq!(normalize(Path::new("/../b.mdx")), PathBuf::from("/b.mdx"));
        assert_eq!(normalize(Path::new("/docs/b.mdx")), PathBuf::from("/docs/b.mdx"));
    }
}
