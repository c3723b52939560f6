//! Compiler-instance cache.
//!
//! Memoizes the expensive compiler construction per `(group, format)` key
//! and configuration fingerprint. Entries live for the process lifetime
//! and are only ever replaced, never evicted.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::pipeline::compiler::DocumentCompiler;
use crate::pipeline::types::{Format, PipelineError};

struct CacheEntry {
    compiler: Arc<DocumentCompiler>,
    fingerprint: String,
}

/// Process-lifetime mapping from `group:format` to the most recently
/// constructed compiler and the fingerprint it was built under.
pub struct CompilerCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CompilerCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached compiler for `(group, format)` while `fingerprint`
    /// is unchanged; otherwise run `build` and store its result.
    ///
    /// `build` runs at most once per fingerprint value for a given key. A
    /// failed build propagates without touching the stored entry. The read
    /// lock is released before building, so callers racing on a fingerprint
    /// change may each rebuild and the last writer wins; that is safe
    /// because a handed-out compiler is never mutated by the cache.
    pub fn get_or_build<F>(
        &self,
        group: &str,
        format: Format,
        fingerprint: &str,
        build: F,
    ) -> Result<Arc<DocumentCompiler>, PipelineError>
    where
        F: FnOnce() -> Result<Arc<DocumentCompiler>, PipelineError>,
    {
        let key = cache_key(group, format);

        {
            let entries = self.entries.read().unwrap();
            if let Some(entry) = entries.get(&key) {
                if entry.fingerprint == fingerprint {
                    return Ok(Arc::clone(&entry.compiler));
                }
            }
        }

        let compiler = build()?;
        debug!(
            target = "cache::registry",
            group,
            format = format.as_str(),
            "compiler constructed"
        );

        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key,
            CacheEntry {
                compiler: Arc::clone(&compiler),
                fingerprint: fingerprint.to_string(),
            },
        );
        Ok(compiler)
    }

    /// Number of cached compiler instances.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CompilerCache {
    fn default() -> Self {
        Self::new()
    }
}

/// `group` and `format` joined with `:`. A group containing the delimiter
/// can collide with another key; known limitation of the string key.
fn cache_key(group: &str, format: Format) -> String {
    format!("{group}:{}", format.as_str())
}

static SHARED_CACHE: Lazy<CompilerCache> = Lazy::new(CompilerCache::new);

/// Process-wide cache used by [`crate::build`], initialised on first use.
/// Tests needing isolation construct their own [`CompilerCache`].
pub fn shared_cache() -> &'static CompilerCache {
    &SHARED_CACHE
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::pipeline::types::CompilerSettings;

    fn probe(
        counter: &AtomicUsize,
    ) -> impl FnOnce() -> Result<Arc<DocumentCompiler>, PipelineError> + '_ {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            DocumentCompiler::new(Format::Md, &CompilerSettings::default(), false, Vec::new())
                .map(Arc::new)
        }
    }

    #[test]
    fn unchanged_fingerprint_reuses_instance() {
        let cache = CompilerCache::new();
        let built = AtomicUsize::new(0);

        let first = cache
            .get_or_build("docs", Format::Md, "v1", probe(&built))
            .expect("first build");
        let second = cache
            .get_or_build("docs", Format::Md, "v1", probe(&built))
            .expect("second build");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fingerprint_change_rebuilds_exactly_once() {
        let cache = CompilerCache::new();
        let built = AtomicUsize::new(0);

        let old = cache
            .get_or_build("docs", Format::Md, "v1", probe(&built))
            .expect("v1 build");
        let new = cache
            .get_or_build("docs", Format::Md, "v2", probe(&built))
            .expect("v2 build");
        let again = cache
            .get_or_build("docs", Format::Md, "v2", probe(&built))
            .expect("v2 reuse");

        assert!(!Arc::ptr_eq(&old, &new));
        assert!(Arc::ptr_eq(&new, &again));
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_build_leaves_prior_entry() {
        let cache = CompilerCache::new();
        let built = AtomicUsize::new(0);

        let first = cache
            .get_or_build("docs", Format::Md, "v1", probe(&built))
            .expect("v1 build");

        let err = cache
            .get_or_build("docs", Format::Md, "v2", || {
                Err(PipelineError::Configuration {
                    message: "boom".to_string(),
                })
            })
            .err()
            .expect("v2 build fails");
        assert!(matches!(err, PipelineError::Configuration { .. }));

        let retained = cache
            .get_or_build("docs", Format::Md, "v1", probe(&built))
            .expect("v1 reuse");
        assert!(Arc::ptr_eq(&first, &retained));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn formats_cache_independently() {
        let cache = CompilerCache::new();
        let built = AtomicUsize::new(0);

        let md = cache
            .get_or_build("docs", Format::Md, "v1", probe(&built))
            .expect("md build");
        let mdx = cache
            .get_or_build("docs", Format::Mdx, "v1", probe(&built))
            .expect("mdx build");

        assert!(!Arc::ptr_eq(&md, &mdx));
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }
}
