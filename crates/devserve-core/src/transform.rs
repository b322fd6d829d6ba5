//! Per-request module transformation pipeline.
//!
//! Handles: resolve → load → transform, with results cached per module id
//! until the source file's mtime changes or the dispatcher invalidates it.

use crate::error::PipelineError;
use crate::kind::ModuleKind;
use crate::plugin::PluginContainer;
use devserve_util::fs::{modified_millis, now_ms};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

/// A transformed module, ready to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedModule {
    /// The resolved module id.
    pub id: String,
    /// The transformed source code.
    pub code: String,
    /// Source map from the last plugin that produced one.
    pub map: Option<String>,
    /// Dependencies declared by plugins.
    pub dependencies: Vec<String>,
    /// Content-Type to serve with.
    pub content_type: &'static str,
    /// When this was transformed (ms since Unix epoch).
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
struct CachedModule {
    module: TransformedModule,
    mtime: u64,
}

/// Runs the plugin pipeline for module requests and caches the output.
///
/// Only modules backed by a file are cached, keyed by module id and tagged
/// with the file's mtime.
#[derive(Debug, Default)]
pub struct ModuleTransformer {
    /// Module cache: module id → cached output.
    cache: RwLock<HashMap<String, CachedModule>>,
}

impl ModuleTransformer {
    /// Create a new module transformer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform the module named by `specifier`.
    ///
    /// Returns `Ok(None)` if no plugin resolves the specifier, or if it
    /// resolves to an external module; the caller should hand the request to
    /// someone else.
    pub fn transform_request(
        &self,
        plugins: &PluginContainer,
        specifier: &str,
        import_request: bool,
    ) -> Result<Option<TransformedModule>, PipelineError> {
        let Some(resolved) = plugins.resolve_id(specifier, None)? else {
            trace!(specifier, "unresolved");
            return Ok(None);
        };
        if resolved.external {
            trace!(specifier, id = %resolved.id, "external");
            return Ok(None);
        }

        let id = resolved.id;
        let mtime = if resolved_is_file(&id) {
            modified_millis(Path::new(&id)).ok()
        } else {
            None
        };

        if let Some(mtime) = mtime {
            if let Some(cached) = self.get_cached(&id, mtime) {
                trace!(id = %id, "transform cache hit");
                return Ok(Some(with_content_type(cached, &id, import_request)));
            }
        }

        let loaded = plugins.load(&id)?;
        let transformed = plugins.transform(&loaded.code, &id)?;

        let module = TransformedModule {
            code: transformed.code,
            map: transformed.map.or(loaded.map),
            dependencies: transformed.dependencies,
            content_type: ModuleKind::from_path(&id).content_type(import_request),
            timestamp: now_ms(),
            id,
        };

        if let Some(mtime) = mtime {
            debug!(id = %module.id, "transformed");
            self.write_cache().insert(
                module.id.clone(),
                CachedModule {
                    module: module.clone(),
                    mtime,
                },
            );
        }

        Ok(Some(module))
    }

    /// Invalidate the cache entry for a changed file.
    ///
    /// Returns `true` if an entry was removed.
    pub fn invalidate(&self, file: &Path) -> bool {
        let mut cache = self.write_cache();
        let before = cache.len();
        cache.retain(|id, _| Path::new(id) != file);
        before != cache.len()
    }

    /// Number of cached modules.
    pub fn cached_len(&self) -> usize {
        self.read_cache().len()
    }

    fn get_cached(&self, id: &str, mtime: u64) -> Option<TransformedModule> {
        self.read_cache()
            .get(id)
            .filter(|entry| entry.mtime == mtime)
            .map(|entry| entry.module.clone())
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<String, CachedModule>> {
        self.cache
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<String, CachedModule>> {
        self.cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn resolved_is_file(id: &str) -> bool {
    !id.starts_with('\0') && Path::new(id).is_absolute()
}

fn with_content_type(
    mut module: TransformedModule,
    id: &str,
    import_request: bool,
) -> TransformedModule {
    module.content_type = ModuleKind::from_path(id).content_type(import_request);
    module
}
