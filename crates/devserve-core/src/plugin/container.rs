//! Ordered composition of plugin hooks.

use super::{LoadResult, PluginRecord, ResolvedId, TransformResult};
use crate::error::{Hook, PipelineError, TransformError};
use crate::kind::SCRIPT_EXTENSIONS;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;

/// A container for a fixed, ordered list of plugins.
///
/// Plugins run in registration order for every hook. The container never
/// reorders them: plugin authors rely on the declared order.
#[derive(Debug)]
pub struct PluginContainer {
    plugins: Vec<PluginRecord>,
    extensions: BTreeSet<String>,
}

impl PluginContainer {
    /// Create a container owning `plugins`.
    pub fn new(plugins: Vec<PluginRecord>) -> Self {
        let extensions = SCRIPT_EXTENSIONS
            .iter()
            .map(|e| (*e).to_string())
            .chain(plugins.iter().flat_map(|p| p.extensions().iter().cloned()))
            .collect();
        Self {
            plugins,
            extensions,
        }
    }

    /// Registered plugin names, in order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(PluginRecord::name).collect()
    }

    /// Extensions that mark a request as a module fetch.
    pub fn module_extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    /// Whether `ext` (lowercase, no dot) is handled by the pipeline.
    pub fn is_module_extension(&self, ext: &str) -> bool {
        self.extensions.contains(ext)
    }

    /// Resolve a specifier through the plugins.
    ///
    /// The first plugin returning `Some` wins. `Ok(None)` means unresolved.
    pub fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> Result<Option<ResolvedId>, TransformError> {
        for plugin in &self.plugins {
            let Some(resolver) = plugin.resolver() else {
                continue;
            };
            let resolved = resolver
                .resolve_id(specifier, importer)
                .map_err(|cause| hook_error(plugin, Hook::ResolveId, specifier, cause))?;
            if let Some(resolved) = resolved {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    /// Load a resolved module.
    ///
    /// The first plugin returning `Some` wins; otherwise the id is read as a
    /// filesystem path. Virtual ids never reach the filesystem.
    pub fn load(&self, id: &str) -> Result<LoadResult, PipelineError> {
        for plugin in &self.plugins {
            let Some(loader) = plugin.loader() else {
                continue;
            };
            let loaded = loader
                .load(id)
                .map_err(|cause| hook_error(plugin, Hook::Load, id, cause))?;
            if let Some(loaded) = loaded {
                return Ok(loaded);
            }
        }

        if id.starts_with('\0') {
            return Err(PipelineError::NotFound { id: id.to_string() });
        }

        match devserve_util::fs::read_to_string_lossy(Path::new(id)) {
            Ok(code) => Ok(LoadResult::code(code)),
            Err(e) if is_missing(&e) => Err(PipelineError::NotFound { id: id.to_string() }),
            Err(source) => Err(PipelineError::Io {
                id: id.to_string(),
                source,
            }),
        }
    }

    /// Transform code through all plugins.
    ///
    /// Each plugin receives the previous plugin's output; `None` passes the
    /// code through unchanged. The last source map produced wins and declared
    /// dependencies accumulate.
    pub fn transform(&self, code: &str, id: &str) -> Result<TransformResult, TransformError> {
        let mut current = TransformResult::code(code);
        for plugin in &self.plugins {
            let Some(transformer) = plugin.transformer() else {
                continue;
            };
            let result = transformer
                .transform(&current.code, id)
                .map_err(|cause| hook_error(plugin, Hook::Transform, id, cause))?;
            if let Some(result) = result {
                current.code = result.code;
                if result.map.is_some() {
                    current.map = result.map;
                }
                current.dependencies.extend(result.dependencies);
            }
        }
        Ok(current)
    }
}

impl Default for PluginContainer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn hook_error(
    plugin: &PluginRecord,
    hook: Hook,
    module_id: &str,
    cause: super::BoxError,
) -> TransformError {
    TransformError {
        plugin: plugin.name().to_string(),
        hook,
        module_id: module_id.to_string(),
        cause,
    }
}

fn is_missing(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::NotFound {
        return true;
    }
    // `/app.js/x`, where a path component is a regular file.
    #[cfg(unix)]
    {
        e.raw_os_error() == Some(libc::ENOTDIR)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{HookResult, ReplacePlugin};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn claims(name: &'static str, prefix: &'static str) -> PluginRecord {
        PluginRecord::new(name).on_resolve(move |spec, _| {
            Ok(spec
                .starts_with(prefix)
                .then(|| ResolvedId::resolved(format!("{name}:{spec}"))))
        })
    }

    fn append(name: &'static str, suffix: &'static str) -> PluginRecord {
        PluginRecord::new(name)
            .on_transform(move |code, _| Ok(Some(TransformResult::code(format!("{code}{suffix}")))))
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let container = PluginContainer::new(vec![
            claims("a", "/lib"),
            claims("b", "/"),
            claims("c", "/"),
        ]);

        let lib = container.resolve_id("/lib/x.js", None).unwrap().unwrap();
        assert_eq!(lib.id, "a:/lib/x.js");

        let other = container.resolve_id("/src/x.js", None).unwrap().unwrap();
        assert_eq!(other.id, "b:/src/x.js");
    }

    #[test]
    fn test_resolve_stops_after_first_claim() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let container = PluginContainer::new(vec![
            claims("first", "/"),
            PluginRecord::new("never").on_resolve(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }),
        ]);

        container.resolve_id("/app.js", None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolve_unresolved() {
        let container = PluginContainer::new(vec![claims("a", "/lib"), append("t", "!")]);
        assert!(container.resolve_id("/app.js", None).unwrap().is_none());

        let empty = PluginContainer::default();
        assert!(empty.resolve_id("/app.js", Some("/main.js")).unwrap().is_none());
    }

    #[test]
    fn test_resolve_receives_importer() {
        let container = PluginContainer::new(vec![PluginRecord::new("rel").on_resolve(
            |spec, importer| Ok(importer.map(|i| ResolvedId::resolved(format!("{i}|{spec}")))),
        )]);
        assert!(container.resolve_id("./a.js", None).unwrap().is_none());
        let resolved = container.resolve_id("./a.js", Some("/main.js")).unwrap();
        assert_eq!(resolved.unwrap().id, "/main.js|./a.js");
    }

    #[test]
    fn test_transform_is_cumulative_in_order() {
        let container = PluginContainer::new(vec![
            append("one", "1"),
            PluginRecord::new("skip").on_transform(|_, _| Ok(None)),
            append("two", "2"),
            claims("resolver-only", "/"),
            append("three", "3"),
        ]);

        let out = container.transform("x", "/app.js").unwrap();
        assert_eq!(out.code, "x123");
    }

    #[test]
    fn test_transform_chain_feeds_previous_output() {
        let container = PluginContainer::new(vec![
            ReplacePlugin::new().replace("FOO", "BAR").into(),
            ReplacePlugin::new().replace("BAR", "BAZ").into(),
        ]);

        let result = container.transform("const x = FOO;", "/test.js").unwrap();
        assert_eq!(result.code, "const x = BAZ;");
    }

    #[test]
    fn test_transform_without_transformers_is_identity() {
        let container = PluginContainer::new(vec![claims("a", "/")]);
        let once = container.transform("LET X=1", "/app.js").unwrap();
        let twice = container.transform(&once.code, "/app.js").unwrap();
        assert_eq!(once.code, "LET X=1");
        assert_eq!(twice.code, once.code);
        assert!(twice.map.is_none());
    }

    #[test]
    fn test_transform_keeps_last_map_and_collects_dependencies() {
        let container = PluginContainer::new(vec![
            PluginRecord::new("m1").on_transform(|c, _| {
                Ok(Some(
                    TransformResult::code(c)
                        .with_map("map-1")
                        .with_dependency("/dep-a.js"),
                ))
            }),
            PluginRecord::new("m2").on_transform(|c, _| {
                Ok(Some(TransformResult::code(c).with_dependency("/dep-b.js")))
            }),
        ]);

        let out = container.transform("x", "/app.js").unwrap();
        assert_eq!(out.map.as_deref(), Some("map-1"));
        assert_eq!(out.dependencies, ["/dep-a.js", "/dep-b.js"]);
    }

    #[test]
    fn test_transform_error_aborts_with_plugin_context() {
        fn fail(_: &str, _: &str) -> HookResult<Option<TransformResult>> {
            Err("unexpected token".into())
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let container = PluginContainer::new(vec![
            append("ok", "!"),
            PluginRecord::new("broken").on_transform(fail),
            PluginRecord::new("after").on_transform(move |c, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(TransformResult::code(c)))
            }),
        ]);

        let err = container.transform("x", "/src/app.js").unwrap_err();
        assert_eq!(err.plugin, "broken");
        assert_eq!(err.hook, Hook::Transform);
        assert_eq!(err.module_id, "/src/app.js");
        assert!(err.to_string().contains("unexpected token"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_load_first_match_then_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.js");
        std::fs::write(&file, "from disk").unwrap();
        let file_id = file.display().to_string();

        let container = PluginContainer::new(vec![PluginRecord::new("mem").on_load(|id| {
            Ok(id
                .ends_with("mem.js")
                .then(|| LoadResult::code("from memory")))
        })]);

        assert_eq!(container.load("/x/mem.js").unwrap().code, "from memory");
        assert_eq!(container.load(&file_id).unwrap().code, "from disk");
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.js").display().to_string();

        let container = PluginContainer::default();
        let err = container.load(&missing).unwrap_err();
        assert!(err.is_not_found());

        let err = container.load("\0virtual:nothing.js").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_hook_error_propagates() {
        let container = PluginContainer::new(vec![
            PluginRecord::new("bad-loader").on_load(|_| Err("disk on fire".into()))
        ]);
        match container.load("/app.js").unwrap_err() {
            PipelineError::Transform(e) => {
                assert_eq!(e.plugin, "bad-loader");
                assert_eq!(e.hook, Hook::Load);
            }
            other => panic!("expected transform error, got {other:?}"),
        }
    }

    #[test]
    fn test_module_extensions() {
        let container = PluginContainer::new(vec![
            PluginRecord::new("vue").with_extensions(["vue"])
        ]);
        assert!(container.is_module_extension("js"));
        assert!(container.is_module_extension("tsx"));
        assert!(container.is_module_extension("vue"));
        assert!(!container.is_module_extension("css"));
        assert!(!container.is_module_extension("html"));

        let all: Vec<&str> = container.module_extensions().iter().map(String::as_str).collect();
        assert_eq!(all, ["cjs", "cts", "js", "jsx", "mjs", "mts", "ts", "tsx", "vue"]);
    }

    #[test]
    fn test_plugin_order_is_preserved() {
        let container = PluginContainer::new(vec![
            append("z", ""),
            append("a", ""),
            append("m", ""),
        ]);
        assert_eq!(container.plugin_names(), ["z", "a", "m"]);
    }
}
