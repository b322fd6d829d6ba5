//! Plugin system for the dev server.
//!
//! A plugin is a named [`PluginRecord`] carrying up to three optional
//! capabilities, each modelled as its own trait:
//!
//! - [`CanResolve`] maps a specifier (and optional importer) to a [`ResolvedId`]
//! - [`CanLoad`] produces the source for a resolved id
//! - [`CanTransform`] rewrites source code
//!
//! The [`PluginContainer`] holds records in registration order and composes
//! the capabilities into the per-request pipeline.
//!
//! ## Example
//!
//! ```
//! use devserve_core::plugin::{PluginContainer, PluginRecord, TransformResult};
//!
//! let upper = PluginRecord::new("upper")
//!     .on_transform(|code, _id| Ok(Some(TransformResult::code(code.to_uppercase()))));
//!
//! let container = PluginContainer::new(vec![upper]);
//! let out = container.transform("let x=1", "/app.js").unwrap();
//! assert_eq!(out.code, "LET X=1");
//! ```

mod builtin;
mod container;

pub use builtin::{
    AliasPlugin, BannerPlugin, CssPlugin, FsResolvePlugin, JsonPlugin, ReplacePlugin,
    VirtualPlugin, VIRTUAL_PREFIX,
};
pub use container::PluginContainer;

use std::fmt;
use std::sync::Arc;

/// Error type returned by plugin hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T, BoxError>;

/// A canonical module identifier produced by `resolve_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    /// Absolute file path, or a `\0`-prefixed virtual id.
    pub id: String,
    /// Whether the module is served by someone else.
    pub external: bool,
}

impl ResolvedId {
    /// Create a resolved module id.
    pub fn resolved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: false,
        }
    }

    /// Create an external module id.
    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: true,
        }
    }

    /// Whether this id names a virtual module (never read from disk).
    pub fn is_virtual(&self) -> bool {
        self.id.starts_with('\0')
    }
}

/// Result of the load hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    /// Module source code.
    pub code: String,
    /// Optional source map.
    pub map: Option<String>,
}

impl LoadResult {
    /// Create a load result with code only.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }
}

/// Result of the transform hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformResult {
    /// Transformed code.
    pub code: String,
    /// Optional source map.
    pub map: Option<String>,
    /// Module ids this module depends on, as declared by the plugin.
    pub dependencies: Vec<String>,
}

impl TransformResult {
    /// Create a transform result with code only.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Attach a source map.
    pub fn with_map(mut self, map: impl Into<String>) -> Self {
        self.map = Some(map.into());
        self
    }

    /// Declare a dependency.
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }
}

/// Resolve capability.
///
/// Return `Some` to claim the specifier, or `None` to let the next plugin try.
pub trait CanResolve: Send + Sync {
    fn resolve_id(&self, specifier: &str, importer: Option<&str>)
        -> HookResult<Option<ResolvedId>>;
}

/// Load capability.
///
/// Return `Some` to provide the module source, or `None` to let the next
/// plugin (or the default filesystem loader) handle it.
pub trait CanLoad: Send + Sync {
    fn load(&self, id: &str) -> HookResult<Option<LoadResult>>;
}

/// Transform capability.
///
/// Return `Some` to replace the code, or `None` to pass it through unchanged.
pub trait CanTransform: Send + Sync {
    fn transform(&self, code: &str, id: &str) -> HookResult<Option<TransformResult>>;
}

impl<T: CanResolve + ?Sized> CanResolve for Arc<T> {
    fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> HookResult<Option<ResolvedId>> {
        (**self).resolve_id(specifier, importer)
    }
}

impl<T: CanLoad + ?Sized> CanLoad for Arc<T> {
    fn load(&self, id: &str) -> HookResult<Option<LoadResult>> {
        (**self).load(id)
    }
}

impl<T: CanTransform + ?Sized> CanTransform for Arc<T> {
    fn transform(&self, code: &str, id: &str) -> HookResult<Option<TransformResult>> {
        (**self).transform(code, id)
    }
}

struct ResolveFn<F>(F);

impl<F> CanResolve for ResolveFn<F>
where
    F: Fn(&str, Option<&str>) -> HookResult<Option<ResolvedId>> + Send + Sync,
{
    fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> HookResult<Option<ResolvedId>> {
        (self.0)(specifier, importer)
    }
}

struct LoadFn<F>(F);

impl<F> CanLoad for LoadFn<F>
where
    F: Fn(&str) -> HookResult<Option<LoadResult>> + Send + Sync,
{
    fn load(&self, id: &str) -> HookResult<Option<LoadResult>> {
        (self.0)(id)
    }
}

struct TransformFn<F>(F);

impl<F> CanTransform for TransformFn<F>
where
    F: Fn(&str, &str) -> HookResult<Option<TransformResult>> + Send + Sync,
{
    fn transform(&self, code: &str, id: &str) -> HookResult<Option<TransformResult>> {
        (self.0)(code, id)
    }
}

/// A registered plugin: a name plus whichever capabilities it provides.
///
/// Records are immutable once handed to a [`PluginContainer`].
pub struct PluginRecord {
    name: String,
    extensions: Vec<String>,
    resolver: Option<Box<dyn CanResolve>>,
    loader: Option<Box<dyn CanLoad>>,
    transformer: Option<Box<dyn CanTransform>>,
}

impl PluginRecord {
    /// Create a record with no capabilities.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extensions: Vec::new(),
            resolver: None,
            loader: None,
            transformer: None,
        }
    }

    /// Plugin name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File extensions (without the dot) this plugin turns into modules.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Declare extensions this plugin handles, so requests for them reach
    /// the transform pipeline.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions.extend(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase()),
        );
        self
    }

    pub fn with_resolver(mut self, resolver: impl CanResolve + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_loader(mut self, loader: impl CanLoad + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub fn with_transformer(mut self, transformer: impl CanTransform + 'static) -> Self {
        self.transformer = Some(Box::new(transformer));
        self
    }

    /// Attach a resolve hook from a closure.
    pub fn on_resolve<F>(self, f: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> HookResult<Option<ResolvedId>> + Send + Sync + 'static,
    {
        self.with_resolver(ResolveFn(f))
    }

    /// Attach a load hook from a closure.
    pub fn on_load<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> HookResult<Option<LoadResult>> + Send + Sync + 'static,
    {
        self.with_loader(LoadFn(f))
    }

    /// Attach a transform hook from a closure.
    pub fn on_transform<F>(self, f: F) -> Self
    where
        F: Fn(&str, &str) -> HookResult<Option<TransformResult>> + Send + Sync + 'static,
    {
        self.with_transformer(TransformFn(f))
    }

    pub fn resolver(&self) -> Option<&dyn CanResolve> {
        self.resolver.as_deref()
    }

    pub fn loader(&self) -> Option<&dyn CanLoad> {
        self.loader.as_deref()
    }

    pub fn transformer(&self) -> Option<&dyn CanTransform> {
        self.transformer.as_deref()
    }
}

impl fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRecord")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("resolve", &self.resolver.is_some())
            .field("load", &self.loader.is_some())
            .field("transform", &self.transformer.is_some())
            .finish()
    }
}
