//! Built-in plugins.

use super::{
    CanLoad, CanResolve, CanTransform, HookResult, LoadResult, PluginRecord, ResolvedId,
    TransformResult,
};
use crate::kind::ModuleKind;
use devserve_util::path::join_url_path;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Id prefix for modules served by [`VirtualPlugin`].
pub const VIRTUAL_PREFIX: &str = "\0virtual:";

/// Resolves URL paths to existing files under the project root.
///
/// Registered last by the config layer so every other resolver gets a chance
/// first. Relative specifiers are resolved against the importer's directory.
#[derive(Debug, Clone)]
pub struct FsResolvePlugin {
    root: PathBuf,
}

impl FsResolvePlugin {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn candidate(&self, specifier: &str, importer: Option<&str>) -> Option<PathBuf> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = Path::new(importer?).parent()?;
            let joined = base.join(specifier);
            // Relative imports must stay inside the root.
            let normalized = normalize(&joined);
            return normalized.starts_with(&self.root).then_some(normalized);
        }

        // URL paths are always root-relative, even when they spell out an
        // absolute filesystem path.
        if specifier.starts_with('/') {
            let joined = join_url_path(&self.root, specifier);
            return joined.starts_with(&self.root).then_some(joined);
        }

        None
    }
}

impl CanResolve for FsResolvePlugin {
    fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> HookResult<Option<ResolvedId>> {
        if specifier.starts_with('\0') {
            return Ok(None);
        }
        Ok(self
            .candidate(specifier, importer)
            .filter(|path| path.is_file())
            .map(|path| ResolvedId::resolved(path.display().to_string())))
    }
}

impl From<FsResolvePlugin> for PluginRecord {
    fn from(plugin: FsResolvePlugin) -> Self {
        PluginRecord::new("fs-resolve").with_resolver(plugin)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

/// Plugin that replaces identifiers with values (`define` in the config).
///
/// Replacements apply in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ReplacePlugin {
    replacements: Vec<(String, String)>,
}

impl ReplacePlugin {
    /// Create a new replace plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a replacement.
    pub fn replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.replacements.push((from.into(), to.into()));
        self
    }
}

impl CanTransform for ReplacePlugin {
    fn transform(&self, code: &str, _id: &str) -> HookResult<Option<TransformResult>> {
        if self.replacements.is_empty() {
            return Ok(None);
        }

        let mut result = code.to_string();
        let mut changed = false;

        for (from, to) in &self.replacements {
            if result.contains(from.as_str()) {
                result = result.replace(from.as_str(), to);
                changed = true;
            }
        }

        Ok(changed.then(|| TransformResult::code(result)))
    }
}

impl From<ReplacePlugin> for PluginRecord {
    fn from(plugin: ReplacePlugin) -> Self {
        PluginRecord::new("define").with_transformer(plugin)
    }
}

/// Plugin that serves modules that don't exist on disk.
///
/// `virtual:<name>` and `/@virtual/<name>` both resolve to
/// `\0virtual:<name>`.
#[derive(Debug, Clone, Default)]
pub struct VirtualPlugin {
    modules: HashMap<String, String>,
}

impl VirtualPlugin {
    /// Create a new virtual plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a virtual module.
    pub fn module(mut self, name: impl Into<String>, code: impl Into<String>) -> Self {
        self.modules.insert(name.into(), code.into());
        self
    }
}

impl CanResolve for VirtualPlugin {
    fn resolve_id(
        &self,
        specifier: &str,
        _importer: Option<&str>,
    ) -> HookResult<Option<ResolvedId>> {
        let name = specifier
            .strip_prefix("virtual:")
            .or_else(|| specifier.strip_prefix("/@virtual/"));
        Ok(name
            .filter(|name| self.modules.contains_key(*name))
            .map(|name| ResolvedId::resolved(format!("{VIRTUAL_PREFIX}{name}"))))
    }
}

impl CanLoad for VirtualPlugin {
    fn load(&self, id: &str) -> HookResult<Option<LoadResult>> {
        Ok(id
            .strip_prefix(VIRTUAL_PREFIX)
            .and_then(|name| self.modules.get(name))
            .map(LoadResult::code))
    }
}

impl From<VirtualPlugin> for PluginRecord {
    fn from(plugin: VirtualPlugin) -> Self {
        let shared = Arc::new(plugin);
        PluginRecord::new("virtual")
            .with_resolver(Arc::clone(&shared))
            .with_loader(shared)
    }
}

/// Plugin that maps URL prefixes onto directories under the root.
///
/// `/@lib/x.js` with alias `/@lib` → `vendor/lib` resolves to
/// `<root>/vendor/lib/x.js`.
#[derive(Debug, Clone)]
pub struct AliasPlugin {
    root: PathBuf,
    aliases: Vec<(String, String)>,
}

impl AliasPlugin {
    /// Create a new alias plugin.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            aliases: Vec::new(),
        }
    }

    /// Add an alias.
    pub fn alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.push((from.into(), to.into()));
        self
    }
}

impl CanResolve for AliasPlugin {
    fn resolve_id(
        &self,
        specifier: &str,
        _importer: Option<&str>,
    ) -> HookResult<Option<ResolvedId>> {
        for (from, to) in &self.aliases {
            let rest = if specifier == from {
                ""
            } else if let Some(rest) = specifier.strip_prefix(from.as_str()) {
                if !rest.starts_with('/') {
                    continue;
                }
                rest
            } else {
                continue;
            };
            let target = join_url_path(&self.root, &format!("{to}{rest}"));
            return Ok(Some(ResolvedId::resolved(target.display().to_string())));
        }
        Ok(None)
    }
}

impl From<AliasPlugin> for PluginRecord {
    fn from(plugin: AliasPlugin) -> Self {
        PluginRecord::new("alias").with_resolver(plugin)
    }
}

/// Plugin that turns JSON files into ES modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPlugin;

impl CanTransform for JsonPlugin {
    fn transform(&self, code: &str, id: &str) -> HookResult<Option<TransformResult>> {
        if !id.ends_with(".json") {
            return Ok(None);
        }
        // Reject malformed JSON here instead of shipping a syntax error to the browser.
        serde_json::from_str::<serde_json::Value>(code)?;
        Ok(Some(TransformResult::code(format!(
            "export default {};\n",
            code.trim()
        ))))
    }
}

impl From<JsonPlugin> for PluginRecord {
    fn from(plugin: JsonPlugin) -> Self {
        PluginRecord::new("json")
            .with_extensions(["json"])
            .with_transformer(plugin)
    }
}

/// Plugin that serves stylesheets imported from scripts as JS modules.
///
/// Only `?import` requests for `.css` reach the pipeline; plain `<link>`
/// requests are served as static files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssPlugin;

impl CanTransform for CssPlugin {
    fn transform(&self, code: &str, id: &str) -> HookResult<Option<TransformResult>> {
        if ModuleKind::from_path(id) != ModuleKind::Style {
            return Ok(None);
        }
        Ok(Some(TransformResult::code(create_css_module(code, id)?)))
    }
}

impl From<CssPlugin> for PluginRecord {
    fn from(plugin: CssPlugin) -> Self {
        PluginRecord::new("css").with_transformer(plugin)
    }
}

/// Create a CSS-as-JS module that injects (or refreshes) a `<style>` tag.
fn create_css_module(css: &str, id: &str) -> serde_json::Result<String> {
    let css = serde_json::to_string(css)?;
    let key = serde_json::to_string(id)?;

    Ok(format!(
        r#"const css = {css};
const key = {key};
let style = document.querySelector(`style[data-devserve-css="${{CSS.escape(key)}}"]`);
if (!style) {{
  style = document.createElement('style');
  style.setAttribute('data-devserve-css', key);
  document.head.appendChild(style);
}}
style.textContent = css;
export default css;
"#
    ))
}

/// Plugin that prepends a banner comment to script modules.
#[derive(Debug, Clone)]
pub struct BannerPlugin {
    banner: String,
}

impl BannerPlugin {
    pub fn new(banner: impl Into<String>) -> Self {
        Self {
            banner: banner.into(),
        }
    }
}

impl CanTransform for BannerPlugin {
    fn transform(&self, code: &str, id: &str) -> HookResult<Option<TransformResult>> {
        if self.banner.is_empty() || ModuleKind::from_path(id) != ModuleKind::Script {
            return Ok(None);
        }
        Ok(Some(TransformResult::code(format!(
            "{}\n{code}",
            self.banner
        ))))
    }
}

impl From<BannerPlugin> for PluginRecord {
    fn from(plugin: BannerPlugin) -> Self {
        PluginRecord::new("banner").with_transformer(plugin)
    }
}
