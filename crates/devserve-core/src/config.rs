//! Configuration file discovery and the effective dev server configuration.
//!
//! Loads `devserve.config.json` from the project root (or an explicit path):
//!
//! ```json
//! {
//!   "server": { "port": 3000, "host": "localhost", "open": false },
//!   "plugins": [
//!     { "type": "alias", "entries": [{ "find": "/@lib", "replacement": "vendor/lib" }] },
//!     { "type": "define", "values": { "__DEV__": "true" } },
//!     { "type": "json" },
//!     { "type": "css" }
//!   ],
//!   "ignored": ["dist"]
//! }
//! ```
//!
//! Plugins run in the order listed. The filesystem resolver is always
//! appended last.

use crate::error::Error;
use crate::plugin::{
    AliasPlugin, BannerPlugin, CssPlugin, FsResolvePlugin, JsonPlugin, PluginContainer,
    PluginRecord, ReplacePlugin, VirtualPlugin,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Config file name looked up in the project root.
pub const CONFIG_FILE: &str = "devserve.config.json";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "localhost";

/// Directory names the watcher always skips.
pub const ALWAYS_IGNORED: &[&str] = &["node_modules", ".git"];

/// Contents of a config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Project root, relative to the config file's directory.
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerOptions,
    /// Replaces the default plugin list when present.
    pub plugins: Option<Vec<PluginSpec>>,
    /// Extra directory names the watcher skips.
    #[serde(default)]
    pub ignored: Vec<String>,
}

/// Server section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerOptions {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub open: Option<bool>,
}

/// One alias rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    /// URL prefix to match.
    pub find: String,
    /// Root-relative directory it maps to.
    pub replacement: String,
}

/// A built-in plugin, as declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PluginSpec {
    Alias { entries: Vec<AliasEntry> },
    Define { values: BTreeMap<String, String> },
    Virtual { modules: BTreeMap<String, String> },
    Banner { text: String },
    Json,
    Css,
}

impl PluginSpec {
    /// Instantiate the plugin for a project rooted at `root`.
    pub fn build(&self, root: &Path) -> PluginRecord {
        match self {
            Self::Alias { entries } => entries
                .iter()
                .fold(AliasPlugin::new(root), |p, e| {
                    p.alias(&e.find, &e.replacement)
                })
                .into(),
            Self::Define { values } => values
                .iter()
                .fold(ReplacePlugin::new(), |p, (from, to)| p.replace(from, to))
                .into(),
            Self::Virtual { modules } => modules
                .iter()
                .fold(VirtualPlugin::new(), |p, (name, code)| p.module(name, code))
                .into(),
            Self::Banner { text } => BannerPlugin::new(text).into(),
            Self::Json => JsonPlugin.into(),
            Self::Css => CssPlugin.into(),
        }
    }
}

/// Effective dev server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevConfig {
    /// Project root.
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Open the browser after startup.
    pub open: bool,
    /// Plugins, in execution order.
    pub plugins: Vec<PluginSpec>,
    /// Directory names the watcher skips.
    pub ignored: Vec<String>,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

impl DevConfig {
    /// Defaults for a project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            open: false,
            plugins: vec![PluginSpec::Json, PluginSpec::Css],
            ignored: ALWAYS_IGNORED.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Layer a config file over these settings.
    ///
    /// `file_dir` is the directory containing the config file; a relative
    /// `root` is resolved against it.
    pub fn apply_file(mut self, file: ConfigFile, file_dir: &Path) -> Self {
        if let Some(root) = file.root {
            self.root = if root.is_absolute() {
                root
            } else {
                file_dir.join(root)
            };
        }
        if let Some(port) = file.server.port {
            self.port = port;
        }
        if let Some(host) = file.server.host {
            self.host = host;
        }
        if let Some(open) = file.server.open {
            self.open = open;
        }
        if let Some(plugins) = file.plugins {
            self.plugins = plugins;
        }
        for name in file.ignored {
            if !self.ignored.contains(&name) {
                self.ignored.push(name);
            }
        }
        self
    }

    /// Layer command-line server flags over these settings.
    ///
    /// A flag only wins when it differs from its default, so an unset flag
    /// never masks a value from the config file.
    pub fn apply_cli(mut self, port: u16, host: &str, open: bool) -> Self {
        if port != DEFAULT_PORT {
            self.port = port;
        }
        if host != DEFAULT_HOST {
            self.host = host.to_string();
        }
        if open {
            self.open = true;
        }
        self
    }

    /// Canonicalize the root and check that it is a directory.
    pub fn canonicalize_root(mut self) -> Result<Self, Error> {
        let root = dunce::canonicalize(&self.root)?;
        if !root.is_dir() {
            return Err(Error::InvalidRoot { path: root });
        }
        self.root = root;
        Ok(self)
    }

    /// Build the plugin container: declared plugins in order, then the
    /// filesystem resolver.
    pub fn build_plugins(&self) -> PluginContainer {
        let mut records: Vec<PluginRecord> = self
            .plugins
            .iter()
            .map(|spec| spec.build(&self.root))
            .collect();
        records.push(FsResolvePlugin::new(&self.root).into());
        PluginContainer::new(records)
    }

    /// Canonicalize the root and build the plugin container.
    pub fn resolve(self) -> Result<ResolvedConfig, Error> {
        let config = self.canonicalize_root()?;
        let plugins = Arc::new(config.build_plugins());
        Ok(ResolvedConfig { config, plugins })
    }
}

/// A configuration ready to serve from: canonical root, built plugins.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: DevConfig,
    pub plugins: Arc<PluginContainer>,
}

impl ResolvedConfig {
    pub fn root(&self) -> &Path {
        &self.config.root
    }
}

/// Find a config file in the given root directory.
pub fn find_config_file(root: &Path) -> Option<PathBuf> {
    let path = root.join(CONFIG_FILE);
    path.is_file().then_some(path)
}

/// Load a config file.
///
/// If `config_path` is `Some`, that file must exist (relative paths are
/// resolved against `root`). Otherwise the root is searched and a missing
/// file yields `Ok(None)`.
pub fn load_config(
    root: &Path,
    config_path: Option<&Path>,
) -> Result<Option<(PathBuf, ConfigFile)>, Error> {
    let path = match config_path {
        Some(p) => {
            let abs = if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            };
            if !abs.is_file() {
                return Err(Error::ConfigNotFound { path: abs });
            }
            abs
        }
        None => match find_config_file(root) {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    let source = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
        path: path.clone(),
        source,
    })?;
    let config = serde_json::from_str(&source).map_err(|source| Error::ConfigParse {
        path: path.clone(),
        source,
    })?;
    Ok(Some((path, config)))
}
