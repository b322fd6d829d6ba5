#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod hmr;
pub mod kind;
pub mod plugin;
pub mod transform;

pub use config::{load_config, ConfigFile, DevConfig, PluginSpec, ResolvedConfig};
pub use error::{Error, Hook, PipelineError, TransformError};
pub use hmr::{ChangeEvent, ChangeKind, UpdateChannel, UpdateDispatcher, UpdateMessage};
pub use kind::ModuleKind;
pub use plugin::{PluginContainer, PluginRecord};
pub use transform::{ModuleTransformer, TransformedModule};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
