//! Change classification and update dispatch.
//!
//! Classification is purely extension based: no dependency graph is built,
//! so an HTML change always reloads the page and anything else is announced
//! as a single-module update.

use super::channel::UpdateChannel;
use super::message::{UpdateKind, UpdateMessage};
use crate::kind::ModuleKind;
use crate::transform::ModuleTransformer;
use devserve_util::fs::now_ms;
use devserve_util::path::relative_url_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One raw filesystem event. Not deduplicated or coalesced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute or root-relative path.
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Classify one change event.
///
/// Only `Modified` produces a message; additions and removals are not
/// announced.
pub fn classify(root: &Path, event: &ChangeEvent, timestamp: u64) -> Option<UpdateMessage> {
    if event.kind != ChangeKind::Modified {
        return None;
    }

    let path = relative_url_path(root, &event.path);
    let message = match ModuleKind::from_path(&path) {
        ModuleKind::Html => UpdateMessage::FullReload { path },
        ModuleKind::Script => UpdateMessage::single(UpdateKind::JsUpdate, path, timestamp),
        ModuleKind::Style | ModuleKind::Other => {
            UpdateMessage::single(UpdateKind::CssUpdate, path, timestamp)
        }
    };
    Some(message)
}

/// Turns change events into update messages, in arrival order.
#[derive(Debug, Clone)]
pub struct UpdateDispatcher {
    root: PathBuf,
    channel: Arc<UpdateChannel>,
    transformer: Option<Arc<ModuleTransformer>>,
}

impl UpdateDispatcher {
    pub fn new(root: impl Into<PathBuf>, channel: Arc<UpdateChannel>) -> Self {
        Self {
            root: root.into(),
            channel,
            transformer: None,
        }
    }

    /// Evict transform cache entries for changed files.
    pub fn with_transformer(mut self, transformer: Arc<ModuleTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Handle one event: invalidate, classify, publish.
    ///
    /// Returns the message that was published, if any. Publishing is
    /// fire-and-forget.
    pub fn dispatch(&self, event: &ChangeEvent) -> Option<UpdateMessage> {
        let rel = relative_url_path(&self.root, &event.path);

        if event.kind != ChangeKind::Added {
            if let Some(transformer) = &self.transformer {
                let absolute = if event.path.is_absolute() {
                    event.path.clone()
                } else {
                    self.root.join(&event.path)
                };
                if transformer.invalidate(&absolute) {
                    debug!(file = %rel, "transform cache invalidated");
                }
            }
        }

        match event.kind {
            ChangeKind::Added => info!(file = %rel, "file added"),
            ChangeKind::Removed => info!(file = %rel, "file removed"),
            ChangeKind::Modified => info!(file = %rel, "file changed"),
        }

        let message = classify(&self.root, event, now_ms())?;
        let delivered = self.channel.send(&message);
        debug!(file = %rel, clients = delivered, "update sent");
        Some(message)
    }

    /// Dispatch events until the sender side is dropped.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event);
        }
        debug!("change event stream ended");
    }
}
