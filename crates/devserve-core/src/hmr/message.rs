//! Wire messages pushed to client runtimes.

use serde::{Deserialize, Serialize};

/// A live-update message.
///
/// Serializes to the JSON grammar the client runtime understands:
///
/// ```json
/// {"type":"full-reload","path":"index.html"}
/// {"type":"update","updates":[{"type":"js-update","file":"src/main.ts","timestamp":1700000000000}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UpdateMessage {
    /// Reload the whole page.
    FullReload { path: String },
    /// Re-fetch the listed modules.
    Update { updates: Vec<UpdateEntry> },
}

/// One module in an [`UpdateMessage::Update`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntry {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// Root-relative path of the changed file.
    #[serde(rename = "file")]
    pub path: String,
    /// Dispatch time in ms since the Unix epoch.
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    JsUpdate,
    CssUpdate,
}

impl UpdateMessage {
    /// A single-entry update.
    pub fn single(kind: UpdateKind, path: impl Into<String>, timestamp: u64) -> Self {
        Self::Update {
            updates: vec![UpdateEntry {
                kind,
                path: path.into(),
                timestamp,
            }],
        }
    }

    /// Serialize to the wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_reload_wire_format() {
        let msg = UpdateMessage::FullReload {
            path: "index.html".to_string(),
        };
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"type":"full-reload","path":"index.html"}"#
        );
    }

    #[test]
    fn test_update_wire_format() {
        let msg = UpdateMessage::single(UpdateKind::CssUpdate, "src/app.css", 42);
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "update",
                "updates": [{ "type": "css-update", "file": "src/app.css", "timestamp": 42 }]
            })
        );
    }

    #[test]
    fn test_parses_client_side_shape() {
        let msg: UpdateMessage = serde_json::from_str(
            r#"{"type":"update","updates":[{"type":"js-update","file":"a.js","timestamp":7}]}"#,
        )
        .unwrap();
        assert_eq!(msg, UpdateMessage::single(UpdateKind::JsUpdate, "a.js", 7));
    }
}
