//! Extension-based module classification.

use devserve_util::path::extension;

/// Extensions served as executable script.
pub const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "tsx", "mts", "cts"];

/// Coarse module kind, derived from the file extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Script,
    Style,
    Html,
    Other,
}

impl ModuleKind {
    /// Classify a path or module id by its extension.
    pub fn from_path(path: &str) -> Self {
        match extension(path).as_deref() {
            Some(ext) if SCRIPT_EXTENSIONS.contains(&ext) => Self::Script,
            Some("css") => Self::Style,
            Some("html" | "htm") => Self::Html,
            _ => Self::Other,
        }
    }

    /// Content type for transformed output of this kind.
    ///
    /// Anything fetched as a module (`?import`) is served as script, since
    /// the pipeline's output is always executable text.
    pub fn content_type(self, import_request: bool) -> &'static str {
        match self {
            Self::Style if !import_request => "text/css",
            _ => "application/javascript",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(ModuleKind::from_path("/src/main.ts"), ModuleKind::Script);
        assert_eq!(ModuleKind::from_path("/src/App.TSX"), ModuleKind::Script);
        assert_eq!(ModuleKind::from_path("lib/x.mjs"), ModuleKind::Script);
        assert_eq!(ModuleKind::from_path("/style.css"), ModuleKind::Style);
        assert_eq!(ModuleKind::from_path("index.html"), ModuleKind::Html);
        assert_eq!(ModuleKind::from_path("/data.json"), ModuleKind::Other);
        assert_eq!(ModuleKind::from_path("\0virtual:env"), ModuleKind::Other);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(
            ModuleKind::Script.content_type(false),
            "application/javascript"
        );
        assert_eq!(ModuleKind::Style.content_type(false), "text/css");
        assert_eq!(
            ModuleKind::Style.content_type(true),
            "application/javascript"
        );
        assert_eq!(
            ModuleKind::Other.content_type(false),
            "application/javascript"
        );
    }
}
