//! Path helpers shared by the transform pipeline and the update dispatcher.

use std::path::{Component, Path, PathBuf};

/// Make `path` relative to `root` and render it with forward slashes.
///
/// Paths outside `root` (or already relative) are rendered as-is, minus any
/// leading `./` or `/`. The result never starts with a slash.
#[must_use]
pub fn relative_url_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect();
    parts.join("/")
}

/// Join a `/`-rooted URL path onto `root`.
///
/// `..` segments are dropped so the result can never escape `root`.
#[must_use]
pub fn join_url_path(root: &Path, url_path: &str) -> PathBuf {
    let mut joined = root.to_path_buf();
    for segment in url_path.split('/') {
        match segment {
            "" | "." | ".." => {}
            s => joined.push(s),
        }
    }
    joined
}

/// Whether any component of `path` equals one of `names`.
#[must_use]
pub fn has_component(path: &Path, names: &[String]) -> bool {
    path.components().any(|c| match c {
        Component::Normal(part) => names.iter().any(|n| part == n.as_str()),
        _ => false,
    })
}

/// Lowercased extension of `path`, without the dot.
#[must_use]
pub fn extension(path: &str) -> Option<String> {
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_url_path_strips_root() {
        let root = Path::new("/project");
        assert_eq!(
            relative_url_path(root, Path::new("/project/src/main.ts")),
            "src/main.ts"
        );
        assert_eq!(
            relative_url_path(root, Path::new("/project/index.html")),
            "index.html"
        );
    }

    #[test]
    fn test_relative_url_path_already_relative() {
        let root = Path::new("/project");
        assert_eq!(
            relative_url_path(root, Path::new("./src/app.css")),
            "src/app.css"
        );
        assert_eq!(relative_url_path(root, Path::new("index.html")), "index.html");
    }

    #[test]
    fn test_join_url_path_cannot_escape_root() {
        let root = Path::new("/project");
        assert_eq!(
            join_url_path(root, "/src/../../etc/passwd"),
            PathBuf::from("/project/src/etc/passwd")
        );
        assert_eq!(join_url_path(root, "/app.js"), PathBuf::from("/project/app.js"));
    }

    #[test]
    fn test_has_component() {
        let ignored = vec!["node_modules".to_string(), ".git".to_string()];
        assert!(has_component(
            Path::new("/p/node_modules/react/index.js"),
            &ignored
        ));
        assert!(has_component(Path::new("/p/.git/HEAD"), &ignored));
        assert!(!has_component(Path::new("/p/src/git.js"), &ignored));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/src/App.TSX").as_deref(), Some("tsx"));
        assert_eq!(extension("index.html").as_deref(), Some("html"));
        assert_eq!(extension("/src/.env"), None);
        assert_eq!(extension("/src/Makefile"), None);
        assert_eq!(extension("/v1.2/readme"), None);
    }
}
