//! History fallback, HTML entry points and the final 404.

use crate::middleware::decode_path;
use crate::server::SharedState;
use crate::CLIENT_PATH;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use devserve_core::ModuleKind;
use devserve_util::path::join_url_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Body of the final 404 response.
pub const NOT_FOUND_BODY: &str = "<h1>Page 404</h1>";

/// Rewrite from a request path to a candidate path.
pub type Rewrite = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// SPA history fallback.
///
/// Only applies to `GET`/`HEAD` requests that accept HTML. Paths ending in
/// `/` go through the rewrite; other paths without a dot in their last
/// segment become `/index.html`; everything else is left alone.
#[derive(Clone)]
pub struct HistoryFallback {
    rewrite: Rewrite,
}

impl std::fmt::Debug for HistoryFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryFallback").finish_non_exhaustive()
    }
}

impl HistoryFallback {
    /// Default rewrite: `<path>index.html` if that file exists under `root`,
    /// else `/index.html`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::with_rewrite(move |path| {
            let candidate = format!("{path}index.html");
            if join_url_path(&root, &candidate).is_file() {
                candidate
            } else {
                "/index.html".to_string()
            }
        })
    }

    /// Use a custom rewrite for paths ending in `/`.
    pub fn with_rewrite<F>(rewrite: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            rewrite: Arc::new(rewrite),
        }
    }

    /// The path to serve instead of `path`, if any.
    pub fn rewrite(&self, path: &str, accepts_html: bool) -> Option<String> {
        if !accepts_html {
            return None;
        }
        if path.ends_with('/') {
            return Some((self.rewrite)(path));
        }
        let last_segment = path.rsplit('/').next().unwrap_or(path);
        if last_segment.contains('.') {
            None
        } else {
            Some("/index.html".to_string())
        }
    }
}

/// Insert the client runtime script into an HTML page.
///
/// Goes before `</head>`, else before `</body>`, else at the end. Pages
/// that already reference the runtime are left alone.
pub fn inject_client(html: &str) -> String {
    if html.contains(CLIENT_PATH) {
        return html.to_string();
    }
    let tag = format!(r#"<script type="module" src="{CLIENT_PATH}"></script>"#);
    let mut out = html.to_string();
    if let Some(pos) = out.find("</head>").or_else(|| out.find("</body>")) {
        out.insert_str(pos, &format!("  {tag}\n  "));
    } else {
        out.push('\n');
        out.push_str(&tag);
    }
    out
}

/// Serve an HTML file under `root` with the client runtime injected.
pub(crate) fn serve_html(root: &Path, url_path: &str) -> Option<Response> {
    if ModuleKind::from_path(url_path) != ModuleKind::Html {
        return None;
    }
    let file = join_url_path(root, url_path);
    match std::fs::read_to_string(&file) {
        Ok(html) => Some(
            (
                [(header::CACHE_CONTROL, "no-cache")],
                Html(inject_client(&html)),
            )
                .into_response(),
        ),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(file = %file.display(), error = %e, "Failed to read HTML");
            None
        }
    }
}

/// Serve `.html` requests directly so they always carry the client runtime.
pub(crate) async fn html_middleware(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Response {
    if is_get_or_head(req.method()) {
        if let Some(path) = decode_path(req.uri().path()) {
            if let Some(response) = serve_html(&state.root, &path) {
                return response;
            }
        }
    }
    next.run(req).await
}

/// Runs when no static file matched: history fallback, HTML, then 404.
pub(crate) async fn fallback_handler(State(state): State<SharedState>, req: Request) -> Response {
    if is_get_or_head(req.method()) {
        if let Some(path) = decode_path(req.uri().path()) {
            if let Some(target) = state.history.rewrite(&path, accepts_html(req.headers())) {
                debug!(from = %path, to = %target, "history fallback");
                if let Some(response) = serve_html(&state.root, &target) {
                    return response;
                }
            }
        }
    }
    not_found()
}

pub(crate) fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_BODY)).into_response()
}

fn is_get_or_head(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("text/html") || v.contains("*/*"))
}
