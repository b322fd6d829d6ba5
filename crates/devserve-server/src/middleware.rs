//! Request logging and the transform middleware.

use crate::server::SharedState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use devserve_core::{ModuleKind, PipelineError, TransformedModule};
use devserve_util::path::extension;
use percent_encoding::percent_decode_str;
use tracing::{debug, error, warn};

/// Header marking responses produced by the transform middleware.
pub(crate) const TRANSFORMED_BY: HeaderName = HeaderName::from_static("x-transformed-by");

/// Log every request URI.
pub(crate) async fn log_request(req: Request, next: Next) -> Response {
    debug!(method = %req.method(), uri = %req.uri(), "request");
    next.run(req).await
}

/// Serve module requests through the plugin pipeline.
///
/// A request qualifies when its extension is a module extension or its
/// query carries the `import` marker. Unresolved specifiers fall through to
/// the next layer untouched.
pub(crate) async fn transform_middleware(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Response {
    if *req.method() != Method::GET && *req.method() != Method::HEAD {
        return next.run(req).await;
    }

    let import_request = has_import_marker(req.uri().query());
    let Some(path) = decode_path(req.uri().path()) else {
        return next.run(req).await;
    };
    let is_module = extension(&path).is_some_and(|ext| state.plugins.is_module_extension(&ext));
    if !is_module && !import_request {
        return next.run(req).await;
    }

    match state
        .transformer
        .transform_request(&state.plugins, &path, import_request)
    {
        Ok(Some(module)) => module_response(module),
        Ok(None) => next.run(req).await,
        Err(PipelineError::NotFound { id }) => {
            debug!(path = %path, module_id = %id, "module not found");
            error_response(StatusCode::NOT_FOUND, format!("Module not found: {path}"))
        }
        Err(PipelineError::Transform(e)) => {
            error!(
                plugin = %e.plugin,
                module_id = %e.module_id,
                hook = %e.hook,
                error = %e.cause,
                "Transform failed"
            );
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Transform failed for {path}"),
            )
        }
        Err(e @ PipelineError::Io { .. }) => {
            warn!(path = %path, error = %e, "Failed to load module");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load {path}"),
            )
        }
    }
}

/// Serve script files that fell through to static serving as JavaScript.
///
/// The registered MIME type for `.ts` is `video/mp2t`, which browsers refuse
/// to execute.
pub(crate) async fn script_content_type(req: Request, next: Next) -> Response {
    let is_script = decode_path(req.uri().path())
        .is_some_and(|path| ModuleKind::from_path(&path) == ModuleKind::Script);
    let mut response = next.run(req).await;
    if is_script && response.status().is_success() {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/javascript"),
        );
    }
    response
}

fn module_response(module: TransformedModule) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, module.content_type),
            (header::CACHE_CONTROL, "no-cache"),
            (TRANSFORMED_BY, "devserve"),
        ],
        module.code,
    )
        .into_response()
}

fn error_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (TRANSFORMED_BY, "devserve"),
        ],
        body,
    )
        .into_response()
}

/// Percent-decode a URL path. `None` if it doesn't decode to UTF-8.
pub(crate) fn decode_path(path: &str) -> Option<String> {
    percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(std::borrow::Cow::into_owned)
}

/// Whether the query string carries the `import` marker (`?import`,
/// `&import`, `import=`).
pub(crate) fn has_import_marker(query: Option<&str>) -> bool {
    query.is_some_and(|q| {
        q.split('&')
            .any(|pair| pair == "import" || pair.starts_with("import="))
    })
}
