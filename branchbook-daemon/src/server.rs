//! Static file server over the site directory.
//!
//! Every path is resolved against the site root on each request, so newly
//! published or removed branches show up without a restart. Anything that
//! resolves outside the root (via `..` or a symlink) is refused.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use branchbook_core::layout::ENTRY_PAGE;

use crate::error::DaemonError;

#[derive(Debug, Clone)]
struct SiteState {
    root: PathBuf,
}

/// Router serving `root`. Methods other than GET and HEAD get 405.
pub fn router(root: impl Into<PathBuf>) -> Router {
    Router::new()
        .fallback(serve_path)
        .with_state(Arc::new(SiteState { root: root.into() }))
}

/// Serve `root` on `listener` until a shutdown is broadcast.
pub async fn serve(
    listener: TcpListener,
    root: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    tracing::info!(%addr, root = %root.display(), "serving storybooks");

    axum::serve(listener, router(root))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|source| DaemonError::Serve { addr, source })
}

async fn serve_path(State(site): State<Arc<SiteState>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
        )
            .into_response();
    }

    let response = match resolve(&site.root, uri.path()).await {
        Resolved::File(path) => file_response(&path, method == Method::HEAD).await,
        Resolved::Redirect => {
            let mut location = format!("{}/", uri.path());
            if let Some(query) = uri.query() {
                location.push('?');
                location.push_str(query);
            }
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
        }
        Resolved::Status(status) => status_response(status),
    };
    tracing::debug!(%method, path = uri.path(), status = %response.status(), "request");
    response
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Resolved {
    File(PathBuf),
    /// A directory requested without its trailing slash.
    Redirect,
    Status(StatusCode),
}

async fn resolve(root: &Path, request_path: &str) -> Resolved {
    let Ok(decoded) = percent_decode_str(request_path).decode_utf8() else {
        return Resolved::Status(StatusCode::BAD_REQUEST);
    };
    if decoded.contains('\0') {
        return Resolved::Status(StatusCode::BAD_REQUEST);
    }

    let root = match tokio::fs::canonicalize(root).await {
        Ok(root) => root,
        Err(err) => return Resolved::Status(io_status(&err)),
    };
    let candidate = root.join(decoded.trim_start_matches('/'));
    let path = match tokio::fs::canonicalize(&candidate).await {
        Ok(path) => path,
        Err(err) => return Resolved::Status(io_status(&err)),
    };
    if !path.starts_with(&root) {
        tracing::warn!(path = request_path, "refusing path outside the site root");
        return Resolved::Status(StatusCode::FORBIDDEN);
    }

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(err) => return Resolved::Status(io_status(&err)),
    };
    if metadata.is_dir() {
        if !request_path.ends_with('/') {
            return Resolved::Redirect;
        }
        return Resolved::File(path.join(ENTRY_PAGE));
    }
    Resolved::File(path)
}

async fn file_response(path: &Path, head_only: bool) -> Response {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => return status_response(io_status(&err)),
    };
    let length = bytes.len();
    let body = if head_only {
        Body::empty()
    } else {
        Body::from(bytes)
    };
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type(path).to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        body,
    )
        .into_response()
}

fn status_response(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("{} {reason}\n", status.as_u16()),
    )
        .into_response()
}

fn io_status(err: &std::io::Error) -> StatusCode {
    match err.kind() {
        // NotADirectory shows up for `file.html/extra`.
        ErrorKind::NotFound | ErrorKind::NotADirectory => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        _ => {
            tracing::warn!(error = %err, "filesystem error while serving");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Content type by file extension; unknown extensions are served as text.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" | "cjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "wasm" => "application/wasm",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        _ => "text/plain; charset=utf-8",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type(Path::new("a/index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("main.JS")), "text/javascript; charset=utf-8");
        assert_eq!(content_type(Path::new("font.woff2")), "font/woff2");
        assert_eq!(content_type(Path::new("LICENSE")), "text/plain; charset=utf-8");
        assert_eq!(content_type(Path::new("x.unknown")), "text/plain; charset=utf-8");
    }

    #[test]
    fn io_status_maps_missing_files_to_404() {
        let err = std::io::Error::new(ErrorKind::NotFound, "gone");
        assert_eq!(io_status(&err), StatusCode::NOT_FOUND);
        let err = std::io::Error::new(ErrorKind::Other, "disk");
        assert_eq!(io_status(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
