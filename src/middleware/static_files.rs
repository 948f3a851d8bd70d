//! Static file serving for site assets and prebuilt client applications.
//!
//! Every static layer is installed ahead of the API mount so that asset paths
//! are never shadowed by it. Misses fall through to the rest of the stack.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::warn;

use crate::middleware::Next;
use crate::request::Request;
use crate::response::{ContentType, Response};

/// How long browsers may cache served assets.
const CACHE_CONTROL: &str = "public, max-age=3600";

/// Maps a URL path onto `root`, rejecting anything that could escape it.
fn resolve(root: &Path, url_path: &str) -> Option<PathBuf> {
    let relative = Path::new(url_path.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

/// Reads the file for `req` under `root`, serving `index.html` for directories.
async fn read_asset(root: &Path, url_path: &str) -> Option<(Vec<u8>, ContentType)> {
    let mut path = resolve(root, url_path)?;
    if tokio::fs::metadata(&path).await.ok()?.is_dir() {
        path.push("index.html");
    }
    let content_type = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(ContentType::OctetStream, ContentType::from_extension);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Some((bytes, content_type)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), "static asset unreadable: {e}");
            None
        }
    }
}

/// Serves files below `root` for `GET`/`HEAD` requests.
///
/// Mount with [`App::mount`](crate::App::mount) to serve under a URL prefix;
/// the prefix is stripped before the file is resolved.
pub fn serve_dir(root: impl Into<PathBuf>, prefix: &str) -> impl crate::middleware::Middleware {
    let root: PathBuf = root.into();
    let root: Arc<Path> = root.into();
    let prefix = prefix.trim_end_matches('/').to_owned();
    move |req: Request, next: Next| {
        let root = Arc::clone(&root);
        let relative = req.path().strip_prefix(prefix.as_str()).unwrap_or(req.path()).to_owned();
        async move {
            if !matches!(*req.method(), Method::GET | Method::HEAD) {
                return next.run(req).await;
            }
            match read_asset(&root, &relative).await {
                Some((bytes, content_type)) => {
                    let body = if *req.method() == Method::HEAD { Vec::new() } else { bytes };
                    Response::builder()
                        .status(StatusCode::OK)
                        .header("cache-control", CACHE_CONTROL)
                        .bytes(content_type, body)
                }
                None => next.run(req).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::App;

    #[test]
    fn resolve_rejects_traversal() {
        let root = Path::new("/srv/public");
        assert_eq!(resolve(root, "/css/site.css"), Some(PathBuf::from("/srv/public/css/site.css")));
        assert_eq!(resolve(root, "/../etc/passwd"), None);
        assert_eq!(resolve(root, "/css/../../etc/passwd"), None);
    }

    #[tokio::test]
    async fn serves_files_and_falls_through_on_miss() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();

        let mut app = App::new();
        app.mount("/assets", "static", serve_dir(dir.path(), "/assets"));
        app.route(Method::GET, "/assets/missing.js", |_req: Request| async { "fallthrough" });
        let pipeline = app.build();

        let css = pipeline.handle(Request::new(Method::GET, "/assets/css/site.css")).await;
        assert_eq!(css.header("content-type"), Some("text/css"));
        assert_eq!(css.body(), b"body{}".as_slice());

        let index = pipeline.handle(Request::new(Method::GET, "/assets/")).await;
        assert_eq!(index.body(), b"<h1>home</h1>".as_slice());

        let miss = pipeline.handle(Request::new(Method::GET, "/assets/missing.js")).await;
        assert_eq!(miss.body(), b"fallthrough".as_slice());

        let post = pipeline.handle(Request::new(Method::POST, "/assets/css/site.css")).await;
        assert_eq!(post.status_code(), StatusCode::NOT_FOUND);
    }
}
