//! `/favicon.ico` from the site's public directory.
//!
//! The icon is read once on first request and kept in memory. If there is
//! no icon on disk the request falls through.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use tokio::sync::OnceCell;

use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::{ContentType, Response};

const PATH: &str = "/favicon.ico";
const CACHE_CONTROL: &str = "public, max-age=86400";

pub fn favicon(public_dir: impl Into<PathBuf>) -> impl Middleware {
    let file = public_dir.into().join("favicon.ico");
    let icon: Arc<OnceCell<Option<Bytes>>> = Arc::new(OnceCell::new());
    move |req: Request, next: Next| {
        let icon = Arc::clone(&icon);
        let file = file.clone();
        async move {
            if req.path() != PATH || !matches!(*req.method(), Method::GET | Method::HEAD) {
                return next.run(req).await;
            }
            let cached = icon
                .get_or_init(|| async move { tokio::fs::read(&file).await.ok().map(Bytes::from) })
                .await;
            match cached {
                Some(bytes) => Response::builder()
                    .header("cache-control", CACHE_CONTROL)
                    .bytes(ContentType::Icon, bytes.clone()),
                None => next.run(req).await,
            }
        }
    }
}
