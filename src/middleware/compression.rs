//! gzip response compression.
//!
//! Installed before any response-producing layer so that everything further
//! down the stack is compressed on the way out.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use http::HeaderValue;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY};
use tracing::warn;

use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

/// Bodies smaller than this are sent as-is.
pub const THRESHOLD: usize = 1024;

fn accepts_gzip(req: &Request) -> bool {
    req.headers()
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|enc| {
            let mut parts = enc.trim().split(';');
            let name = parts.next().unwrap_or_default().trim();
            let refused = parts.any(|p| p.trim().replace(' ', "") == "q=0");
            (name.eq_ignore_ascii_case("gzip") || name == "*") && !refused
        })
}

fn compressible(res: &Response) -> bool {
    let Some(content_type) = res.header(CONTENT_TYPE.as_str()) else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.starts_with("text/")
        || matches!(
            essence,
            "application/json" | "application/javascript" | "application/xml" | "image/svg+xml"
        )
}

fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

pub async fn compression(req: Request, next: Next) -> Response {
    let wants_gzip = accepts_gzip(&req);
    let mut res = next.run(req).await;

    res.headers_mut().append(VARY, HeaderValue::from_static("accept-encoding"));
    if !wants_gzip
        || res.body().len() < THRESHOLD
        || res.headers().contains_key(CONTENT_ENCODING)
        || !compressible(&res)
    {
        return res;
    }

    match gzip(res.body()) {
        Ok(compressed) => {
            res.headers_mut().insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            res.headers_mut().remove(CONTENT_LENGTH);
            res.set_body(compressed);
        }
        Err(e) => warn!("gzip failed, sending uncompressed: {e}"),
    }
    res
}
