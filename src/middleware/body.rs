//! Body capture and parsing.
//!
//! Installed ahead of every layer that reads the body (auth routes, the API
//! router). The server hands over a fully collected body; these layers only
//! interpret it and store the result in the request extensions.

use bytes::Bytes;
use http::StatusCode;
use http::header::CONTENT_TYPE;

use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

/// Default JSON body limit, matching common Node.js body parsers.
pub const JSON_LIMIT: usize = 100 * 1024;

/// The body exactly as received, for webhook signature verification.
#[derive(Clone, Debug)]
pub struct RawBody(pub Bytes);

/// A parsed `application/json` body.
#[derive(Clone, Debug)]
pub struct JsonBody(pub serde_json::Value);

/// A parsed `application/x-www-form-urlencoded` body.
#[derive(Clone, Debug, Default)]
pub struct FormBody(pub Vec<(String, String)>);

impl FormBody {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

fn content_type_is(req: &Request, expected: &str) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(expected))
}

/// Keeps a copy of every non-empty body as [`RawBody`].
pub async fn raw_body(mut req: Request, next: Next) -> Response {
    if !req.body().is_empty() {
        let raw = RawBody(req.body().clone());
        req.extensions_mut().insert(raw);
    }
    next.run(req).await
}

/// Parses JSON bodies into [`JsonBody`]. Malformed JSON is rejected with 400,
/// oversized bodies with 413.
pub async fn json(mut req: Request, next: Next) -> Response {
    if req.body().is_empty() || !content_type_is(&req, "application/json") {
        return next.run(req).await;
    }
    if req.body().len() > JSON_LIMIT {
        return Response::status(StatusCode::PAYLOAD_TOO_LARGE);
    }
    match serde_json::from_slice(req.body()) {
        Ok(value) => {
            req.extensions_mut().insert(JsonBody(value));
            next.run(req).await
        }
        Err(e) => Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .text(format!("invalid JSON body: {e}")),
    }
}

/// Parses form bodies into [`FormBody`].
pub async fn urlencoded(mut req: Request, next: Next) -> Response {
    if !req.body().is_empty() && content_type_is(&req, "application/x-www-form-urlencoded") {
        let pairs = url::form_urlencoded::parse(req.body())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        req.extensions_mut().insert(FormBody(pairs));
    }
    next.run(req).await
}
