//! A log-safe copy of the request URL.

use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

/// Query parameters whose values never reach logs.
const SENSITIVE: &[&str] = &["code", "state", "token", "access_token", "client_secret", "password"];

const REDACTED: &str = "[redacted]";

/// The request path and query with sensitive values replaced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScrubbedUrl(pub String);

pub(crate) fn scrub(req: &Request) -> String {
    let Some(query) = req.query() else {
        return req.path().to_owned();
    };
    let mut scrubbed = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if SENSITIVE.iter().any(|s| key.eq_ignore_ascii_case(s)) {
            scrubbed.append_pair(&key, REDACTED);
        } else {
            scrubbed.append_pair(&key, &value);
        }
    }
    format!("{}?{}", req.path(), scrubbed.finish())
}

pub async fn scrubbed_url(mut req: Request, next: Next) -> Response {
    let url = ScrubbedUrl(scrub(&req));
    req.extensions_mut().insert(url);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn redacts_oauth_parameters() {
        let req = Request::new(Method::GET, "/auth/github/callback?code=s3cret&state=abc&next=%2Forgs");
        assert_eq!(
            scrub(&req),
            "/auth/github/callback?code=%5Bredacted%5D&state=%5Bredacted%5D&next=%2Forgs"
        );
    }

    #[test]
    fn leaves_plain_paths_alone() {
        assert_eq!(scrub(&Request::new(Method::GET, "/orgs")), "/orgs");
    }
}
