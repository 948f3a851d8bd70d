//! Development helper for attached dev containers (GitHub Codespaces).
//!
//! Inside a codespace the browser has to reach the app through the forwarded
//! port URL; OAuth callbacks and cookies break on `localhost`. Requests that
//! arrive with a loopback `Host` are redirected to the forwarded origin.

use http::Method;

use crate::config::CodespacesConfig;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Whether a `Host` header names this machine. IPv6 literals keep their
/// brackets; a port is only stripped after the closing `]`.
fn is_loopback(host: &str) -> bool {
    let name = match host.rfind(']') {
        Some(end) => &host[..=end],
        None => host.split_once(':').map_or(host, |(name, _)| name),
    };
    matches!(name.to_ascii_lowercase().as_str(), "localhost" | "127.0.0.1" | "[::1]")
}

/// `https://<codespace>-<port>.<domain>`, when the codespace name is known.
pub fn forwarded_origin(codespaces: &CodespacesConfig) -> Option<String> {
    let name = codespaces.name.as_deref().filter(|n| !n.is_empty())?;
    Some(format!("https://{name}-{}.{}", codespaces.port, codespaces.port_forwarding_domain))
}

pub fn dev_assistant(codespaces: &CodespacesConfig) -> impl Middleware {
    let origin = forwarded_origin(codespaces);
    move |req: Request, next: Next| {
        let target = origin.as_ref().and_then(|origin| {
            let on_loopback = req.header("host").is_some_and(is_loopback);
            (on_loopback && *req.method() == Method::GET).then(|| {
                let path_and_query =
                    req.uri().path_and_query().map_or("/", |pq| pq.as_str()).to_owned();
                format!("{origin}{path_and_query}")
            })
        });
        async move {
            match target {
                Some(location) => Response::redirect(&location),
                None => next.run(req).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::App;

    fn codespace() -> CodespacesConfig {
        CodespacesConfig {
            connected: true,
            name: Some("octo-space".to_owned()),
            port: 3000,
            ..CodespacesConfig::default()
        }
    }

    #[tokio::test]
    async fn redirects_loopback_requests() {
        let mut app = App::new();
        app.use_layer("dev-assistant", dev_assistant(&codespace()));
        app.route(Method::GET, "/", |_req: Request| async { "home" });
        let pipeline = app.build();

        let local = Request::new(Method::GET, "/orgs?x=1").with_header("host", "localhost:3000");
        let res = pipeline.handle(local).await;
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.header("location"), Some("https://octo-space-3000.app.github.dev/orgs?x=1"));

        let forwarded = Request::new(Method::GET, "/")
            .with_header("host", "octo-space-3000.app.github.dev");
        assert_eq!(pipeline.handle(forwarded).await.body(), b"home".as_slice());
    }

    #[rstest::rstest]
    #[case::name("localhost", true)]
    #[case::name_and_port("LocalHost:3000", true)]
    #[case::v4_and_port("127.0.0.1:8080", true)]
    #[case::bare_v6("[::1]", true)]
    #[case::v6_and_port("[::1]:3000", true)]
    #[case::public("example.com", false)]
    #[case::public_v6("[2001:db8::1]:443", false)]
    fn recognizes_loopback_hosts(#[case] host: &str, #[case] expected: bool) {
        assert_eq!(is_loopback(host), expected);
    }

    #[test]
    fn no_origin_without_codespace_name() {
        assert_eq!(forwarded_origin(&CodespacesConfig::default()), None);
    }
}
