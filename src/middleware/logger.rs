//! Per-request logging through `tracing`.
//!
//! Runs after the scrubbed-url layer, so only redacted URLs are logged.
//! Health-check traffic is skipped to keep the log readable.

use std::time::Instant;

use tracing::info;

use crate::config::LoggingConfig;
use crate::middleware::scrubbed_url::{ScrubbedUrl, scrub};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

const QUIET_PATHS: &[&str] = &["/healthz", "/readyz", "/health", "/api/health"];

pub fn request_logger(config: &LoggingConfig) -> impl Middleware {
    let enabled = config.requests;
    move |req: Request, next: Next| async move {
        if !enabled || QUIET_PATHS.contains(&req.path()) {
            return next.run(req).await;
        }
        let method = req.method().clone();
        let url = req
            .extensions()
            .get::<ScrubbedUrl>()
            .map_or_else(|| scrub(&req), |u| u.0.clone());
        let started = Instant::now();

        let res = next.run(req).await;

        info!(
            %method,
            url = %url,
            status = res.status_code().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request"
        );
        res
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;
    use crate::middleware::scrubbed_url::scrubbed_url;
    use crate::{App, Method, Pipeline};

    /// Collects the `url` field of every event the logger emits.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<String>>>);

    struct UrlField(Option<String>);

    impl Visit for UrlField {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "url" {
                self.0 = Some(format!("{value:?}"));
            }
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if event.metadata().target() != "portico::middleware::logger" {
                return;
            }
            let mut url = UrlField(None);
            event.record(&mut url);
            self.0.lock().push(url.0.unwrap_or_default());
        }
    }

    fn pipeline(requests: bool) -> Pipeline {
        let mut app = App::new();
        app.use_layer("scrubbed-url", scrubbed_url);
        app.use_layer("request-logger", request_logger(&LoggingConfig { requests }));
        app.route(Method::GET, "/healthz", |_req: Request| async { "ok" });
        app.route(Method::GET, "/auth/github/callback", |_req: Request| async { "cb" });
        app.build()
    }

    #[tokio::test]
    async fn logs_scrubbed_urls_but_not_health_checks() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(captured.clone()),
        );
        let pipeline = pipeline(true);

        pipeline.handle(Request::new(Method::GET, "/healthz")).await;
        pipeline
            .handle(Request::new(Method::GET, "/auth/github/callback?code=s3cret&next=%2F"))
            .await;

        let urls = captured.0.lock().clone();
        assert_eq!(urls, ["/auth/github/callback?code=%5Bredacted%5D&next=%2F"]);
    }

    #[tokio::test]
    async fn silent_when_request_logging_is_off() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(captured.clone()),
        );

        pipeline(false).handle(Request::new(Method::GET, "/auth/github/callback")).await;

        assert!(captured.0.lock().is_empty());
    }
}
