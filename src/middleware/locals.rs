//! Request-local values for handlers and views.

use http::HeaderValue;

use crate::config::SiteConfig;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Values every handler can rely on, regardless of how the boot went.
#[derive(Clone, Debug)]
pub struct Locals {
    pub correlation_id: String,
    pub production: bool,
    pub company_name: String,
}

/// Attaches [`Locals`] and echoes the correlation id on the response. An
/// incoming `x-correlation-id` is reused so ids survive across services.
pub fn locals(config: &SiteConfig) -> impl Middleware {
    let production = config.node.is_production;
    let company_name = config.brand.company_name.clone();
    move |mut req: Request, next: Next| {
        let correlation_id = req
            .header(CORRELATION_HEADER)
            .filter(|id| !id.is_empty() && id.len() <= 64)
            .map_or_else(|| nanoid::nanoid!(), str::to_owned);
        req.extensions_mut().insert(Locals {
            correlation_id: correlation_id.clone(),
            production,
            company_name: company_name.clone(),
        });
        async move {
            let mut res = next.run(req).await;
            if let Ok(value) = HeaderValue::from_str(&correlation_id) {
                res.headers_mut().insert(CORRELATION_HEADER, value);
            }
            res
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{App, Method};

    #[tokio::test]
    async fn reuses_or_generates_correlation_ids() {
        let mut app = App::new();
        app.use_layer("locals", locals(&SiteConfig::default()));
        app.route(Method::GET, "/", |req: Request| async move {
            req.extensions().get::<Locals>().map(|l| l.company_name.clone()).unwrap_or_default()
        });
        let pipeline = app.build();

        let res = pipeline
            .handle(Request::new(Method::GET, "/").with_header(CORRELATION_HEADER, "abc-123"))
            .await;
        assert_eq!(res.header(CORRELATION_HEADER), Some("abc-123"));
        assert_eq!(res.body(), b"Portal".as_slice());

        let res = pipeline.handle(Request::new(Method::GET, "/")).await;
        assert_eq!(res.header(CORRELATION_HEADER).map(str::len), Some(21));
    }
}
