//! Route handlers.
//!
//! A handler is any `Fn(Request) -> impl Future` whose output converts into
//! a [`Response`]. Plain `async fn`s work, but most of portico's own routes
//! are closures that own their state:
//!
//! - [`health::liveness`](crate::health::liveness) and
//!   [`health::readiness`](crate::health::readiness) capture a
//!   [`HealthState`](crate::HealthState) and read it on every request;
//! - the sign-in routes capture a clone of the configured credential handle
//!   to build authorize URLs.
//!
//! The closure is called once per request, so state is cloned out of it
//! before the `async move` block:
//!
//! ```rust
//! # use portico::{App, HealthState, Method, Request, Response};
//! let health = HealthState::new();
//! let mut app = App::new();
//! app.route(Method::GET, "/status", move |_req: Request| {
//!     let ready = health.snapshot().ready;
//!     async move { Response::text(if ready { "ready" } else { "starting" }) }
//! });
//! ```
//!
//! The router stores every handler as a [`BoxedHandler`] so that trees of
//! different closure types fit in one map.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The future every handler and middleware is erased to.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe form of [`Handler`].
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Anything [`App::route`](crate::App::route) accepts.
///
/// Sealed; satisfied by every `Fn(Request) -> Fut` where `Fut` resolves to
/// an [`IntoResponse`] value (`Response`, `String`, `&'static str`,
/// `StatusCode`, `serde_json::Value`).
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(Route(self))
    }
}

struct Route<F>(F);

impl<F, Fut, R> ErasedHandler for Route<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{Method, StatusCode};

    use super::*;

    #[tokio::test]
    async fn closures_keep_their_state_across_calls() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handler = (move |_req: Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { n.to_string() }
        })
        .into_boxed_handler();

        handler.call(Request::new(Method::GET, "/")).await;
        let res = handler.call(Request::new(Method::GET, "/")).await;

        assert_eq!(res.body(), b"2".as_slice());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn outputs_are_converted_into_responses() {
        let handler = (|_req: Request| async { StatusCode::NO_CONTENT }).into_boxed_handler();
        let res = handler.call(Request::new(Method::DELETE, "/session")).await;
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    }
}
