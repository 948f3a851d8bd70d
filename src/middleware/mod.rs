//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: body parsing, compression, sessions, request
//! logging, correlation ids. A middleware receives the request and a
//! [`Next`] handle; it either answers on its own or calls
//! [`Next::run`] to pass the request down the stack and gets the response
//! back on the way out.
//!
//! ```rust
//! use portico::{App, Request, Response};
//! use portico::middleware::Next;
//!
//! async fn powered_by(req: Request, next: Next) -> Response {
//!     let mut res = next.run(req).await;
//!     res.headers_mut().insert("x-served-by", "portico".parse().unwrap());
//!     res
//! }
//!
//! let mut app = App::new();
//! app.use_layer("served-by", powered_by);
//! ```
//!
//! Layers run in installation order. [`bootstrap`](crate::bootstrap) decides
//! which of the built-in layers below are installed and in what order.

pub mod body;
pub mod campaign;
pub mod compression;
pub mod dev_assistant;
pub mod favicon;
pub mod locals;
pub mod logger;
pub mod office_hyperlinks;
pub mod scrubbed_url;
pub mod static_files;

use std::future::Future;
use std::sync::Arc;

use crate::app::Stack;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Erasure ───────────────────────────────────────────────────────────────────

/// Internal dispatch interface, the middleware twin of `ErasedHandler`.
#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every valid middleware.
///
/// Automatically satisfied for any function or closure with the shape
/// `Fn(Request, Next) -> impl Future<Output = impl IntoResponse>`. Sealed.
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut, R> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let fut = (self.0)(req, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The remainder of the pipeline after the current layer.
///
/// Consumed by [`run`](Next::run): a layer passes the request on at most once.
pub struct Next {
    stack: Arc<Stack>,
    index: usize,
}

impl Next {
    pub(crate) fn new(stack: Arc<Stack>) -> Self {
        Self { stack, index: 0 }
    }

    /// Runs the next matching layer, or the router once the stack is exhausted.
    pub async fn run(mut self, req: Request) -> Response {
        while let Some(layer) = self.stack.layer(self.index) {
            self.index += 1;
            if !layer.matches(req.path()) {
                continue;
            }
            let middleware = Arc::clone(layer.middleware());
            return middleware.call(req, self).await;
        }
        self.stack.route(req).await
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish()
    }
}
