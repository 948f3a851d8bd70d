//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. The router is the last
//! stop of the pipeline: a request reaches it only after every installed
//! layer has passed it on.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};

/// A method + path routing table.
///
/// Build it once at startup. Routes use `{name}` parameter syntax, which
/// `req.param("name")` retrieves:
///
/// ```rust
/// # use portico::{Method, Request, Response, Router};
/// # async fn get_user(_: Request) -> Response { Response::text("") }
/// # async fn create_user(_: Request) -> Response { Response::text("") }
/// let api = Router::new()
///     .on(Method::GET,  "/users/{id}", get_user)
///     .on(Method::POST, "/users",      create_user);
/// assert!(api.has_route(&Method::GET, "/users/{id}"));
/// ```
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    patterns: Vec<(Method, String)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.insert(method, path, handler);
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with an existing
    /// route. Both are programmer errors caught at startup.
    pub(crate) fn insert(&mut self, method: Method, path: &str, handler: impl Handler) {
        self.routes
            .entry(method.clone())
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.patterns.push((method, path.to_owned()));
    }

    /// Whether exactly this method + pattern pair was registered.
    pub fn has_route(&self, method: &Method, pattern: &str) -> bool {
        self.patterns.iter().any(|(m, p)| m == method && p == pattern)
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("routes", &self.patterns).finish()
    }
}
