//! The application being assembled: settings, an ordered layer stack and the
//! route table.
//!
//! [`App`] is mutable while the pipeline is bootstrapped and frozen into a
//! [`Pipeline`] by [`App::build`]. Every installation is recorded in an
//! append-only journal ([`App::installed`]) so that the order in which the
//! bootstrap pass touched the app can be inspected afterwards.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use http::{Method, StatusCode};

use crate::handler::Handler;
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// App-wide settings consulted by layers and by the server.
#[derive(Clone, Debug)]
pub struct Settings {
    pub views: Option<PathBuf>,
    pub view_engine: Option<String>,
    pub view_cache: bool,
    pub x_powered_by: bool,
    pub trust_proxy: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            views: None,
            view_engine: None,
            view_cache: false,
            x_powered_by: true,
            trust_proxy: false,
        }
    }
}

/// One entry of the installation journal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Installed {
    Setting(&'static str),
    Layer(&'static str),
    Route(Method, String),
}

impl fmt::Display for Installed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setting(name) => write!(f, "set {name}"),
            Self::Layer(name) => write!(f, "use {name}"),
            Self::Route(method, path) => write!(f, "route {method} {path}"),
        }
    }
}

pub(crate) struct Layer {
    name: &'static str,
    prefix: Option<String>,
    middleware: BoxedMiddleware,
}

impl Layer {
    /// `/api` matches `/api` and `/api/...` but not `/apiary`.
    pub(crate) fn matches(&self, path: &str) -> bool {
        match &self.prefix {
            None => true,
            Some(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }

    pub(crate) fn middleware(&self) -> &BoxedMiddleware {
        &self.middleware
    }
}

/// An application under construction.
#[derive(Default)]
pub struct App {
    settings: Settings,
    layers: Vec<Layer>,
    router: Router,
    journal: Vec<Installed>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Changes a setting and records `name` in the journal.
    pub fn set(&mut self, name: &'static str, apply: impl FnOnce(&mut Settings)) {
        apply(&mut self.settings);
        self.journal.push(Installed::Setting(name));
    }

    /// Honour `X-Forwarded-*` headers from the reverse proxy in front of us.
    pub fn enable_trust_proxy(&mut self) {
        self.set("trust proxy", |s| s.trust_proxy = true);
    }

    /// Appends a layer that sees every request.
    pub fn use_layer(&mut self, name: &'static str, middleware: impl Middleware) {
        self.push_layer(name, None, middleware);
    }

    /// Appends a layer that only sees requests under `prefix`.
    pub fn mount(&mut self, prefix: &str, name: &'static str, middleware: impl Middleware) {
        let prefix = prefix.trim_end_matches('/');
        self.push_layer(name, Some(prefix.to_owned()), middleware);
    }

    /// Mounts a sub-router under `prefix`. Its patterns are relative to the
    /// prefix; requests it cannot route fall through to the rest of the stack.
    pub fn mount_router(&mut self, prefix: &str, name: &'static str, router: Router) {
        let strip = prefix.trim_end_matches('/').to_owned();
        let router = Arc::new(router);
        self.mount(prefix, name, move |mut req: Request, next: Next| {
            let router = Arc::clone(&router);
            let relative = match req.path().strip_prefix(strip.as_str()) {
                Some("") | None => "/".to_owned(),
                Some(rest) => rest.to_owned(),
            };
            async move {
                match router.lookup(req.method(), &relative) {
                    Some((handler, params)) => {
                        req.set_params(params);
                        handler.call(req).await
                    }
                    None => next.run(req).await,
                }
            }
        });
    }

    /// Registers a route on the app's own route table.
    pub fn route(&mut self, method: Method, path: &str, handler: impl Handler) {
        self.router.insert(method.clone(), path, handler);
        self.journal.push(Installed::Route(method, path.to_owned()));
    }

    /// Everything installed so far, in order.
    pub fn installed(&self) -> &[Installed] {
        &self.journal
    }

    /// Names of the installed layers, in stack order.
    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name).collect()
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.iter().any(|l| l.name == name)
    }

    pub fn has_route(&self, method: &Method, pattern: &str) -> bool {
        self.router.has_route(method, pattern)
    }

    /// Freezes the app into a servable pipeline.
    pub fn build(self) -> Pipeline {
        Pipeline {
            inner: Arc::new(Stack {
                settings: self.settings,
                layers: self.layers,
                router: self.router,
            }),
        }
    }

    fn push_layer(
        &mut self,
        name: &'static str,
        prefix: Option<String>,
        middleware: impl Middleware,
    ) {
        self.layers.push(Layer { name, prefix, middleware: middleware.into_boxed_middleware() });
        self.journal.push(Installed::Layer(name));
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("settings", &self.settings)
            .field("layers", &self.layer_names())
            .field("router", &self.router)
            .finish()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// A frozen, shareable request pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Stack>,
}

pub(crate) struct Stack {
    settings: Settings,
    layers: Vec<Layer>,
    router: Router,
}

impl Pipeline {
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Runs `req` through every matching layer and then the router.
    pub async fn handle(&self, req: Request) -> Response {
        let mut res = Next::new(Arc::clone(&self.inner)).run(req).await;
        if self.inner.settings.x_powered_by {
            res.headers_mut()
                .insert("x-powered-by", http::HeaderValue::from_static("portico"));
        }
        res
    }
}

impl Stack {
    pub(crate) fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub(crate) async fn route(&self, mut req: Request) -> Response {
        match self.router.lookup(req.method(), req.path()) {
            Some((handler, params)) => {
                req.set_params(params);
                handler.call(req).await
            }
            None => Response::status(StatusCode::NOT_FOUND),
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("layers", &self.inner.layers.iter().map(|l| l.name).collect::<Vec<_>>())
            .finish()
    }
}
