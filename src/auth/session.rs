//! Cookie-backed sessions.
//!
//! [`configure_sessions`] validates the session settings, resolves a
//! [`SessionStore`] and waits for it to connect before the layer is handed
//! back, so nothing installed afterwards can observe a half-built session
//! subsystem.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use http::header::SET_COOKIE;
use moka::future::Cache;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::app::App;
use crate::bootstrap::Providers;
use crate::config::SiteConfig;
use crate::error::{SessionConfigError, SessionStoreError};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Key/value data persisted for one session.
pub type SessionData = HashMap<String, serde_json::Value>;

pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, SessionStoreError>> + Send + 'a>>;

/// Persistence backend for sessions.
///
/// Object-safe so deployments can inject their own backend through
/// [`Providers::session_store`].
pub trait SessionStore: Send + Sync + 'static {
    /// Verifies the backend is reachable. Awaited once while the pipeline is
    /// assembled.
    fn connect(&self) -> StoreFuture<'_, ()>;
    fn load<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<SessionData>>;
    fn save<'a>(&'a self, id: &'a str, data: SessionData) -> StoreFuture<'a, ()>;
    fn destroy<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()>;
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

/// In-process store with idle expiry. Sessions do not survive a restart and
/// are not shared between replicas.
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, SessionData>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").field("entries", &self.cache.entry_count()).finish()
    }
}

impl MemoryStore {
    const MAX_SESSIONS: u64 = 100_000;

    pub fn new(idle: Duration) -> Self {
        let cache = Cache::builder().max_capacity(Self::MAX_SESSIONS).time_to_idle(idle).build();
        Self { cache }
    }
}

impl SessionStore for MemoryStore {
    fn connect(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn load<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<SessionData>> {
        Box::pin(async move { Ok(self.cache.get(id).await) })
    }

    fn save<'a>(&'a self, id: &'a str, data: SessionData) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.cache.insert(id.to_owned(), data).await;
            Ok(())
        })
    }

    fn destroy<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.cache.invalidate(id).await;
            Ok(())
        })
    }
}

// ── Session handle ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SessionInner {
    id: String,
    data: SessionData,
    is_new: bool,
    modified: bool,
    destroyed: bool,
}

/// The current request's session, found in the request extensions.
///
/// Clones share state; changes are written back after the response is built.
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    pub(crate) fn new(id: String, data: SessionData, is_new: bool) -> Self {
        let inner = SessionInner { id, data, is_new, modified: false, destroyed: false };
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    pub fn id(&self) -> String {
        self.inner.lock().id.clone()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.inner.lock().data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    /// # Errors
    ///
    /// Fails when `value` cannot be represented as JSON.
    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.inner.lock();
        inner.data.insert(key.to_owned(), value);
        inner.modified = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        let mut inner = self.inner.lock();
        let removed = inner.data.remove(key);
        inner.modified |= removed.is_some();
        removed
    }

    /// Drops the session entirely; the cookie is expired on the response.
    pub fn destroy(&self) {
        let mut inner = self.inner.lock();
        inner.data.clear();
        inner.destroyed = true;
    }
}

// ── Layer ─────────────────────────────────────────────────────────────────────

/// The constructed session layer, ready to be installed.
pub struct SessionLayer {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    key: Hmac<Sha256>,
    max_age: u64,
    secure_cookies: bool,
    trust_proxy: bool,
}

impl SessionLayer {
    /// Whether the layer honours `X-Forwarded-Proto` when deciding on `Secure`.
    /// Fixed when the layer is built from the app's `trust proxy` setting.
    pub fn trusts_proxy(&self) -> bool {
        self.trust_proxy
    }

    fn mac(&self, id: &str) -> Hmac<Sha256> {
        let mut mac = self.key.clone();
        mac.update(id.as_bytes());
        mac
    }

    fn sign(&self, id: &str) -> String {
        hex::encode(self.mac(id).finalize().into_bytes())
    }

    /// Returns the session id when the signature checks out. The comparison
    /// is constant-time.
    fn verify<'a>(&self, cookie: &'a str) -> Option<&'a str> {
        let (id, signature) = cookie.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        self.mac(id).verify_slice(&signature).ok()?;
        Some(id)
    }

    fn cookie(&self, id: &str, secure: bool) -> String {
        let mut cookie = format!(
            "{}={}.{}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.cookie_name,
            id,
            self.sign(id),
            self.max_age
        );
        if secure && self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn expired_cookie(&self) -> String {
        format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", self.cookie_name)
    }

    async fn resume(&self, req: &Request) -> Session {
        let existing = req.cookie(&self.cookie_name).and_then(|c| self.verify(c));
        if let Some(id) = existing {
            match self.store.load(id).await {
                Ok(Some(data)) => return Session::new(id.to_owned(), data, false),
                Ok(None) => debug!("session expired, issuing a new one"),
                Err(e) => warn!("session load failed, issuing a new one: {e}"),
            }
        }
        Session::new(nanoid::nanoid!(), SessionData::new(), true)
    }

    async fn handle(&self, mut req: Request, next: Next) -> Response {
        let session = self.resume(&req).await;
        let secure = req.is_secure(self.trust_proxy);
        req.extensions_mut().insert(session.clone());

        let mut res = next.run(req).await;

        let (id, data, is_new, modified, destroyed) = {
            let inner = session.inner.lock();
            (inner.id.clone(), inner.data.clone(), inner.is_new, inner.modified, inner.destroyed)
        };
        let cookie = if destroyed {
            if let Err(e) = self.store.destroy(&id).await {
                warn!("session destroy failed: {e}");
            }
            (!is_new).then(|| self.expired_cookie())
        } else if modified {
            if let Err(e) = self.store.save(&id, data).await {
                warn!("session save failed: {e}");
            }
            Some(self.cookie(&id, secure))
        } else {
            None
        };
        if let Some(value) = cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
            res.headers_mut().append(SET_COOKIE, value);
        }
        res
    }

    /// Converts the layer into installable middleware.
    pub fn into_middleware(self) -> impl Middleware {
        let layer = Arc::new(self);
        move |req: Request, next: Next| {
            let layer = Arc::clone(&layer);
            async move { layer.handle(req, next).await }
        }
    }
}

impl std::fmt::Debug for SessionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLayer")
            .field("cookie_name", &self.cookie_name)
            .field("secure_cookies", &self.secure_cookies)
            .field("trust_proxy", &self.trust_proxy)
            .finish_non_exhaustive()
    }
}

/// Builds the session layer for `app`.
///
/// # Errors
///
/// * [`SessionConfigError::MissingSecret`] when `session.salt` is unset;
/// * [`SessionConfigError::UnsupportedProvider`] for a provider other than
///   `memory` with no injected store;
/// * [`SessionConfigError::Store`] when the store fails to connect.
pub async fn configure_sessions(
    app: &App,
    config: &SiteConfig,
    providers: &Providers,
) -> Result<SessionLayer, SessionConfigError> {
    let session = &config.session;
    let secret = session
        .salt
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or(SessionConfigError::MissingSecret)?;
    let key = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|_| SessionConfigError::MissingSecret)?;

    let store: Arc<dyn SessionStore> = match &providers.session_store {
        Some(store) => Arc::clone(store),
        None if session.provider == "memory" => {
            Arc::new(MemoryStore::new(Duration::from_secs(session.max_age_seconds)))
        }
        None => {
            return Err(SessionConfigError::UnsupportedProvider {
                provider: session.provider.clone(),
            });
        }
    };
    store.connect().await?;

    debug!(provider = %session.provider, trust_proxy = app.settings().trust_proxy, "sessions configured");

    Ok(SessionLayer {
        store,
        cookie_name: session.name.clone(),
        key,
        max_age: session.max_age_seconds,
        secure_cookies: session.secure_cookies,
        trust_proxy: app.settings().trust_proxy,
    })
}
