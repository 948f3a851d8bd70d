//! The bootstrap pass: installs the request pipeline onto an [`App`].
//!
//! One forward pass, in program order. Which layers are installed depends on
//! the [`CapabilityProfile`], the [`SiteConfig`] and whether an
//! initialization error is already known. The error is threaded through the
//! pass as a plain `Result`: steps that depend on a healthy boot check it,
//! diagnostic layers do not, and at the end it is handed back unchanged.
//!
//! ```text
//!  web only ─┬─ views, favicon
//!            ├─ raw-body, json-body, urlencoded-body
//!            ├─ compression
//!            ├─ dev-assistant            (dev + codespace attached)
//!            ├─ static assets, campaign
//!            ├─ trust proxy, /api,       (no error yet)
//!            │  session → credentials
//!            ├─ scrubbed-url, request-logger, locals
//!            └─ auth routes, onboarding, (no error yet)
//!               office-hyperlinks
//!  always ───── health: unhealthy on error, otherwise ready
//! ```
//!
//! The pass is single-shot. Running it twice on the same app is not
//! supported.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::api;
use crate::app::App;
use crate::auth::{self, CredentialHandle, SessionStore};
use crate::config::SiteConfig;
use crate::error::InitializationError;
use crate::health::HealthState;
use crate::middleware::{
    body, campaign, compression, dev_assistant, favicon, locals, logger, office_hyperlinks,
    scrubbed_url, static_files,
};
use crate::profile::CapabilityProfile;

/// Shared services the pass reads from and writes to.
#[derive(Clone, Default)]
pub struct Providers {
    /// Process health record published to the health checks.
    pub health: HealthState,
    /// Session backend. When unset, `session.provider = "memory"` gets the
    /// in-process store.
    pub session_store: Option<Arc<dyn SessionStore>>,
}

impl Providers {
    pub fn new(health: HealthState) -> Self {
        Self { health, session_store: None }
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers")
            .field("health", &self.health.snapshot())
            .field("session_store", &self.session_store.is_some())
            .finish()
    }
}

/// Directory views and public assets are resolved from: the configured
/// override, or `dirname` with a trailing `dist` component stripped.
pub fn app_directory(config: &SiteConfig, dirname: &Path) -> PathBuf {
    if let Some(dir) = &config.app_directory {
        return dir.clone();
    }
    match dirname.file_name() {
        Some(name) if name == "dist" => dirname.parent().unwrap_or(dirname).to_path_buf(),
        _ => dirname.to_path_buf(),
    }
}

/// Installs the request pipeline onto `app`.
///
/// `initialization_error` carries a failure from an earlier startup phase.
/// When present, the pass still installs the diagnostic layers but skips
/// everything that needs a healthy boot.
///
/// # Errors
///
/// Returns the initialization error, either the one passed in or the one
/// raised while configuring sessions or credentials. `healthy` has already
/// been cleared in the health record when this returns `Err`; deciding
/// whether to abort is up to the caller.
pub async fn bootstrap(
    app: &mut App,
    profile: CapabilityProfile,
    providers: &Providers,
    config: &SiteConfig,
    dirname: &Path,
    has_custom_routes: bool,
    initialization_error: Option<InitializationError>,
) -> Result<(), InitializationError> {
    let health = &providers.health;
    let mut outcome = initialization_error.map_or(Ok(()), Err);
    if outcome.is_err() {
        health.mark_unhealthy();
    }

    if profile.serves_web() {
        let app_dir = app_directory(config, dirname);
        let public_dir = app_dir.join("public");
        let production = config.node.is_production;

        app.set("views", |s| s.views = Some(app_dir.join("views")));
        app.set("view engine", |s| s.view_engine = Some(config.views.engine.clone()));
        app.set("view cache", |s| s.view_cache = production);
        app.set("x-powered-by", |s| s.x_powered_by = false);
        app.use_layer("favicon", favicon::favicon(&public_dir));

        app.use_layer("raw-body", body::raw_body);
        app.use_layer("json-body", body::json);
        app.use_layer("urlencoded-body", body::urlencoded);
        app.use_layer("compression", compression::compression);

        if !production && config.github.codespaces.connected {
            app.use_layer("dev-assistant", dev_assistant::dev_assistant(&config.github.codespaces));
        }

        if profile.serves_static_assets() {
            app.use_layer("static-site-assets", static_files::serve_dir(&public_dir, "/"));
        }
        if let Some(react_dir) = &config.client.react_app_directory {
            app.use_layer("static-react-client-app", static_files::serve_dir(react_dir, "/"));
        }
        if profile.serves_client_assets() {
            app.mount(
                "/client",
                "static-client-app",
                static_files::serve_dir(app_dir.join("client"), "/client"),
            );
        }
        app.use_layer("campaign", campaign::campaign);

        let mut credentials = None;
        if outcome.is_ok() {
            if config.containers.deployment {
                app.enable_trust_proxy();
                debug!("proxy: trusting reverse proxy");
            }
            if !has_custom_routes {
                app.mount_router(api::PREFIX, "api", api::router(health.clone()));
            }
            if profile.maintains_sessions() {
                outcome = configure_auth(app, config, providers).await.map(|handle| {
                    credentials = Some(handle);
                });
            }
        }

        app.use_layer("scrubbed-url", scrubbed_url::scrubbed_url);
        app.use_layer("request-logger", logger::request_logger(&config.logging));
        app.use_layer("locals", locals::locals(config));

        if outcome.is_ok() {
            if let Some(handle) = &credentials {
                auth::mount_auth_routes(app, handle);
                if !config.github.organizations.onboarding.is_empty() {
                    auth::onboard(app, config);
                }
            }
            app.use_layer("office-hyperlinks", office_hyperlinks::office_hyperlinks);
        }
    }

    match outcome {
        Err(e) => {
            health.mark_unhealthy();
            Err(e)
        }
        Ok(()) => {
            if profile.serves_web() {
                health.mark_ready();
            }
            Ok(())
        }
    }
}

/// Session layer first, then the credential provider that reads it.
async fn configure_auth(
    app: &mut App,
    config: &SiteConfig,
    providers: &Providers,
) -> Result<CredentialHandle, InitializationError> {
    let sessions = auth::configure_sessions(app, config, providers).await?;
    app.use_layer("session", sessions.into_middleware());
    Ok(auth::configure_credentials(app, config)?)
}
