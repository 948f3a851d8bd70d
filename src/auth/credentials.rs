//! Credential-provider wiring.
//!
//! Turns the `authentication` section into a ready-to-use [`CredentialHandle`]
//! and installs the layer that exposes the signed-in [`Identity`] to
//! everything after it. The provider protocol itself (token exchange, profile
//! lookup) belongs to the provider collaborator; this module only validates
//! settings and builds URLs.

use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::App;
use crate::auth::session::Session;
use crate::config::{AuthenticationScheme, SiteConfig};
use crate::error::CredentialConfigError;
use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

/// Session key holding the signed-in [`Identity`].
pub const IDENTITY_KEY: &str = "auth.identity";

const GITHUB_AUTHORIZE: &str = "https://github.com/login/oauth/authorize";
const AAD_AUTHORITY: &str = "https://login.microsoftonline.com";

/// The signed-in user, as stored in the session by the provider collaborator.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Identity {
    pub provider: String,
    pub id: String,
    pub username: String,
}

/// Validated provider settings, shared with the auth routes.
#[derive(Clone, Debug)]
pub struct CredentialHandle {
    scheme: AuthenticationScheme,
    client_id: String,
    authorize_url: Url,
    callback_url: Url,
    scope: Option<&'static str>,
}

impl CredentialHandle {
    pub fn scheme(&self) -> AuthenticationScheme {
        self.scheme
    }

    pub fn callback_url(&self) -> &Url {
        &self.callback_url
    }

    /// Path of the sign-in start route, e.g. `/auth/github`.
    pub fn start_path(&self) -> String {
        format!("/auth/{}", self.scheme.as_str())
    }

    /// Path of the provider callback route. Taken from the configured
    /// callback URL so the two can never disagree.
    pub fn callback_path(&self) -> String {
        self.callback_url.path().to_owned()
    }

    /// Provider authorization URL for one sign-in attempt.
    pub fn authorize_url(&self, state: &str) -> Url {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", self.callback_url.as_str())
                .append_pair("response_type", "code")
                .append_pair("state", state);
            if let Some(scope) = self.scope {
                query.append_pair("scope", scope);
            }
        }
        url
    }
}

fn required(
    scheme: AuthenticationScheme,
    field: &'static str,
    value: &str,
) -> Result<(), CredentialConfigError> {
    if value.trim().is_empty() {
        return Err(CredentialConfigError::MissingField { scheme: scheme.as_str(), field });
    }
    Ok(())
}

fn parse_url(what: &'static str, raw: &str) -> Result<Url, CredentialConfigError> {
    Url::parse(raw).map_err(|source| CredentialConfigError::InvalidUrl {
        what,
        url: raw.to_owned(),
        source,
    })
}

/// Paths the auth routes claim for themselves.
const RESERVED_PATHS: &[&str] = &["/signin", "/signout"];

/// The callback path becomes a literal route (`Url` percent-encodes braces),
/// so it only has to stay clear of every other literal route that will exist.
fn check_callback_path(
    app: &App,
    config: &SiteConfig,
    handle: &CredentialHandle,
) -> Result<(), CredentialConfigError> {
    let path = handle.callback_path();
    let onboarding = !config.github.organizations.onboarding.is_empty() && path == "/onboarding";
    let reason = if RESERVED_PATHS.contains(&path.as_str()) || path == handle.start_path() {
        Some("collides with another sign-in route")
    } else if onboarding || app.has_route(&Method::GET, &path) {
        Some("is already routed")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(CredentialConfigError::CallbackPath { path, reason }),
        None => Ok(()),
    }
}

fn handle_for(config: &SiteConfig) -> Result<CredentialHandle, CredentialConfigError> {
    let scheme = config.authentication.scheme;
    match scheme {
        AuthenticationScheme::Github => {
            let oauth = config.github.oauth2.as_ref().ok_or(
                CredentialConfigError::MissingProvider { scheme: "github", section: "github.oauth2" },
            )?;
            required(scheme, "github.oauth2.client_id", &oauth.client_id)?;
            required(scheme, "github.oauth2.client_secret", &oauth.client_secret)?;
            Ok(CredentialHandle {
                scheme,
                client_id: oauth.client_id.clone(),
                authorize_url: parse_url("authorize", GITHUB_AUTHORIZE)?,
                callback_url: parse_url("callback", &oauth.callback_url)?,
                scope: None,
            })
        }
        AuthenticationScheme::Aad => {
            let aad = config.active_directory.as_ref().ok_or(
                CredentialConfigError::MissingProvider { scheme: "aad", section: "active_directory" },
            )?;
            required(scheme, "active_directory.tenant_id", &aad.tenant_id)?;
            required(scheme, "active_directory.client_id", &aad.client_id)?;
            required(scheme, "active_directory.client_secret", &aad.client_secret)?;
            let authorize = format!("{AAD_AUTHORITY}/{}/oauth2/v2.0/authorize", aad.tenant_id);
            Ok(CredentialHandle {
                scheme,
                client_id: aad.client_id.clone(),
                authorize_url: parse_url("authorize", &authorize)?,
                callback_url: parse_url("redirect", &aad.redirect_url)?,
                scope: Some("openid profile email"),
            })
        }
    }
}

/// Resolves the signed-in [`Identity`] from the session.
async fn credentials(mut req: Request, next: Next) -> Response {
    let identity = req
        .extensions()
        .get::<Session>()
        .and_then(|session| session.get::<Identity>(IDENTITY_KEY));
    if let Some(identity) = identity {
        req.extensions_mut().insert(identity);
    }
    next.run(req).await
}

/// Validates the provider settings and installs the `credentials` layer.
///
/// Must run after the session layer is installed; the layer reads the
/// session it creates.
///
/// # Errors
///
/// Returns [`CredentialConfigError`] when the provider section is missing or
/// malformed. Nothing is installed in that case.
pub fn configure_credentials(
    app: &mut App,
    config: &SiteConfig,
) -> Result<CredentialHandle, CredentialConfigError> {
    let handle = handle_for(config)?;
    check_callback_path(app, config, &handle)?;
    app.use_layer("credentials", credentials);
    Ok(handle)
}
