//! Sign-in and sign-out routes.

use http::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};
use url::{Position, Url};

use crate::app::App;
use crate::auth::credentials::{CredentialHandle, IDENTITY_KEY};
use crate::auth::session::Session;
use crate::request::Request;
use crate::response::Response;

/// Session key for the anti-forgery `state` of a sign-in attempt.
pub const STATE_KEY: &str = "auth.state";
/// Session key the authorization code is handed over in.
pub const CODE_KEY: &str = "auth.code";
/// Session key for where to return after sign-in.
pub const RETURN_TO_KEY: &str = "auth.return_to";

/// Placeholder origin `return_to` values are resolved against. Anything that
/// resolves to another origin is not a local path.
const LOCAL_ORIGIN: &str = "http://portico.invalid/";

/// Normalizes `raw` into a same-origin path (`/path?query#fragment`), or
/// `None` when a browser would leave the site following it.
fn local_return_path(raw: &str) -> Option<String> {
    if !raw.starts_with('/') {
        return None;
    }
    let base = Url::parse(LOCAL_ORIGIN).ok()?;
    let resolved = base.join(raw).ok()?;
    (resolved.origin() == base.origin()).then(|| resolved[Position::BeforePath..].to_owned())
}

fn session(req: &Request) -> Option<&Session> {
    req.extensions().get::<Session>()
}

/// Inserts into the session, logging a warning when the value is rejected.
fn remember<T: Serialize>(session: &Session, key: &str, value: T) -> bool {
    match session.insert(key, value) {
        Ok(()) => true,
        Err(e) => {
            warn!(key, "could not store session value: {e}");
            false
        }
    }
}

/// Mounts `/signin`, `/signout`, the provider start route and its callback.
pub fn mount_auth_routes(app: &mut App, handle: &CredentialHandle) {
    let start = handle.start_path();

    let target = start.clone();
    app.route(Method::GET, "/signin", move |req: Request| {
        let target = target.clone();
        async move {
            if let (Some(session), Some(raw)) = (session(&req), req.query_value("return_to")) {
                match local_return_path(&raw) {
                    Some(return_to) => {
                        remember(session, RETURN_TO_KEY, return_to);
                    }
                    None => debug!("ignoring off-site return_to"),
                }
            }
            Response::redirect(&target)
        }
    });

    let provider = handle.clone();
    app.route(Method::GET, &start, move |req: Request| {
        let provider = provider.clone();
        async move {
            let Some(session) = session(&req) else {
                return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
            };
            let state = nanoid::nanoid!();
            if !remember(session, STATE_KEY, &state) {
                return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
            }
            Response::redirect(provider.authorize_url(&state).as_str())
        }
    });

    app.route(Method::GET, &handle.callback_path(), |req: Request| async move {
        let Some(session) = session(&req) else {
            return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
        };
        let expected = session.remove(STATE_KEY).and_then(|v| v.as_str().map(str::to_owned));
        let (state, code) = (req.query_value("state"), req.query_value("code"));
        match (expected, state, code) {
            (Some(expected), Some(state), Some(code)) if expected == state => {
                if !remember(session, CODE_KEY, code) {
                    return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
                }
                let return_to = session
                    .remove(RETURN_TO_KEY)
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_else(|| "/".to_owned());
                Response::redirect(&return_to)
            }
            _ => Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .text("sign-in could not be verified, please try again"),
        }
    });

    app.route(Method::GET, "/signout", |req: Request| async move {
        if let Some(session) = session(&req) {
            session.remove(IDENTITY_KEY);
            session.destroy();
        }
        Response::redirect("/")
    });
}
