//! Onboarding helper for organizations that are not fully set up yet.
//!
//! Signed-in users can list the organizations being onboarded and look one
//! up. Anonymous callers are sent through sign-in first.

use std::sync::Arc;

use http::{Method, StatusCode};
use serde_json::json;
use tracing::debug;

use crate::app::App;
use crate::auth::credentials::Identity;
use crate::config::{OnboardingOrganization, SiteConfig};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

fn sign_in_first(req: &Request) -> Response {
    let return_to: String =
        url::form_urlencoded::byte_serialize(req.path().as_bytes()).collect();
    Response::redirect(&format!("/signin?return_to={return_to}"))
}

pub fn onboard(app: &mut App, config: &SiteConfig) {
    let organizations: Arc<[OnboardingOrganization]> =
        config.github.organizations.onboarding.clone().into();
    debug!(count = organizations.len(), "onboarding helper loaded");

    let listed = Arc::clone(&organizations);
    app.route(Method::GET, "/onboarding", move |req: Request| {
        let names: Vec<String> = listed.iter().map(|o| o.name.clone()).collect();
        async move {
            if req.extensions().get::<Identity>().is_none() {
                return sign_in_first(&req);
            }
            json!({ "organizations": names }).into_response()
        }
    });

    app.route(Method::GET, "/onboarding/{org}", move |req: Request| {
        let organizations = Arc::clone(&organizations);
        async move {
            if req.extensions().get::<Identity>().is_none() {
                return sign_in_first(&req);
            }
            let wanted = req.param("org").unwrap_or_default();
            match organizations.iter().find(|o| o.name.eq_ignore_ascii_case(wanted)) {
                Some(org) => json!({ "name": org.name, "id": org.id, "onboarding": true })
                    .into_response(),
                None => Response::status(StatusCode::NOT_FOUND),
            }
        }
    });
}
