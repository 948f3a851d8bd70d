//! # portico
//!
//! A small HTTP framework for portal-style services behind a reverse proxy,
//! plus the bootstrap pass that assembles their request pipeline.
//!
//! ## The contract
//!
//! The embedding binary loads a [`SiteConfig`], picks a
//! [`CapabilityProfile`] and calls [`bootstrap`]. The pass decides which
//! layers to install and in what order, and publishes the outcome to the
//! shared [`HealthState`] that the liveness and readiness checks read.
//!
//! - Nothing that needs a healthy boot (sessions, credentials, auth routes)
//!   is installed once an initialization error is known.
//! - Diagnostic layers (URL scrubbing, request logging, locals) are installed
//!   regardless, so a failed boot is still observable.
//! - `ready` flips to true only as the last step of a clean pass.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use portico::{App, CapabilityProfile, Method, Providers, Server, bootstrap, health};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = portico::config::load_config(None)?;
//!     let providers = Providers::default();
//!
//!     let mut app = App::new();
//!     app.route(Method::GET, "/healthz", health::liveness(providers.health.clone()));
//!     app.route(Method::GET, "/readyz", health::readiness(providers.health.clone()));
//!
//!     bootstrap(
//!         &mut app,
//!         CapabilityProfile::web_application(),
//!         &providers,
//!         &config,
//!         Path::new("dist"),
//!         false,
//!         None,
//!     )
//!     .await?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await?;
//!     Ok(())
//! }
//! ```

mod app;
mod error;
mod handler;
mod profile;
mod request;
mod response;
mod router;
mod server;

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod health;
pub mod middleware;

pub use app::{App, Installed, Pipeline, Settings};
pub use bootstrap::{Providers, bootstrap};
pub use crate::config::SiteConfig;
pub use error::{
    BoxError, CredentialConfigError, Error, InitializationError, SessionConfigError,
    SessionStoreError,
};
pub use handler::Handler;
pub use health::{HealthSnapshot, HealthState};
pub use http::{Method, StatusCode};
pub use profile::CapabilityProfile;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
