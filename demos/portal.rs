//! A portal front end assembled by the bootstrap pass.
//!
//! Run with:
//!   PORTICO__SESSION__SALT=dev RUST_LOG=portico=debug,info cargo run --example portal -- portico.toml
//!
//! Try:
//!   curl -i http://localhost:3000/healthz
//!   curl -i http://localhost:3000/readyz
//!   curl -i http://localhost:3000/api/health
//!   curl -i http://localhost:3000/signin

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use portico::config::load_config;
use portico::{App, CapabilityProfile, InitializationError, Method, Providers, Server, bootstrap, health};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let (config, startup_error) = match load_config(path.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (Default::default(), Some(InitializationError::startup(e))),
    };

    let providers = Providers::default();
    let mut app = App::new();
    app.route(Method::GET, "/healthz", health::liveness(providers.health.clone()));
    app.route(Method::GET, "/readyz", health::readiness(providers.health.clone()));

    let dirname = std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
    let result = bootstrap(
        &mut app,
        CapabilityProfile::web_application(),
        &providers,
        &config,
        &dirname,
        false,
        startup_error,
    )
    .await;

    // Keep serving on a failed boot so the health checks can report it.
    if let Err(e) = &result {
        error!("initialization failed: {e}");
    }
    for entry in app.installed() {
        info!("{entry}");
    }

    let addr = std::net::SocketAddr::new(config.web_server.address, config.web_server.port);
    match Server::from_addr(addr).serve(app).await {
        Ok(()) if result.is_ok() => ExitCode::SUCCESS,
        Ok(()) => ExitCode::FAILURE,
        Err(e) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}
