use std::path::Path;
use std::sync::Arc;

use portico::auth::{SessionData, SessionStore, StoreFuture};
use portico::config::{OAuth2Config, OnboardingOrganization};
use portico::{
    App, CapabilityProfile, CredentialConfigError, HealthSnapshot, InitializationError, Installed,
    Method, Providers, Request, SessionConfigError, SessionStoreError, SiteConfig, StatusCode,
    bootstrap, health,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

/// A store whose backend is never reachable.
struct Unreachable;

impl SessionStore for Unreachable {
    fn connect(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Err(SessionStoreError::Unavailable("connection refused".to_owned())) })
    }
    fn load<'a>(&'a self, _id: &'a str) -> StoreFuture<'a, Option<SessionData>> {
        Box::pin(async { Ok(None) })
    }
    fn save<'a>(&'a self, _id: &'a str, _data: SessionData) -> StoreFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
    fn destroy<'a>(&'a self, _id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[fixture]
fn site() -> TempDir {
    tempfile::tempdir().unwrap()
}

#[fixture]
fn config() -> SiteConfig {
    let mut config = SiteConfig::default();
    config.session.salt = Some("integration".to_owned());
    config.github.oauth2 = Some(OAuth2Config {
        client_id: "client".to_owned(),
        client_secret: "secret".to_owned(),
        callback_url: "http://localhost:3000/auth/github/callback".to_owned(),
    });
    config
}

fn startup_error() -> InitializationError {
    InitializationError::startup("database migrations failed")
}

async fn run(
    app: &mut App,
    profile: CapabilityProfile,
    providers: &Providers,
    config: &SiteConfig,
    dirname: &Path,
    has_custom_routes: bool,
    error: Option<InitializationError>,
) -> Result<(), InitializationError> {
    bootstrap(app, profile, providers, config, dirname, has_custom_routes, error).await
}

fn state_of(location: &str) -> String {
    let url = url::Url::parse(location).unwrap();
    url.query_pairs().find(|(k, _)| k == "state").map(|(_, v)| v.into_owned()).unwrap()
}

fn position(app: &App, entry: &Installed) -> Option<usize> {
    app.installed().iter().position(|e| e == entry)
}

#[rstest]
#[case::clean(None)]
#[case::failed(Some(startup_error()))]
#[tokio::test]
async fn non_web_profile_installs_nothing(
    site: TempDir,
    config: SiteConfig,
    #[case] error: Option<InitializationError>,
) {
    let failed = error.is_some();
    let providers = Providers::default();
    let mut app = App::new();
    let profile = CapabilityProfile::web_application().with_web(false);

    let result = run(&mut app, profile, &providers, &config, site.path(), false, error).await;

    assert!(app.installed().is_empty());
    assert_eq!(result.is_err(), failed);
    let expected = HealthSnapshot { healthy: !failed, ready: false };
    assert_eq!(providers.health.snapshot(), expected);
}

#[rstest]
#[tokio::test]
async fn error_at_entry_is_returned_and_skips_auth(site: TempDir, config: SiteConfig) {
    let providers = Providers::default();
    let mut app = App::new();

    let err = run(
        &mut app,
        CapabilityProfile::web_application(),
        &providers,
        &config,
        site.path(),
        false,
        Some(startup_error()),
    )
    .await
    .unwrap_err();

    assert_eq!(err.to_string(), "database migrations failed");
    assert_eq!(providers.health.snapshot(), HealthSnapshot { healthy: false, ready: false });
    for skipped in ["session", "credentials", "api", "office-hyperlinks"] {
        assert!(!app.has_layer(skipped), "{skipped} should not be installed");
    }
    assert!(!app.has_route(&Method::GET, "/signin"));
    assert!(!app.installed().contains(&Installed::Setting("trust proxy")));
    for diagnostic in ["scrubbed-url", "request-logger", "locals"] {
        assert!(app.has_layer(diagnostic), "{diagnostic} should be installed");
    }
}

#[rstest]
#[case::with_sessions(true)]
#[case::without_sessions(false)]
#[tokio::test]
async fn custom_routes_suppress_the_api_mount(
    site: TempDir,
    config: SiteConfig,
    #[case] sessions: bool,
) {
    let providers = Providers::default();
    let mut app = App::new();
    let profile = CapabilityProfile::web_application().with_sessions(sessions);

    run(&mut app, profile, &providers, &config, site.path(), true, None).await.unwrap();

    assert!(!app.has_layer("api"));
    let res = app.build().handle(Request::new(Method::GET, "/api/health")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn trust_proxy_precedes_the_session_layer(site: TempDir, mut config: SiteConfig) {
    config.containers.deployment = true;
    let providers = Providers::default();
    let mut app = App::new();

    run(&mut app, CapabilityProfile::web_application(), &providers, &config, site.path(), false, None)
        .await
        .unwrap();

    let proxy = position(&app, &Installed::Setting("trust proxy")).unwrap();
    let session = position(&app, &Installed::Layer("session")).unwrap();
    let credentials = position(&app, &Installed::Layer("credentials")).unwrap();
    assert!(proxy < session);
    assert!(session < credentials);
    assert!(app.settings().trust_proxy);
}

#[rstest]
#[tokio::test]
async fn layers_follow_the_documented_order(site: TempDir, mut config: SiteConfig) {
    config.github.organizations.onboarding =
        vec![OnboardingOrganization { name: "contoso".to_owned(), id: Some(7) }];
    let providers = Providers::default();
    let mut app = App::new();

    run(&mut app, CapabilityProfile::web_application(), &providers, &config, site.path(), false, None)
        .await
        .unwrap();

    assert_eq!(
        app.layer_names(),
        [
            "favicon",
            "raw-body",
            "json-body",
            "urlencoded-body",
            "compression",
            "static-site-assets",
            "static-client-app",
            "campaign",
            "api",
            "session",
            "credentials",
            "scrubbed-url",
            "request-logger",
            "locals",
            "office-hyperlinks",
        ]
    );
    assert!(app.has_route(&Method::GET, "/onboarding/{org}"));
    assert!(!app.settings().x_powered_by);
}

#[rstest]
#[tokio::test]
async fn clean_pass_is_ready_and_serves(site: TempDir, config: SiteConfig) {
    let providers = Providers::default();
    let mut app = App::new();
    app.route(Method::GET, "/readyz", health::readiness(providers.health.clone()));

    run(&mut app, CapabilityProfile::web_application(), &providers, &config, site.path(), false, None)
        .await
        .unwrap();
    assert_eq!(providers.health.snapshot(), HealthSnapshot { healthy: true, ready: true });
    assert!(!app.has_route(&Method::GET, "/onboarding"));

    let pipeline = app.build();
    let ready = pipeline.handle(Request::new(Method::GET, "/readyz")).await;
    assert_eq!(ready.status_code(), StatusCode::OK);

    let api = pipeline.handle(Request::new(Method::GET, "/api/health")).await;
    let body: serde_json::Value = serde_json::from_slice(api.body()).unwrap();
    assert_eq!(body["ready"], true);

    let signin = pipeline.handle(Request::new(Method::GET, "/signin")).await;
    assert_eq!(signin.status_code(), StatusCode::FOUND);
    assert_eq!(signin.header("location"), Some("/auth/github"));
}

#[rstest]
#[tokio::test]
async fn sign_in_round_trip_checks_state(site: TempDir, config: SiteConfig) {
    let providers = Providers::default();
    let mut app = App::new();
    run(&mut app, CapabilityProfile::web_application(), &providers, &config, site.path(), false, None)
        .await
        .unwrap();
    let pipeline = app.build();

    let start = pipeline.handle(Request::new(Method::GET, "/auth/github")).await;
    assert_eq!(start.status_code(), StatusCode::FOUND);
    let cookie = start.header("set-cookie").unwrap().split(';').next().unwrap().to_owned();
    let location = start.header("location").unwrap();
    assert!(location.starts_with("https://github.com/login/oauth/authorize?"));

    let forged = Request::new(Method::GET, "/auth/github/callback?code=abc&state=forged")
        .with_header("cookie", &cookie);
    assert_eq!(pipeline.handle(forged).await.status_code(), StatusCode::BAD_REQUEST);

    // The failed attempt consumed the state; start again.
    let start = pipeline
        .handle(Request::new(Method::GET, "/auth/github").with_header("cookie", &cookie))
        .await;
    let state = state_of(start.header("location").unwrap());

    let callback = Request::new(
        Method::GET,
        &format!("/auth/github/callback?code=abc&state={state}"),
    )
    .with_header("cookie", &cookie);
    let res = pipeline.handle(callback).await;
    assert_eq!(res.status_code(), StatusCode::FOUND);
    assert_eq!(res.header("location"), Some("/"));
}

#[rstest]
#[tokio::test]
async fn credential_failure_keeps_diagnostics(site: TempDir, mut config: SiteConfig) {
    config.github.oauth2 = None;
    let providers = Providers::default();
    let mut app = App::new();
    app.route(Method::GET, "/healthz", health::liveness(providers.health.clone()));

    let err = run(
        &mut app,
        CapabilityProfile::web_application(),
        &providers,
        &config,
        site.path(),
        false,
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, InitializationError::Credentials(_)));
    assert_eq!(providers.health.snapshot(), HealthSnapshot { healthy: false, ready: false });
    assert!(app.has_layer("session"));
    assert!(!app.has_layer("credentials"));
    assert!(!app.has_layer("office-hyperlinks"));
    assert!(!app.has_route(&Method::GET, "/signin"));

    let pipeline = app.build();
    let live = pipeline.handle(Request::new(Method::GET, "/healthz")).await;
    assert_eq!(live.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(live.header("x-correlation-id").is_some());

    let signin = pipeline.handle(Request::new(Method::GET, "/signin")).await;
    assert_eq!(signin.status_code(), StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn session_store_failure_becomes_the_error(site: TempDir, config: SiteConfig) {
    let providers = Providers::default().with_session_store(Arc::new(Unreachable));
    let mut app = App::new();

    let err = run(
        &mut app,
        CapabilityProfile::web_application(),
        &providers,
        &config,
        site.path(),
        false,
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, InitializationError::Session(SessionConfigError::Store(_))));
    assert!(!providers.health.is_healthy());
    assert!(!app.has_layer("session"));
    assert!(!app.has_layer("credentials"));
    assert!(app.has_layer("locals"));
}

#[rstest]
#[case::start_route("https://portal.example.com/auth/github")]
#[case::signin("https://portal.example.com/signin")]
#[tokio::test]
async fn colliding_callback_url_fails_the_pass(
    site: TempDir,
    mut config: SiteConfig,
    #[case] callback_url: &str,
) {
    if let Some(oauth2) = config.github.oauth2.as_mut() {
        oauth2.callback_url = callback_url.to_owned();
    }
    let providers = Providers::default();
    let mut app = App::new();

    let err = run(
        &mut app,
        CapabilityProfile::web_application(),
        &providers,
        &config,
        site.path(),
        false,
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        InitializationError::Credentials(CredentialConfigError::CallbackPath { .. })
    ));
    assert_eq!(providers.health.snapshot(), HealthSnapshot { healthy: false, ready: false });
    assert!(!app.has_layer("credentials"));
    assert!(!app.has_route(&Method::GET, "/signin"));
}

#[rstest]
#[case::local("%2Forgs%2Fcontoso%3Ftab%3Drepos", "/orgs/contoso?tab=repos")]
#[case::backslash_host("%2F%5Cevil.example", "/")]
#[case::protocol_relative("%2F%2Fevil.example", "/")]
#[tokio::test]
async fn sign_in_returns_only_to_local_paths(
    site: TempDir,
    config: SiteConfig,
    #[case] return_to: &str,
    #[case] expected: &str,
) {
    let providers = Providers::default();
    let mut app = App::new();
    run(&mut app, CapabilityProfile::web_application(), &providers, &config, site.path(), false, None)
        .await
        .unwrap();
    let pipeline = app.build();

    let first = pipeline.handle(Request::new(Method::GET, "/auth/github")).await;
    let cookie = first.header("set-cookie").unwrap().split(';').next().unwrap().to_owned();

    let signin = Request::new(Method::GET, &format!("/signin?return_to={return_to}"))
        .with_header("cookie", &cookie);
    assert_eq!(pipeline.handle(signin).await.status_code(), StatusCode::FOUND);

    let start = pipeline
        .handle(Request::new(Method::GET, "/auth/github").with_header("cookie", &cookie))
        .await;
    let state = state_of(start.header("location").unwrap());
    let callback = Request::new(
        Method::GET,
        &format!("/auth/github/callback?code=abc&state={state}"),
    )
    .with_header("cookie", &cookie);

    let res = pipeline.handle(callback).await;
    assert_eq!(res.status_code(), StatusCode::FOUND);
    assert_eq!(res.header("location"), Some(expected));
}

#[rstest]
#[case::production_attached(true, true, false)]
#[case::development_detached(false, false, false)]
#[case::development_attached(false, true, true)]
#[tokio::test]
async fn dev_assistant_only_in_attached_development(
    site: TempDir,
    mut config: SiteConfig,
    #[case] production: bool,
    #[case] connected: bool,
    #[case] installed: bool,
) {
    config.node.is_production = production;
    config.github.codespaces.connected = connected;
    config.github.codespaces.name = Some("octo-space".to_owned());
    let providers = Providers::default();
    let mut app = App::new();

    run(&mut app, CapabilityProfile::web_application(), &providers, &config, site.path(), false, None)
        .await
        .unwrap();

    assert_eq!(app.has_layer("dev-assistant"), installed);
}

#[rstest]
#[tokio::test]
async fn onboarding_needs_sessions(site: TempDir, mut config: SiteConfig) {
    config.github.organizations.onboarding =
        vec![OnboardingOrganization { name: "contoso".to_owned(), id: Some(7) }];
    let providers = Providers::default();
    let mut app = App::new();
    let profile = CapabilityProfile::web_application().with_sessions(false);

    run(&mut app, profile, &providers, &config, site.path(), false, None).await.unwrap();

    assert!(!app.has_layer("session"));
    assert!(!app.has_route(&Method::GET, "/onboarding"));
    assert!(!app.has_route(&Method::GET, "/onboarding/{org}"));
    assert_eq!(providers.health.snapshot(), HealthSnapshot { healthy: true, ready: true });
}

#[rstest]
#[tokio::test]
async fn react_client_is_served_ahead_of_the_api(site: TempDir, mut config: SiteConfig) {
    config.client.react_app_directory = Some(site.path().join("react"));
    let providers = Providers::default();
    let mut app = App::new();

    run(&mut app, CapabilityProfile::web_application(), &providers, &config, site.path(), false, None)
        .await
        .unwrap();

    let react = position(&app, &Installed::Layer("static-react-client-app")).unwrap();
    let campaign = position(&app, &Installed::Layer("campaign")).unwrap();
    let api = position(&app, &Installed::Layer("api")).unwrap();
    assert!(react < campaign);
    assert!(campaign < api);
}
