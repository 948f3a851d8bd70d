//! Site configuration.
//!
//! Loaded once before the pipeline is assembled and never mutated by it.
//! [`load_config`] layers a configuration file under `PORTICO__`-prefixed
//! environment overrides; nested keys use a double underscore
//! (`PORTICO__NODE__IS_PRODUCTION=true` maps to `node.is_production`).

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File};
use serde::Deserialize;
use tracing::info;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "PORTICO";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration from `{path}`: {source}")]
    Load { path: PathBuf, source: ::config::ConfigError },
}

/// Top-level configuration. Every section has defaults, so an empty file is
/// a valid (development) configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Overrides the directory views and public assets are resolved from.
    pub app_directory: Option<PathBuf>,
    pub brand: BrandConfig,
    pub node: NodeConfig,
    pub containers: ContainersConfig,
    pub web_server: WebServerConfig,
    pub views: ViewsConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub authentication: AuthenticationConfig,
    pub github: GitHubConfig,
    pub active_directory: Option<ActiveDirectoryConfig>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BrandConfig {
    pub company_name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub is_production: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContainersConfig {
    /// Running behind a reverse proxy / ingress.
    pub deployment: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WebServerConfig {
    pub address: IpAddr,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    pub engine: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Build output of a React client app served from `/`.
    pub react_app_directory: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit one event per request from the request logger.
    pub requests: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `memory`, or the name of an injected store.
    pub provider: String,
    /// Cookie name.
    pub name: String,
    /// Secret used to sign session cookies. Required when sessions are enabled.
    pub salt: Option<String>,
    pub max_age_seconds: u64,
    /// Mark the cookie `Secure` when the request arrived over HTTPS.
    pub secure_cookies: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationScheme {
    #[default]
    Github,
    Aad,
}

impl AuthenticationScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Aad => "aad",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthenticationConfig {
    pub scheme: AuthenticationScheme,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub oauth2: Option<OAuth2Config>,
    pub codespaces: CodespacesConfig,
    pub organizations: OrganizationsConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActiveDirectoryConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CodespacesConfig {
    /// A dev container is attached and forwarding ports.
    pub connected: bool,
    pub name: Option<String>,
    pub port_forwarding_domain: String,
    pub port: u16,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OrganizationsConfig {
    /// Organizations that are still being onboarded.
    pub onboarding: Vec<OnboardingOrganization>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OnboardingOrganization {
    pub name: String,
    pub id: Option<u64>,
}

// --- Default ---

impl Default for BrandConfig {
    fn default() -> Self {
        Self { company_name: "Portal".to_owned() }
    }
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 3000 }
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self { engine: "html".to_owned() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { requests: true }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_owned(),
            name: "portico.sid".to_owned(),
            salt: None,
            max_age_seconds: 60 * 60 * 24,
            secure_cookies: true,
        }
    }
}

impl Default for CodespacesConfig {
    fn default() -> Self {
        Self {
            connected: false,
            name: None,
            port_forwarding_domain: "app.github.dev".to_owned(),
            port: 3000,
        }
    }
}

/// Loads [`SiteConfig`] from `path` (default `portico`, any extension the
/// `config` crate understands) with environment overrides on top.
///
/// # Errors
///
/// Returns an error when the file is missing or does not match the schema.
pub fn load_config(path: Option<&Path>) -> Result<SiteConfig, ConfigError> {
    let path = path.map_or_else(|| PathBuf::from("portico"), Path::to_path_buf);

    info!("loading config from {}", path.display());

    Config::builder()
        .add_source(File::from(path.as_path()).required(true))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|source| ConfigError::Load { path, source })
}
