//! Per-process capability flags.
//!
//! A profile describes what this process instance is permitted to serve.
//! It is built once at startup and never changes; every installation gate in
//! [`bootstrap`](crate::bootstrap) reads it.

use serde::Deserialize;

/// Immutable set of capability flags.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CapabilityProfile {
    serves_web: bool,
    serves_static_assets: bool,
    serves_client_assets: bool,
    maintains_sessions: bool,
}

impl CapabilityProfile {
    /// A full web front end: pages, assets, client app and sessions.
    pub const fn web_application() -> Self {
        Self {
            serves_web: true,
            serves_static_assets: true,
            serves_client_assets: true,
            maintains_sessions: true,
        }
    }

    /// A process that never serves HTTP traffic (jobs, one-off tasks).
    pub const fn background_job() -> Self {
        Self {
            serves_web: false,
            serves_static_assets: false,
            serves_client_assets: false,
            maintains_sessions: false,
        }
    }

    pub const fn with_web(mut self, on: bool) -> Self {
        self.serves_web = on;
        self
    }

    pub const fn with_static_assets(mut self, on: bool) -> Self {
        self.serves_static_assets = on;
        self
    }

    pub const fn with_client_assets(mut self, on: bool) -> Self {
        self.serves_client_assets = on;
        self
    }

    pub const fn with_sessions(mut self, on: bool) -> Self {
        self.maintains_sessions = on;
        self
    }

    pub const fn serves_web(&self) -> bool { self.serves_web }
    pub const fn serves_static_assets(&self) -> bool { self.serves_static_assets }
    pub const fn serves_client_assets(&self) -> bool { self.serves_client_assets }
    pub const fn maintains_sessions(&self) -> bool { self.maintains_sessions }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_opposites() {
        let web = CapabilityProfile::web_application();
        assert!(web.serves_web() && web.maintains_sessions());
        assert_eq!(CapabilityProfile::background_job(), CapabilityProfile::default());
    }

    #[test]
    fn builders_toggle_single_flags() {
        let profile = CapabilityProfile::web_application().with_sessions(false);
        assert!(profile.serves_web());
        assert!(profile.serves_static_assets());
        assert!(!profile.maintains_sessions());
    }

    #[test]
    fn deserializes_partial_profiles() {
        let profile: CapabilityProfile =
            serde_json::from_str(r#"{ "serves_web": true }"#).unwrap();
        assert!(profile.serves_web());
        assert!(!profile.serves_client_assets());
    }
}
