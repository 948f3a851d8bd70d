//! Sessions, credential providers and the routes that depend on them.
//!
//! The bootstrap pass drives this module in a fixed order:
//! [`configure_sessions`] (async) → [`configure_credentials`] (sync) →
//! [`mount_auth_routes`] / [`onboard`]. A failure in either of the first two
//! becomes the pass's initialization error and the routes are never mounted.

mod credentials;
mod onboarding;
mod routes;
mod session;

pub use credentials::{CredentialHandle, IDENTITY_KEY, Identity, configure_credentials};
pub use onboarding::onboard;
pub use routes::{CODE_KEY, RETURN_TO_KEY, STATE_KEY, mount_auth_routes};
pub use session::{
    MemoryStore, Session, SessionData, SessionLayer, SessionStore, StoreFuture, configure_sessions,
};
