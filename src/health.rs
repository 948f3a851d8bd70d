//! Process health record and the Kubernetes health-check handlers that read it.
//!
//! Kubernetes asks two questions. The pipeline answers them.
//!
//! | Check | Question | Backed by |
//! |---|---|---|
//! | **Liveness** | Is the process free of fatal startup defects? | `healthy` |
//! | **Readiness** | Can the pod serve traffic? | `healthy && ready` |
//!
//! The record starts `healthy = true, ready = false`. [`bootstrap`] is the
//! only writer: it clears `healthy` as soon as an initialization error is
//! known and sets `ready` as the very last step of a clean pass.
//!
//! ```rust,no_run
//! use portico::{App, HealthState, Method, health};
//!
//! let state = HealthState::new();
//! let mut app = App::new();
//! app.route(Method::GET, "/healthz", health::liveness(state.clone()));
//! app.route(Method::GET, "/readyz", health::readiness(state));
//! ```
//!
//! [`bootstrap`]: crate::bootstrap::bootstrap

use std::sync::Arc;

use http::StatusCode;
use parking_lot::RwLock;
use serde::Serialize;

use crate::handler::Handler;
use crate::request::Request;
use crate::response::Response;

/// A consistent view of both flags, taken under one lock.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub healthy: bool,
    pub ready: bool,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self { healthy: true, ready: false }
    }
}

/// Shared, thread-safe handle to the process health record.
///
/// Clones share the same record. Health checks read it concurrently while the
/// bootstrap pass writes it.
#[derive(Clone, Debug, Default)]
pub struct HealthState {
    inner: Arc<RwLock<HealthSnapshot>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        *self.inner.read()
    }

    pub fn is_healthy(&self) -> bool {
        self.inner.read().healthy
    }

    pub fn is_ready(&self) -> bool {
        self.inner.read().ready
    }

    pub(crate) fn mark_unhealthy(&self) {
        self.inner.write().healthy = false;
    }

    pub(crate) fn mark_ready(&self) {
        self.inner.write().ready = true;
    }
}

/// Liveness check: `200 ok` while healthy, `503` otherwise.
pub fn liveness(state: HealthState) -> impl Handler {
    move |_req: Request| {
        let healthy = state.is_healthy();
        async move {
            if healthy {
                Response::text("ok")
            } else {
                Response::status(StatusCode::SERVICE_UNAVAILABLE)
            }
        }
    }
}

/// Readiness check: `200 ready` only once the pipeline is fully assembled.
pub fn readiness(state: HealthState) -> impl Handler {
    move |_req: Request| {
        let snapshot = state.snapshot();
        async move {
            if snapshot.healthy && snapshot.ready {
                Response::text("ready")
            } else {
                Response::status(StatusCode::SERVICE_UNAVAILABLE)
            }
        }
    }
}
