//! HTTP route modules. `router()` composes the nested route set per spec.md
//! §6; auth gating is a collaborator concern left to the deployment (a
//! reverse proxy or a middleware layer added at the call site), so these
//! routers are mounted without an auth `route_layer`, see the `// TODO`
//! in `crate::main`.

pub mod credentials;
pub mod jobs;
pub mod schedules;
pub mod snapshots;
pub mod sources;
pub mod tenants;
pub mod workers_internal;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(tenants::router())
        .merge(credentials::router())
        .merge(sources::router())
        .merge(jobs::router())
        .merge(snapshots::router())
        .merge(schedules::router())
}

pub fn internal_router() -> Router<Arc<AppState>> {
    workers_internal::router()
}
