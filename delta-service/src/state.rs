//! Shared application state (SPEC_FULL.md S5, S6.1): the service-wide
//! configuration and the audit log. The Geometry Provider itself is not
//! held here — S5 requires each plan to own its provider instance for
//! the exclusive duration of one validation or sequencing call, and each
//! request's field carries its own pivot/fiducial count, so handlers
//! construct a fresh `ReferenceGeometry` per request rather than share
//! one sized for whichever request happened to arrive first.

use std::sync::Arc;
use std::time::Instant;

use crate::audit::AuditLog;
use crate::config::ServiceConfig;

pub struct AppState {
    pub config: ServiceConfig,
    pub audit: AuditLog,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Arc<Self> {
        Arc::new(Self {
            audit: AuditLog::new(),
            started_at: Instant::now(),
            config,
        })
    }
}
