//! Layered configuration: environment variables with typed parse-or-default,
//! following the env-var-with-fallback idiom used throughout this codebase.
//! Every field has a default matching historical behavior so an operator
//! changing nothing observes the original semantics.

use delta_types::{Instrument, ParkMayCollideOverride};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP bind port.
    pub port: u16,
    /// EnvFilter directive string for tracing-subscriber.
    pub log_filter: String,
    /// Resolves SPEC_FULL.md S9's Open Question: overrides the Geometry
    /// Provider's own `parkMayCollide()` answer.
    pub park_may_collide: ParkMayCollideOverride,
    /// Instrument selected by the reference Geometry Provider when a
    /// request does not name one explicitly.
    pub default_instrument: Instrument,
    /// Whether finished command streams are written to disk (S10.5).
    pub persist_plans: bool,
    /// Directory finished plans are written into when persistence is on.
    pub persist_dir: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let park_may_collide = match std::env::var("DELTA_PARK_MAY_COLLIDE").as_deref() {
            Ok("INHERIT") => ParkMayCollideOverride::Inherit,
            Ok("FORCE_TRUE") => ParkMayCollideOverride::ForceTrue,
            _ => ParkMayCollideOverride::ForceFalse,
        };
        let default_instrument = match std::env::var("DELTA_DEFAULT_TASK_NAME") {
            Ok(name) => Instrument::from_task_name(&name),
            Err(_) => Instrument::InstrA,
        };
        Self {
            port: env_parse("PORT", 3001),
            log_filter: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "delta_service=info,delta_types=info,warn".to_string()),
            park_may_collide,
            default_instrument,
            persist_plans: env_parse("DELTA_PERSIST_PLANS", false),
            persist_dir: std::env::var("DELTA_PERSIST_DIR").unwrap_or_else(|_| "plans".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_historical_behavior() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.park_may_collide, ParkMayCollideOverride::ForceFalse);
        assert_eq!(cfg.default_instrument, Instrument::InstrA);
        assert!(!cfg.persist_plans);
    }
}
