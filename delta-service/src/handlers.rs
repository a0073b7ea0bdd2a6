//! HTTP handlers for the ambient surface of SPEC_FULL.md S6.1: `POST
//! /plans`, `GET /health`, `GET /version`. The planning work itself runs
//! inside `spawn_blocking` (SPEC_FULL.md S5) so the CPU-bound General/
//! Special Sequencer loop never starves the async executor.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use delta_testfield::ReferenceGeometry;
use delta_types::{DeltaError, DriverOutcome, GenerateRequest, Instrument};

use crate::audit::AuditLog;
use crate::persistence::persist_plan;
use crate::state::AppState;

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Structured error body returned for any non-2xx `/plans` response, per
/// SPEC_FULL.md S6.1.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    warnings: Vec<String>,
}

fn error_code(err: &DeltaError) -> &'static str {
    match err {
        DeltaError::InvalidArgument(_) => "INVALID_ARGUMENT",
        DeltaError::InvalidField { .. } => "INVALID_FIELD",
        DeltaError::NoSuchCommand(_) => "NO_SUCH_COMMAND",
        DeltaError::SprintfOverflow { .. } => "SPRINTF_OVERFLOW",
        DeltaError::OutOfMemory => "OUT_OF_MEMORY",
        DeltaError::CrossoverInconsistent { .. } => "CROSSOVER_INCONSISTENT",
        DeltaError::PlanStuck => "PLAN_STUCK",
        DeltaError::PlanInconsistent(_) => "PLAN_INCONSISTENT",
    }
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(err: DeltaError) -> ApiError {
    let code = error_code(&err);
    let status = match err {
        DeltaError::InvalidArgument(_) | DeltaError::InvalidField { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    ApiError {
        status,
        body: ErrorBody { code: code.to_string(), message: err.to_string(), warnings: Vec::new() },
    }
}

/// `POST /plans`: decode a GENERATE request, run the Action Driver, return
/// the finished command stream as JSON.
pub async fn create_plan(State(state): State<Arc<AppState>>, Json(request): Json<GenerateRequest>) -> Result<Json<DriverOutcome>, ApiError> {
    let plan_id = Uuid::new_v4().to_string();
    let instrument = request.name.as_deref().map(Instrument::from_task_name).unwrap_or(state.config.default_instrument);
    let num_pivots = request.field.num_pivots();
    let num_fiducials = request.field.num_fiducials();

    info!(
        instrument = ?instrument,
        pivots = num_pivots,
        fiducials = num_fiducials,
        plan_id = %plan_id,
        "accepted GENERATE request"
    );

    let park_override = state.config.park_may_collide;
    let outcome = run_plan(request, instrument, num_pivots, num_fiducials, park_override, state.audit.clone(), plan_id.clone()).await;

    match outcome {
        Ok(outcome) => {
            if state.config.persist_plans {
                persist_plan(&state.config.persist_dir, &plan_id, &outcome.stream).await;
            }
            Ok(Json(outcome))
        }
        Err(err) => {
            warn!(code = error_code(&err), "rejected GENERATE request: {err}");
            state.audit.log_plan_rejected(&format!("{instrument:?}"), error_code(&err), &err.to_string(), now_ms()).await;
            Err(api_error(err))
        }
    }
}

async fn run_plan(
    request: GenerateRequest,
    instrument: Instrument,
    num_pivots: usize,
    num_fiducials: usize,
    park_override: delta_types::ParkMayCollideOverride,
    audit: AuditLog,
    plan_id: String,
) -> Result<DriverOutcome, DeltaError> {
    let result = tokio::task::spawn_blocking(move || {
        let mut geometry = ReferenceGeometry::new(num_pivots, num_fiducials, instrument);
        delta_types::generate(&request, &mut geometry, park_override)
    })
    .await
    .map_err(|e| DeltaError::InvalidArgument(format!("plan {plan_id} task join failure: {e}")))?;

    if let Ok(ref outcome) = result {
        audit.log_plan_accepted(&format!("{instrument:?}"), num_pivots, num_fiducials, outcome.stream.num_moves, outcome.stream.num_parks, now_ms()).await;
    }

    result
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthBody {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

/// `GET /health`: liveness/readiness probe (SPEC_FULL.md S6.1).
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthBody> {
    Json(HealthBody { status: "ok", version: env!("CARGO_PKG_VERSION"), uptime_secs: state.started_at.elapsed().as_secs() })
}

/// `GET /version`: equivalent of `ENQ_VER_NUM`/`ENQ_VER_DATE`/`ENQ_DEV_DESCR`
/// as JSON, since parameter publication itself is out of scope (SPEC_FULL.md
/// S1, S6.1).
pub async fn version() -> Json<serde_json::Value> {
    Json(json!({
        "enqVerNum": env!("CARGO_PKG_VERSION"),
        "enqVerDate": option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"),
        "enqDevDescr": "fibre-positioner delta planner",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use axum::extract::State as StateExtractor;
    use delta_testfield::scenarios;

    #[test]
    fn error_codes_match_taxonomy() {
        assert_eq!(error_code(&DeltaError::PlanStuck), "PLAN_STUCK");
        assert_eq!(error_code(&DeltaError::InvalidArgument("x".into())), "INVALID_ARGUMENT");
        assert_eq!(error_code(&DeltaError::InvalidField { error_count: 2 }), "INVALID_FIELD");
    }

    fn request(field: delta_types::FieldData, flags: &[&str]) -> GenerateRequest {
        GenerateRequest {
            max_fib_ext: 0,
            max_but_ang_g: std::f64::consts::PI,
            max_piv_ang_g: std::f64::consts::PI,
            max_but_ang_o: std::f64::consts::PI,
            max_piv_ang_o: std::f64::consts::PI,
            but_clear_g: 0,
            fib_clear_g: 0,
            but_clear_o: 0,
            fib_clear_o: 0,
            flags: flags.iter().map(|s| s.to_string()).collect(),
            name: Some("TEST".to_string()),
            ext_spring_out: None,
            field,
        }
    }

    /// SPEC_FULL.md S8 scenario 7: a `POST /plans` body equivalent to
    /// scenario 2 returns a single `MF` record.
    #[tokio::test]
    async fn scenario_7_http_round_trip_returns_one_move() {
        let state = AppState::new(ServiceConfig::default());
        let req = request(scenarios::single_direct_move(), &[]);
        let Json(outcome) = create_plan(StateExtractor(state), Json(req)).await.unwrap();
        assert_eq!(outcome.stream.num_moves, 1);
        assert_eq!(outcome.stream.lines.len(), 1);
    }

    /// SPEC_FULL.md S8 scenario 8: a body equivalent to scenario 4 returns
    /// a structured error whose code is `INVALID_FIELD`.
    #[tokio::test]
    async fn scenario_8_invalid_field_over_http() {
        let state = AppState::new(ServiceConfig::default());
        let req = request(scenarios::validation_failure_extension(), &[]);
        let err = create_plan(StateExtractor(state), Json(req)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "INVALID_FIELD");
    }
}
