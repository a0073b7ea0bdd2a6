//! Action Driver (SPEC_FULL.md S4.6): decodes a GENERATE request, runs the
//! Field Validator unless skipped, and dispatches to the General or Special
//! Sequencer.

use serde::Serialize;
use tracing::info;

use crate::command::CommandStream;
use crate::crossover::CrossoverGraph;
use crate::error::DeltaResult;
use crate::geometry::{GeometryProvider, ParkMayCollideOverride};
use crate::model::GenerateRequest;
use crate::sequencer::{run_general, run_special};
use crate::validator::validate;

/// The outcome of driving one GENERATE request to completion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverOutcome {
    pub stream: CommandStream,
}

/// Run one GENERATE request against `geometry`, mutating a fresh copy of
/// the request's field data and returning the finished command stream.
/// `NO_DELTA` returns an empty stream with no Sequencer invocation at all.
pub fn generate(request: &GenerateRequest, geometry: &mut dyn GeometryProvider, park_override: ParkMayCollideOverride) -> DeltaResult<DriverOutcome> {
    let flags = request.parsed_flags()?;
    let mut field = request.field.clone();

    if request.max_fib_ext > 0 {
        for c in field.constants.iter_mut() {
            c.max_ext = request.max_fib_ext;
        }
    }

    let mut graph = CrossoverGraph::from_above_array(field.num_pivots(), &field.above.clone());
    let clearances = request.clearances();
    let bend_limits = request.bend_angle_limits();

    if !flags.no_field_check {
        validate(&field, geometry, flags.check_full_field, clearances, bend_limits, park_override)?;
    }

    let mut stream = CommandStream::new(&field.current.clone(), field.above.clone());

    if flags.no_delta {
        info!("NO_DELTA requested, skipping Sequencer");
        return Ok(DriverOutcome { stream });
    }

    if flags.special {
        let ext_spring_out = request.ext_spring_out.ok_or_else(|| {
            crate::error::DeltaError::InvalidArgument("extSpringOut is required when SPECIAL is set".to_string())
        })?;
        run_special(&mut field, &mut graph, geometry, clearances, ext_spring_out, &mut stream)?;
    } else {
        run_general(&mut field, &mut graph, geometry, clearances, park_override, &mut stream)?;
    }

    Ok(DriverOutcome { stream })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GenerateFlags, Instrument};
    use delta_testfield::{scenarios, ReferenceGeometry};

    fn request_for(field: crate::model::FieldData, flags: Vec<&str>, special: Option<i64>) -> GenerateRequest {
        let _ = GenerateFlags::default();
        GenerateRequest {
            max_fib_ext: 0,
            max_but_ang_g: 3.0,
            max_piv_ang_g: 3.0,
            max_but_ang_o: 3.0,
            max_piv_ang_o: 3.0,
            but_clear_g: 0,
            fib_clear_g: 0,
            but_clear_o: 0,
            fib_clear_o: 0,
            flags: flags.into_iter().map(String::from).collect(),
            name: Some("TEST".to_string()),
            ext_spring_out: special,
            field,
        }
    }

    #[test]
    fn no_delta_short_circuits() {
        let req = request_for(scenarios::single_direct_move(), vec!["NO_DELTA"], None);
        let mut geom = ReferenceGeometry::new(req.field.num_pivots(), 0, Instrument::InstrA);
        let outcome = generate(&req, &mut geom, ParkMayCollideOverride::ForceFalse).unwrap();
        assert_eq!(outcome.stream.lines.len(), 0);
        assert_eq!(outcome.stream.num_moves, 0);
    }

    #[test]
    fn invalid_field_is_rejected_before_sequencing() {
        let req = request_for(scenarios::validation_failure_extension(), vec![], None);
        let mut geom = ReferenceGeometry::new(req.field.num_pivots(), 0, Instrument::InstrA);
        let err = generate(&req, &mut geom, ParkMayCollideOverride::ForceFalse).unwrap_err();
        assert!(matches!(err, crate::error::DeltaError::InvalidField { .. }));
    }

    #[test]
    fn no_field_check_bypasses_validation() {
        let req = request_for(scenarios::validation_failure_extension(), vec!["NO_FIELD_CHECK"], None);
        let mut geom = ReferenceGeometry::new(req.field.num_pivots(), 0, Instrument::InstrA);
        let outcome = generate(&req, &mut geom, ParkMayCollideOverride::ForceFalse).unwrap();
        assert_eq!(outcome.stream.num_moves, 1);
    }

    #[test]
    fn special_flag_dispatches_to_special_sequencer() {
        let req = request_for(scenarios::special_park_then_place(), vec!["SPECIAL"], Some(0));
        let mut geom = ReferenceGeometry::new(req.field.num_pivots(), 0, Instrument::InstrB);
        let outcome = generate(&req, &mut geom, ParkMayCollideOverride::ForceFalse).unwrap();
        assert_eq!(outcome.stream.num_parks, 3);
        assert_eq!(outcome.stream.num_moves, 3);
    }

    #[test]
    fn special_without_ext_spring_out_is_invalid_argument() {
        let req = request_for(scenarios::special_park_then_place(), vec!["SPECIAL"], None);
        let mut geom = ReferenceGeometry::new(req.field.num_pivots(), 0, Instrument::InstrB);
        let err = generate(&req, &mut geom, ParkMayCollideOverride::ForceFalse).unwrap_err();
        assert!(matches!(err, crate::error::DeltaError::InvalidArgument(_)));
    }

    #[test]
    fn unrecognized_flag_is_invalid_argument() {
        let mut req = request_for(scenarios::trivial_identity(), vec![], None);
        req.flags = vec!["BOGUS".to_string()];
        let mut geom = ReferenceGeometry::new(req.field.num_pivots(), 0, Instrument::InstrA);
        let err = generate(&req, &mut geom, ParkMayCollideOverride::ForceFalse).unwrap_err();
        assert!(matches!(err, crate::error::DeltaError::InvalidArgument(_)));
    }
}
