//! Field Validator: the six passes of SPEC_FULL.md S4.3, run against a
//! proposed Target configuration before a Sequencer is ever invoked.
//!
//! Every detected error is both counted and emitted as a `tracing::warn!`
//! with structured fields, per SPEC_FULL.md S10.1 — a consumer filters or
//! aggregates the structured fields rather than parsing the rendered
//! message. `validate` returns `Err(DeltaError::InvalidField { .. })` if
//! any pass found an error, else `Ok(())`.

use tracing::warn;

use crate::angles::{fibre_angle, reduce_to_abs_pi};
use crate::error::{DeltaError, DeltaResult};
use crate::geometry::{Button, Fibre, GeometryProvider, ParkMayCollideOverride};
use crate::model::{BendAngleLimits, ClearanceParams, FieldData, MustMove};

/// The flags that affect validation's iteration policy. A private subset
/// of `GenerateFlags` so the validator doesn't need to reach for fields
/// irrelevant to it.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorFlags {
    pub check_full_field: bool,
}

/// Whether pivot `i` should be visited at all per the dedup/skip policy
/// shared by passes 1 and 2 (SPEC_FULL.md S4.3).
fn visits_pivot(field: &FieldData, flags: ValidatorFlags, i: usize) -> bool {
    flags.check_full_field || field.target[i].must_move == MustMove::Yes
}

/// The inner-loop dedup rule shared by passes 1 and 2: skip `j` when
/// `i > j` and `j` was already checkable from the other side.
fn skip_as_duplicate(field: &FieldData, flags: ValidatorFlags, i: usize, j: usize) -> bool {
    i > j
        && (matches!(
            field.target[j].must_move,
            MustMove::Yes | MustMove::IfNeeded
        ) || flags.check_full_field)
}

/// The target-side button pose for pivot `i`, or `None` if it's parked and
/// parked fibres are not considered collision-capable.
fn target_button(field: &FieldData, park_may_collide: bool, i: usize) -> Option<Button> {
    let t = &field.target[i];
    if t.parked {
        if park_may_collide {
            let c = &field.constants[i];
            Some(Button { x: c.x_park, y: c.y_park, theta: c.t_park })
        } else {
            None
        }
    } else {
        Some(Button { x: t.xf, y: t.yf, theta: t.theta })
    }
}

/// The target-side fibre ray for pivot `i`, or `None` if parked and not
/// collision-capable.
fn target_fibre(field: &FieldData, park_may_collide: bool, i: usize) -> Option<Fibre> {
    let t = &field.target[i];
    let c = &field.constants[i];
    if t.parked {
        if park_may_collide {
            Some(Fibre { piv_x: c.x_piv, piv_y: c.y_piv, fvp_x: c.x_park, fvp_y: c.y_park })
        } else {
            None
        }
    } else {
        Some(Fibre { piv_x: c.x_piv, piv_y: c.y_piv, fvp_x: t.fvp_x, fvp_y: t.fvp_y })
    }
}

fn button_button_pass(
    field: &FieldData,
    geometry: &mut dyn GeometryProvider,
    flags: ValidatorFlags,
    clearances: ClearanceParams,
    park_may_collide: bool,
    errors: &mut usize,
) {
    let p = field.num_pivots();
    for i in 0..p {
        if !visits_pivot(field, flags, i) {
            continue;
        }
        for j in 0..p {
            if j == i {
                continue;
            }
            if skip_as_duplicate(field, flags, i, j) {
                continue;
            }
            let (Some(bi), Some(bj)) = (
                target_button(field, park_may_collide, i),
                target_button(field, park_may_collide, j),
            ) else {
                continue;
            };
            let clearance = clearances.button(field.constants[i].fibre_type, field.constants[j].fibre_type);
            geometry.set_but_clear(clearance);
            if geometry.col_but_but(bi, bj) {
                *errors += 1;
                warn!(pivot = i + 1, other_pivot = j + 1, rule = "button_button", "WARNING: Button/button collision detected in target field (but={},{})", i + 1, j + 1);
            }
        }
    }
}

fn button_fibre_pass(
    field: &FieldData,
    geometry: &mut dyn GeometryProvider,
    flags: ValidatorFlags,
    clearances: ClearanceParams,
    park_may_collide: bool,
    errors: &mut usize,
) {
    let p = field.num_pivots();
    for i in 0..p {
        if !visits_pivot(field, flags, i) {
            continue;
        }
        for j in 0..p {
            if j == i {
                continue;
            }
            if skip_as_duplicate(field, flags, i, j) {
                continue;
            }
            if let (Some(bi), Some(fj)) = (
                target_button(field, park_may_collide, i),
                target_fibre(field, park_may_collide, j),
            ) {
                geometry.set_fib_clear(clearances.fibre(field.constants[j].fibre_type));
                if geometry.col_but_fib(bi, fj) {
                    *errors += 1;
                    warn!(pivot = i + 1, other_pivot = j + 1, rule = "button_fibre", "WARNING: Button/fibre collision detected in target field (but={},fib={})", i + 1, j + 1);
                }
            }
            if let (Some(bj), Some(fi)) = (
                target_button(field, park_may_collide, j),
                target_fibre(field, park_may_collide, i),
            ) {
                geometry.set_fib_clear(clearances.fibre(field.constants[i].fibre_type));
                if geometry.col_but_fib(bj, fi) {
                    *errors += 1;
                    warn!(pivot = j + 1, other_pivot = i + 1, rule = "button_fibre", "WARNING: Button/fibre collision detected in target field (but={},fib={})", j + 1, i + 1);
                }
            }
        }
    }
}

fn extension_pass(field: &FieldData, errors: &mut usize) {
    for i in 0..field.num_pivots() {
        let t = &field.target[i];
        if t.must_move != MustMove::Yes || t.parked {
            continue;
        }
        if t.fibre_length > field.constants[i].max_ext as f64 {
            *errors += 1;
            warn!(pivot = i + 1, rule = "extension", fibre_length = t.fibre_length, max_ext = field.constants[i].max_ext, "WARNING: Fibre extension exceeded for pivot {}", i + 1);
        }
    }
}

fn bend_angle_pass(field: &FieldData, geometry: &dyn GeometryProvider, limits: BendAngleLimits, errors: &mut usize) {
    let fib_ang_variable = geometry.fib_ang_variable();
    for i in 0..field.num_pivots() {
        let t = &field.target[i];
        if t.must_move != MustMove::Yes || t.parked {
            continue;
        }
        let c = &field.constants[i];
        let theta_fib = fibre_angle((t.fvp_x as f64, t.fvp_y as f64), (c.x_piv as f64, c.y_piv as f64));
        let theta_but_fib = reduce_to_abs_pi(theta_fib - t.theta - std::f64::consts::PI);
        let theta_piv_fib = reduce_to_abs_pi(theta_fib - fibre_angle((0.0, 0.0), (c.x_piv as f64, c.y_piv as f64)));

        if fib_ang_variable {
            let limit = limits.button_limit(c.fibre_type);
            if theta_but_fib > limit {
                *errors += 1;
                warn!(pivot = i + 1, rule = "button_bend_angle", theta_but_fib, limit, "WARNING: Button bend angle exceeded for pivot {}", i + 1);
            }
        }
        let piv_limit = limits.pivot_limit(c.fibre_type);
        if theta_piv_fib > piv_limit {
            *errors += 1;
            warn!(pivot = i + 1, rule = "pivot_bend_angle", theta_piv_fib, limit = piv_limit, "WARNING: Pivot bend angle exceeded for pivot {}", i + 1);
        }
    }
}

fn plate_position_pass(field: &FieldData, geometry: &dyn GeometryProvider, errors: &mut usize) {
    for i in 0..field.num_pivots() {
        let t = &field.target[i];
        if t.must_move != MustMove::Yes || t.parked {
            continue;
        }
        let c = &field.constants[i];
        if !geometry.on_field(t.xf, t.yf) {
            *errors += 1;
            warn!(pivot = i + 1, rule = "plate_position", "WARNING: Target position for pivot {} is off the plate", i + 1);
        } else if geometry.invalid_position(0, c.fibre_type, t.xf, t.yf, t.theta) {
            *errors += 1;
            warn!(pivot = i + 1, rule = "plate_position", "WARNING: Target position for pivot {} is invalid (obstruction)", i + 1);
        }
    }
}

fn fiducial_pass(field: &FieldData, geometry: &dyn GeometryProvider, errors: &mut usize) {
    let mut unobstructed = 0usize;
    for k in 0..field.num_fiducials() {
        let fid = &field.fiducials[k];
        if !fid.in_use {
            continue;
        }
        let mut obstructed = false;
        for i in 0..field.num_pivots() {
            if field.target[i].parked {
                continue;
            }
            let t = &field.target[i];
            let c = &field.constants[i];
            let button = Button { x: t.xf, y: t.yf, theta: t.theta };
            let fibre = Fibre { piv_x: c.x_piv, piv_y: c.y_piv, fvp_x: t.fvp_x, fvp_y: t.fvp_y };
            if geometry.col_fiducial(button, fibre, fid.xf, fid.yf) {
                obstructed = true;
                break;
            }
        }
        if !obstructed {
            unobstructed += 1;
        }
    }
    if unobstructed < 3 {
        *errors += 1;
        if unobstructed == 0 {
            warn!(rule = "fiducials", unobstructed, "WARNING: All fiducials are obstructed");
        } else {
            warn!(rule = "fiducials", unobstructed, "WARNING: Only {} fiducial(s) unobstructed", unobstructed);
        }
        warn!(rule = "fiducials", "WARNING: We must have three unobstructed fiducials");
    }
}

/// Run all six passes against `field`'s Target configuration. Returns
/// `Ok(())` if no pass found an error, else `Err(InvalidField)` with the
/// total error count.
pub fn validate(
    field: &FieldData,
    geometry: &mut dyn GeometryProvider,
    check_full_field: bool,
    clearances: ClearanceParams,
    bend_limits: BendAngleLimits,
    park_override: ParkMayCollideOverride,
) -> DeltaResult<()> {
    let flags = ValidatorFlags { check_full_field };
    let park_may_collide = park_override.resolve(geometry.park_may_collide());
    let mut errors = 0usize;

    button_button_pass(field, geometry, flags, clearances, park_may_collide, &mut errors);
    button_fibre_pass(field, geometry, flags, clearances, park_may_collide, &mut errors);
    extension_pass(field, &mut errors);
    bend_angle_pass(field, geometry, bend_limits, &mut errors);
    plate_position_pass(field, geometry, &mut errors);
    fiducial_pass(field, geometry, &mut errors);

    if errors > 0 {
        Err(DeltaError::InvalidField { error_count: errors })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Instrument;
    use delta_testfield::scenarios;
    use delta_testfield::ReferenceGeometry;

    fn clearances() -> ClearanceParams {
        ClearanceParams { but_clear_g: 0, fib_clear_g: 0, but_clear_o: 0, fib_clear_o: 0 }
    }

    fn generous_bend_limits() -> BendAngleLimits {
        BendAngleLimits {
            max_but_ang_g: std::f64::consts::PI,
            max_piv_ang_g: std::f64::consts::PI,
            max_but_ang_o: std::f64::consts::PI,
            max_piv_ang_o: std::f64::consts::PI,
        }
    }

    #[test]
    fn trivial_identity_passes() {
        let field = scenarios::trivial_identity();
        let mut geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrA);
        let result = validate(&field, &mut geom, false, clearances(), generous_bend_limits(), ParkMayCollideOverride::ForceFalse);
        assert!(result.is_ok());
    }

    #[test]
    fn extension_failure_is_detected() {
        let field = scenarios::validation_failure_extension();
        let mut geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrA);
        let err = validate(&field, &mut geom, false, clearances(), generous_bend_limits(), ParkMayCollideOverride::ForceFalse).unwrap_err();
        assert_eq!(err, DeltaError::InvalidField { error_count: 1 });
    }

    #[test]
    fn fiducial_blockade_is_detected() {
        let field = scenarios::fiducial_blockade();
        let mut geom = ReferenceGeometry::new(field.num_pivots(), field.num_fiducials(), Instrument::InstrA);
        let obstructing_clearances = ClearanceParams { but_clear_g: 0, fib_clear_g: 0, but_clear_o: 600, fib_clear_o: 600 };
        let err = validate(&field, &mut geom, true, obstructing_clearances, generous_bend_limits(), ParkMayCollideOverride::ForceFalse).unwrap_err();
        assert_eq!(err, DeltaError::InvalidField { error_count: 1 });
    }

    #[test]
    fn check_full_field_off_skips_no_move_pivots() {
        // pivot 0 has mustMove == NO in this fixture's target; without
        // CHECK_FULL_FIELD it must never be visited, so an otherwise
        // guaranteed extension failure on it must not surface.
        let mut field = scenarios::single_direct_move();
        field.target[1].fibre_length = (field.constants[1].max_ext + 1) as f64;
        // pivot 2 (index 1) has mustMove == NO already.
        let mut geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrA);
        let result = validate(&field, &mut geom, false, clearances(), generous_bend_limits(), ParkMayCollideOverride::ForceFalse);
        assert!(result.is_ok());
    }

    /// A lone pivot whose fibre is aimed straight back at the plate origin:
    /// `thetaFib` equals `fibreAngle(origin, piv)` exactly, so the true
    /// pivot bend is ~0. With `fibre_angle`'s arguments swapped this would
    /// come out rotated by pi and get spuriously rejected even against a
    /// tight limit.
    fn radial_pivot_field(fvp_y: i64) -> FieldData {
        FieldData {
            constants: vec![crate::model::PivotConstants {
                t_park: 0.0,
                x_park: 0,
                y_park: 0,
                x_piv: 0,
                y_piv: 1000,
                fibre_type: crate::model::FibreType::Guide,
                in_use: true,
                grasp_x: 0,
                grasp_y: 0,
                max_ext: 100_000,
            }],
            current: vec![crate::model::CurrentPivot {
                theta: 0.0,
                fibre_length: 0.0,
                fvp_x: 0,
                fvp_y: 1000,
                xf: 0,
                yf: 1000,
                xb: 0,
                yb: 1000,
                parked: false,
            }],
            target: vec![crate::model::TargetPivot {
                theta: 0.0,
                fibre_length: (1000 - fvp_y).unsigned_abs() as f64,
                fvp_x: 0,
                fvp_y,
                xf: 0,
                yf: fvp_y,
                must_move: MustMove::Yes,
                parked: false,
            }],
            offsets: vec![crate::model::PivotOffsets::default()],
            fiducials: vec![],
            above: vec![0],
        }
    }

    fn tight_pivot_limit() -> BendAngleLimits {
        BendAngleLimits {
            max_but_ang_g: std::f64::consts::PI,
            max_piv_ang_g: std::f64::consts::PI / 4.0,
            max_but_ang_o: std::f64::consts::PI,
            max_piv_ang_o: std::f64::consts::PI / 4.0,
        }
    }

    #[test]
    fn radial_pivot_bend_is_not_rejected() {
        let field = radial_pivot_field(500);
        let geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrA);
        let mut errors = 0usize;
        bend_angle_pass(&field, &geom, tight_pivot_limit(), &mut errors);
        assert_eq!(errors, 0);
    }

    #[test]
    fn fully_bent_pivot_fibre_is_rejected() {
        // fvp continues straight past the pivot, away from the origin:
        // the fibre direction is the exact opposite of fibreAngle(origin,
        // piv), so the true pivot bend is ~pi.
        let field = radial_pivot_field(2000);
        let geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrA);
        let mut errors = 0usize;
        bend_angle_pass(&field, &geom, tight_pivot_limit(), &mut errors);
        assert_eq!(errors, 1);
    }
}
