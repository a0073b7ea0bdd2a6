//! Angle/position math shared by the Field Validator and both Sequencers:
//! the `fibreAngle` ray-bearing function, the Validator's bend-angle
//! reduction, and the grasp-rotation button-anchor recompute (SPEC_FULL.md
//! S4.3, S4.4).

use std::f64::consts::PI;

/// Angle of the ray `origin -> point`, measured from the +Y axis,
/// increasing anti-clockwise, in `[0, 2*PI)`. Implements the eight-branch
/// case split of SPEC_FULL.md S4.3 directly rather than via a single
/// `atan2`, since the source's branch structure is part of the observable
/// contract at the dx==0/dy==0 boundaries.
pub fn fibre_angle(point: (f64, f64), origin: (f64, f64)) -> f64 {
    let dx = point.0 - origin.0;
    let dy = point.1 - origin.1;
    if dx == 0.0 && dy > 0.0 {
        0.0
    } else if dx < 0.0 && dy > 0.0 {
        PI / 2.0 - (dy.abs() / dx.abs()).atan()
    } else if dx < 0.0 && dy == 0.0 {
        PI / 2.0
    } else if dx < 0.0 && dy < 0.0 {
        PI / 2.0 + (dy.abs() / dx.abs()).atan()
    } else if dx == 0.0 && dy < 0.0 {
        PI
    } else if dx > 0.0 && dy < 0.0 {
        3.0 * PI / 2.0 - (dy.abs() / dx.abs()).atan()
    } else if dx > 0.0 && dy == 0.0 {
        3.0 * PI / 2.0
    } else if dx > 0.0 && dy > 0.0 {
        3.0 * PI / 2.0 + (dy.abs() / dx.abs()).atan()
    } else {
        // dx == 0.0 && dy == 0.0: point coincides with origin, no bearing.
        0.0
    }
}

/// Reduce a raw angular difference to its absolute value in `[0, PI]` by
/// repeatedly folding by `2*PI` rather than a single modulo, matching the
/// source's multi-pass convergence from arbitrarily large raw differences
/// (SPEC_FULL.md S4.3).
pub fn reduce_to_abs_pi(mut a: f64) -> f64 {
    while a > PI {
        a -= 2.0 * PI;
    }
    while a < -PI {
        a += 2.0 * PI;
    }
    a.abs()
}

/// Recompute a button's anchor position from the pivot's grasp offset and
/// its (new) theta. The one place grasp rotation is actually applied — see
/// SPEC_FULL.md S4.4's note that the commented-out rotation arithmetic
/// inside `directMove` itself is dead code.
pub fn button_anchor(xf: i64, yf: i64, theta: f64, grasp_x: i64, grasp_y: i64) -> (i64, i64) {
    let (sin_t, cos_t) = theta.sin_cos();
    let gx = grasp_x as f64;
    let gy = grasp_y as f64;
    let xb = xf as f64 - (gx * cos_t - gy * sin_t);
    let yb = yf as f64 - (gx * cos_t + gy * sin_t);
    (xb.round() as i64, yb.round() as i64)
}
