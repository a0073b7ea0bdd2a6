//! Fixture builders for the concrete scenarios named in SPEC_FULL.md S8.
//! Each function returns a ready-to-use `FieldData` (and, where relevant,
//! the serialized `above` array) so tests can drive the Validator and
//! Sequencers end to end without repeating field-construction boilerplate.

use delta_types::{CurrentPivot, FibreType, FieldData, Fiducial, MustMove, PivotConstants, PivotOffsets, TargetPivot};

fn constants(x_piv: i64, y_piv: i64, max_ext: i64) -> PivotConstants {
    PivotConstants {
        t_park: 0.0,
        x_park: x_piv,
        y_park: y_piv,
        x_piv,
        y_piv,
        fibre_type: FibreType::Object,
        in_use: true,
        grasp_x: 0,
        grasp_y: 0,
        max_ext,
    }
}

fn parked_current(x_piv: i64, y_piv: i64) -> CurrentPivot {
    CurrentPivot {
        theta: 0.0,
        fibre_length: 0.0,
        fvp_x: x_piv,
        fvp_y: y_piv,
        xf: x_piv,
        yf: y_piv,
        xb: x_piv,
        yb: y_piv,
        parked: true,
    }
}

fn placed_current(x_piv: i64, y_piv: i64, xf: i64, yf: i64, theta: f64) -> CurrentPivot {
    CurrentPivot {
        theta,
        fibre_length: ((xf - x_piv) as f64).hypot((yf - y_piv) as f64),
        fvp_x: xf,
        fvp_y: yf,
        xf,
        yf,
        xb: xf,
        yb: yf,
        parked: false,
    }
}

fn parked_target(x_piv: i64, y_piv: i64) -> TargetPivot {
    TargetPivot {
        theta: 0.0,
        fibre_length: 0.0,
        fvp_x: x_piv,
        fvp_y: y_piv,
        xf: x_piv,
        yf: y_piv,
        must_move: MustMove::No,
        parked: true,
    }
}

fn moved_target(x_piv: i64, y_piv: i64, xf: i64, yf: i64, theta: f64, must_move: MustMove, parked: bool) -> TargetPivot {
    TargetPivot {
        theta,
        fibre_length: ((xf - x_piv) as f64).hypot((yf - y_piv) as f64),
        fvp_x: xf,
        fvp_y: yf,
        xf,
        yf,
        must_move,
        parked,
    }
}

/// Scenario 1: trivial identity plan. P=1, Current==Target, mustMove=NO.
pub fn trivial_identity() -> FieldData {
    let c = constants(0, 0, 1_000_000);
    FieldData {
        constants: vec![c],
        current: vec![parked_current(0, 0)],
        target: vec![parked_target(0, 0)],
        offsets: vec![PivotOffsets::default()],
        fiducials: vec![],
        above: vec![0],
    }
}

/// Scenario 2: single direct move. P=2, pivot 1 parked->(500,0,0), pivot 2
/// stays unparked at (10000,0) and does not need to move.
pub fn single_direct_move() -> FieldData {
    let c1 = constants(0, 0, 1_000_000);
    let c2 = constants(10_000, 0, 1_000_000);
    let current2 = placed_current(10_000, 0, 10_000, 0, 0.0);
    FieldData {
        constants: vec![c1, c2],
        current: vec![parked_current(0, 0), current2],
        target: vec![
            moved_target(0, 0, 500, 0, 0.0, MustMove::Yes, false),
            moved_target(10_000, 0, 10_000, 0, 0.0, MustMove::No, false),
        ],
        offsets: vec![PivotOffsets::default(); 2],
        fiducials: vec![],
        above: vec![0],
    }
}

/// Scenario 3: crossover forces a park. P=2, pivots trade places: pivot 1's
/// target sits under pivot 2's current fibre and vice versa, so neither can
/// move directly until one parks out of the way.
pub fn crossover_forces_park() -> FieldData {
    let c1 = constants(0, 0, 1_000_000);
    let c2 = constants(9_000, 0, 1_000_000);
    let current1 = placed_current(0, 0, 8_000, 0, 0.0);
    let current2 = placed_current(9_000, 0, 1_000, 0, 0.0);
    FieldData {
        constants: vec![c1, c2],
        current: vec![current1, current2],
        target: vec![
            moved_target(0, 0, 2_000, 0, 0.0, MustMove::Yes, false),
            moved_target(9_000, 0, 7_000, 0, 0.0, MustMove::Yes, false),
        ],
        offsets: vec![PivotOffsets::default(); 2],
        fiducials: vec![],
        above: vec![0],
    }
}

/// Scenario 4: validation failure on fibre extension. P=1, maxExt=100000,
/// target fibreLength=100001, mustMove=YES.
pub fn validation_failure_extension() -> FieldData {
    let mut c = constants(0, 0, 100_000);
    c.x_piv = 0;
    c.y_piv = 0;
    let mut target = moved_target(0, 0, 100_001, 0, 0.0, MustMove::Yes, false);
    target.fibre_length = 100_001.0;
    FieldData {
        constants: vec![c],
        current: vec![parked_current(0, 0)],
        target: vec![target],
        offsets: vec![PivotOffsets::default()],
        fiducials: vec![],
        above: vec![0],
    }
}

/// Scenario 5: fiducial blockade. F=3, all in use; the fiducials are
/// placed directly on each moving pivot's fibre ray so the reference
/// geometry's `col_fiducial` reports an obstruction for all three.
pub fn fiducial_blockade() -> FieldData {
    let c1 = constants(0, 0, 1_000_000);
    let c2 = constants(20_000, 0, 1_000_000);
    let c3 = constants(40_000, 0, 1_000_000);
    let current = vec![
        placed_current(0, 0, 1_000, 0, 0.0),
        placed_current(20_000, 0, 21_000, 0, 0.0),
        placed_current(40_000, 0, 41_000, 0, 0.0),
    ];
    let target = vec![
        moved_target(0, 0, 1_000, 0, 0.0, MustMove::No, false),
        moved_target(20_000, 0, 21_000, 0, 0.0, MustMove::No, false),
        moved_target(40_000, 0, 41_000, 0, 0.0, MustMove::No, false),
    ];
    FieldData {
        constants: vec![c1, c2, c3],
        current,
        target,
        offsets: vec![PivotOffsets::default(); 3],
        fiducials: vec![
            Fiducial { xf: 500, yf: 0, in_use: true },
            Fiducial { xf: 20_500, yf: 0, in_use: true },
            Fiducial { xf: 40_500, yf: 0, in_use: true },
        ],
        above: vec![0],
    }
}

/// Scenario 6: special-mode park-then-place. INSTR-B, P=3, all currently
/// placed, all must move, distances from centre 5000/10000/15000.
pub fn special_park_then_place() -> FieldData {
    let c1 = constants(5_000, 0, 1_000_000);
    let c2 = constants(10_000, 0, 1_000_000);
    let c3 = constants(15_000, 0, 1_000_000);
    let current = vec![
        placed_current(5_000, 0, 5_000, 0, 0.0),
        placed_current(10_000, 0, 10_000, 0, 0.0),
        placed_current(15_000, 0, 15_000, 0, 0.0),
    ];
    let target = vec![
        moved_target(5_000, 0, 5_000, 0, 0.0, MustMove::Yes, false),
        moved_target(10_000, 0, 10_000, 0, 0.0, MustMove::Yes, false),
        moved_target(15_000, 0, 15_000, 0, 0.0, MustMove::Yes, false),
    ];
    FieldData {
        constants: vec![c1, c2, c3],
        current,
        target,
        offsets: vec![PivotOffsets::default(); 3],
        fiducials: vec![],
        above: vec![0],
    }
}
