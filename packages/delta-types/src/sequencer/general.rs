//! General Sequencer (INSTR-A): direct-move iteration with a
//! park-when-blocked fallback (SPEC_FULL.md S4.4).

use tracing::info;

use crate::angles::button_anchor;
use crate::command::Command;
use crate::command::CommandStream;
use crate::crossover::CrossoverGraph;
use crate::error::{DeltaError, DeltaResult};
use crate::geometry::{Button, Fibre, GeometryProvider, ParkMayCollideOverride};
use crate::model::{ClearanceParams, FieldData, MustMove};

use super::{ProgressTracker, MAX_PARKS};

const POSITION_EPS: f64 = 1e-6;

struct GeneralPlan<'a> {
    field: &'a mut FieldData,
    graph: &'a mut CrossoverGraph,
    geometry: &'a mut dyn GeometryProvider,
    clearances: ClearanceParams,
    park_may_collide: bool,
    stream: &'a mut CommandStream,
    pivots_left: i64,
    num_unparked_not_moved: i64,
    already_parked: Vec<u8>,
    mf_committed: Vec<bool>,
    num_moves_prevented: Vec<u32>,
    num_moves: u32,
    num_parks: u32,
    list_reset: bool,
    progress: ProgressTracker,
}

impl<'a> GeneralPlan<'a> {
    fn p(&self) -> usize {
        self.field.num_pivots()
    }

    fn publish_progress(&mut self) {
        self.progress.update(self.num_moves, self.num_parks, self.pivots_left);
    }

    /// Direct-move legality check. Returns `None` if pivot `i` may move
    /// directly this pass, else `Some(blocking pivot number, 1-based)`.
    fn direct_move(&mut self, i: usize) -> DeltaResult<Option<u32>> {
        // (a)
        if self.graph.n_above(i) > 0 {
            return Ok(Some(self.graph.above(i)[0] + 1));
        }

        let p = self.p();
        let ti = self.field.target[i];
        let ci_type = self.field.constants[i].fibre_type;

        // (b)
        for j in 0..p {
            if j == i {
                continue;
            }
            if self.field.current[j].parked && !self.park_may_collide {
                continue;
            }
            if self.field.target[j].must_move == MustMove::No {
                continue;
            }
            let cj = self.field.current[j];
            if ti.fibre_length + cj.fibre_length <= self.field.pivot_dist(i, j) {
                continue;
            }
            let cj_type = self.field.constants[j].fibre_type;
            let fib_clear = self.clearances.fibre(cj_type);
            let but_clear = self.clearances.button(ci_type, cj_type);

            let target_button_i = Button { x: ti.xf, y: ti.yf, theta: ti.theta };
            let interim_fibre_j = Fibre {
                piv_x: self.field.constants[j].x_piv,
                piv_y: self.field.constants[j].y_piv,
                fvp_x: cj.fvp_x,
                fvp_y: cj.fvp_y,
            };
            self.geometry.set_fib_clear(fib_clear);
            if self.geometry.col_but_fib(target_button_i, interim_fibre_j) {
                return Ok(Some((j + 1) as u32));
            }

            let interim_button_j = Button { x: cj.xb, y: cj.yb, theta: cj.theta };
            self.geometry.set_but_clear(but_clear);
            if self.geometry.col_but_but(target_button_i, interim_button_j) {
                return Ok(Some((j + 1) as u32));
            }

            let target_fibre_i = Fibre {
                piv_x: self.field.constants[i].x_piv,
                piv_y: self.field.constants[i].y_piv,
                fvp_x: ti.fvp_x,
                fvp_y: ti.fvp_y,
            };
            self.geometry.set_fib_clear(fib_clear);
            if self.geometry.col_fib_fib(target_fibre_i, interim_fibre_j) {
                return Ok(Some((j + 1) as u32));
            }
            if self.geometry.col_but_fib(interim_button_j, target_fibre_i) {
                return Ok(Some((j + 1) as u32));
            }
        }

        // (c)
        self.check_fibres_under(i)
    }

    /// Build the scratch below-list pivot `i` would have after moving to
    /// its target, then ask whether anything crossing under it (directly
    /// or transitively, via the real graph for pivots other than `i`)
    /// still has `mustMove == YES`. The scratch list is never written into
    /// the live graph (SPEC_FULL.md S9's snapshot note).
    fn check_fibres_under(&mut self, i: usize) -> DeltaResult<Option<u32>> {
        let p = self.p();
        let ti = self.field.target[i];
        let target_fibre_i = Fibre {
            piv_x: self.field.constants[i].x_piv,
            piv_y: self.field.constants[i].y_piv,
            fvp_x: ti.fvp_x,
            fvp_y: ti.fvp_y,
        };

        let mut scratch_below = Vec::new();
        for j in 0..p {
            if j == i {
                continue;
            }
            if self.field.current[j].parked {
                continue;
            }
            let cj = self.field.current[j];
            if ti.fibre_length + cj.fibre_length <= self.field.pivot_dist(i, j) {
                continue;
            }
            let cj_type = self.field.constants[j].fibre_type;
            self.geometry.set_fib_clear(self.clearances.fibre(cj_type));
            let interim_fibre_j = Fibre {
                piv_x: self.field.constants[j].x_piv,
                piv_y: self.field.constants[j].y_piv,
                fvp_x: cj.fvp_x,
                fvp_y: cj.fvp_y,
            };
            if self.geometry.col_fib_fib(target_fibre_i, interim_fibre_j) {
                scratch_below.push(j as u32);
            }
        }

        let mut visited = std::collections::HashSet::new();
        visited.insert(i as u32);
        Ok(self.first_pending_descendant(&scratch_below, &mut visited))
    }

    /// Breadth-then-depth search: check every direct child's `mustMove`
    /// before descending into any child (SPEC_FULL.md S4.4).
    fn first_pending_descendant(&self, children: &[u32], visited: &mut std::collections::HashSet<u32>) -> Option<u32> {
        for &c in children {
            if self.field.target[c as usize].must_move == MustMove::Yes {
                return Some(c + 1);
            }
        }
        for &c in children {
            if visited.insert(c) {
                let grandchildren = self.graph.below(c as usize).to_vec();
                if let Some(found) = self.first_pending_descendant(&grandchildren, visited) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Commit a legal direct move for pivot `i`: last-chance graph
    /// consistency check, field copy, graph update, command emission.
    fn commit_direct_move(&mut self, i: usize) -> DeltaResult<()> {
        if self.graph.n_above(i) != 0 {
            return Err(DeltaError::CrossoverInconsistent {
                pivot: (i + 1) as u32,
                detail: "nAbove > 0 immediately before committing a direct move".to_string(),
            });
        }
        if self.mf_committed[i] {
            return Err(DeltaError::PlanInconsistent(format!("pivot {} scheduled for MF more than once", i + 1)));
        }

        let was_parked = self.field.current[i].parked;
        if !was_parked {
            self.num_unparked_not_moved -= 1;
        }

        let t = self.field.target[i];
        let grasp_x = self.field.constants[i].grasp_x;
        let grasp_y = self.field.constants[i].grasp_y;
        let (xb, yb) = button_anchor(t.xf, t.yf, t.theta, grasp_x, grasp_y);

        self.field.current[i].theta = t.theta;
        self.field.current[i].fibre_length = t.fibre_length;
        self.field.current[i].fvp_x = t.fvp_x;
        self.field.current[i].fvp_y = t.fvp_y;
        self.field.current[i].xf = t.xf;
        self.field.current[i].yf = t.yf;
        self.field.current[i].xb = xb;
        self.field.current[i].yb = yb;
        self.field.current[i].parked = t.parked;

        self.field.target[i].must_move = MustMove::No;
        self.pivots_left -= 1;

        self.graph.clear_below(i);
        let p = self.p();
        let target_fibre_i = Fibre {
            piv_x: self.field.constants[i].x_piv,
            piv_y: self.field.constants[i].y_piv,
            fvp_x: t.fvp_x,
            fvp_y: t.fvp_y,
        };
        for j in 0..p {
            if j == i || self.field.current[j].parked {
                continue;
            }
            let cj = self.field.current[j];
            let cj_type = self.field.constants[j].fibre_type;
            self.geometry.set_fib_clear(self.clearances.fibre(cj_type));
            let interim_fibre_j = Fibre {
                piv_x: self.field.constants[j].x_piv,
                piv_y: self.field.constants[j].y_piv,
                fvp_x: cj.fvp_x,
                fvp_y: cj.fvp_y,
            };
            if self.geometry.col_fib_fib(target_fibre_i, interim_fibre_j) {
                self.graph.add_below(i, j as u32);
                self.graph.add_above(j, i as u32);
            }
        }

        if t.parked {
            self.already_parked[i] += 1;
            if self.already_parked[i] > MAX_PARKS {
                return Err(DeltaError::PlanInconsistent(format!("pivot {} parked more than {} times", i + 1, MAX_PARKS)));
            }
            self.stream.add_cmd(Command::ParkFibre { pivot: (i + 1) as u32 })?;
            self.num_parks += 1;
        } else {
            self.mf_committed[i] = true;
            self.stream.add_cmd(Command::MoveFibre { pivot: (i + 1) as u32, xf: t.xf, yf: t.yf, theta: t.theta })?;
            self.num_moves += 1;
        }
        self.publish_progress();
        Ok(())
    }

    /// One search-for-direct-move pass. Returns whether any pivot moved or
    /// completed as a no-op this pass.
    fn search_for_direct_move(&mut self) -> DeltaResult<bool> {
        let p = self.p();
        self.num_moves_prevented = vec![0u32; p];
        let mut did_move = false;

        for i in 0..p {
            if self.field.target[i].must_move != MustMove::Yes {
                continue;
            }
            if self.field.current[i].parked && self.num_unparked_not_moved > 0 {
                continue;
            }
            let c = self.field.current[i];
            let t = self.field.target[i];
            if c.fvp_x == t.fvp_x && c.fvp_y == t.fvp_y && (c.theta - t.theta).abs() < POSITION_EPS {
                self.field.target[i].must_move = MustMove::No;
                self.pivots_left -= 1;
                did_move = true;
                continue;
            }
            match self.direct_move(i)? {
                None => {
                    self.commit_direct_move(i)?;
                    did_move = true;
                }
                Some(blocker) => {
                    self.num_moves_prevented[(blocker - 1) as usize] += 1;
                }
            }
        }
        Ok(did_move)
    }

    fn record_park(&mut self, candidate: usize) -> DeltaResult<()> {
        match self.field.target[candidate].must_move {
            MustMove::No => {
                self.field.target[candidate].must_move = MustMove::Yes;
                self.pivots_left += 1;
                self.num_unparked_not_moved += 1;
            }
            MustMove::IfNeeded => {
                self.field.target[candidate].must_move = MustMove::No;
            }
            MustMove::Yes => {
                if !self.field.current[candidate].parked {
                    self.num_unparked_not_moved -= 1;
                }
            }
        }

        self.already_parked[candidate] += 1;
        if self.already_parked[candidate] > MAX_PARKS {
            return Err(DeltaError::PlanInconsistent(format!("pivot {} parked more than {} times", candidate + 1, MAX_PARKS)));
        }

        let c = self.field.constants[candidate];
        self.field.current[candidate].theta = c.t_park;
        self.field.current[candidate].fibre_length = 0.0;
        self.field.current[candidate].fvp_x = c.x_park;
        self.field.current[candidate].fvp_y = c.y_park;
        self.field.current[candidate].xf = c.x_park;
        self.field.current[candidate].yf = c.y_park;
        self.field.current[candidate].xb = c.x_park;
        self.field.current[candidate].yb = c.y_park;
        self.field.current[candidate].parked = true;
        self.graph.clear_below(candidate);

        self.stream.add_cmd(Command::ParkFibre { pivot: (candidate + 1) as u32 })?;
        self.num_parks += 1;
        self.list_reset = false;
        self.publish_progress();
        Ok(())
    }

    /// Park phase: select the pivot whose presence blocked the most direct
    /// moves last pass and park it, swapping ineligible candidates (those
    /// still crossed above) onto an alternate list (SPEC_FULL.md S4.4).
    fn could_not_move_must_park(&mut self) -> DeltaResult<()> {
        let p = self.p();
        let mut alternate = vec![0u32; p];
        let mut ineligible = vec![false; p];

        loop {
            let mut candidate = None;
            let mut best = 0u32;
            for i in 0..p {
                if ineligible[i] {
                    continue;
                }
                if self.num_moves_prevented[i] > best {
                    best = self.num_moves_prevented[i];
                    candidate = Some(i);
                }
            }

            let candidate = match candidate {
                Some(c) => c,
                None => {
                    if self.list_reset {
                        return Err(DeltaError::PlanStuck);
                    }
                    for j in 0..p {
                        if alternate[j] != 0 && self.field.target[j].must_move == MustMove::No {
                            self.field.target[j].must_move = MustMove::Yes;
                            self.pivots_left += 1;
                            self.num_unparked_not_moved += 1;
                        }
                    }
                    self.num_moves_prevented = alternate;
                    alternate = vec![0u32; p];
                    ineligible = vec![false; p];
                    self.list_reset = true;
                    continue;
                }
            };

            if self.graph.n_above(candidate) > 0 {
                for &j in self.graph.above(candidate).to_vec().iter() {
                    alternate[j as usize] += 1;
                }
                ineligible[candidate] = true;
                continue;
            }

            return self.record_park(candidate);
        }
    }
}

/// Run the General Sequencer (INSTR-A) to completion, appending MF/PF
/// commands to `stream` and mutating `field.current`/`field.target` and
/// `graph` in place to reflect the simulated execution.
pub fn run_general(
    field: &mut FieldData,
    graph: &mut CrossoverGraph,
    geometry: &mut dyn GeometryProvider,
    clearances: ClearanceParams,
    park_override: ParkMayCollideOverride,
    stream: &mut CommandStream,
) -> DeltaResult<()> {
    let p = field.num_pivots();
    let park_may_collide = park_override.resolve(geometry.park_may_collide());

    let pivots_left = field.target.iter().filter(|t| t.must_move == MustMove::Yes).count() as i64;
    let num_unparked_not_moved = field
        .target
        .iter()
        .enumerate()
        .filter(|(i, t)| t.must_move == MustMove::Yes && !field.current[*i].parked)
        .count() as i64;

    let mut plan = GeneralPlan {
        field,
        graph,
        geometry,
        clearances,
        park_may_collide,
        stream,
        pivots_left,
        num_unparked_not_moved,
        already_parked: vec![0u8; p],
        mf_committed: vec![false; p],
        num_moves_prevented: vec![0u32; p],
        num_moves: 0,
        num_parks: 0,
        list_reset: false,
        progress: ProgressTracker::new(),
    };

    let mut did_move_last_pass = true;
    while plan.pivots_left > 0 {
        if did_move_last_pass {
            did_move_last_pass = plan.search_for_direct_move()?;
        } else {
            plan.could_not_move_must_park()?;
            did_move_last_pass = true;
        }
    }

    plan.stream.add_moves(plan.num_moves, plan.num_parks);
    info!(num_moves = plan.num_moves, num_parks = plan.num_parks, "General Sequencer completed plan");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Instrument;
    use delta_testfield::{scenarios, ReferenceGeometry};

    fn clearances() -> ClearanceParams {
        ClearanceParams { but_clear_g: 0, fib_clear_g: 0, but_clear_o: 0, fib_clear_o: 0 }
    }

    #[test]
    fn trivial_identity_emits_nothing() {
        let mut field = scenarios::trivial_identity();
        let mut graph = CrossoverGraph::from_above_array(field.num_pivots(), &field.above.clone());
        let mut geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrA);
        let mut stream = CommandStream::new(&field.current.clone(), field.above.clone());
        run_general(&mut field, &mut graph, &mut geom, clearances(), ParkMayCollideOverride::ForceFalse, &mut stream).unwrap();
        assert_eq!(stream.num_moves, 0);
        assert_eq!(stream.num_parks, 0);
        assert!(stream.lines.is_empty());
    }

    #[test]
    fn single_direct_move_emits_one_mf() {
        let mut field = scenarios::single_direct_move();
        let mut graph = CrossoverGraph::from_above_array(field.num_pivots(), &field.above.clone());
        let mut geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrA);
        let mut stream = CommandStream::new(&field.current.clone(), field.above.clone());
        run_general(&mut field, &mut graph, &mut geom, clearances(), ParkMayCollideOverride::ForceFalse, &mut stream).unwrap();
        assert_eq!(stream.num_moves, 1);
        assert_eq!(stream.num_parks, 0);
        assert_eq!(stream.lines.len(), 1);
        assert_eq!(stream.lines[0].command.clone(), Command::MoveFibre { pivot: 1, xf: 500, yf: 0, theta: 0.0 });
    }

    /// SPEC_FULL.md S8 scenario 9: the park-may-collide override changes
    /// `directMove`'s step (b) on a fixture where pivot 2 sits parked
    /// directly under pivot 1's target button. With the override off,
    /// pivot 2's parked state skips the whole collision check; with it
    /// forced on, the same button-on-button overlap blocks the move.
    #[test]
    fn park_may_collide_override_changes_direct_move() {
        use crate::model::{CurrentPivot, FibreType, PivotConstants, PivotOffsets, TargetPivot};

        let c1 = PivotConstants { t_park: 0.0, x_park: 0, y_park: 1000, x_piv: 0, y_piv: 1000, fibre_type: FibreType::Object, in_use: true, grasp_x: 0, grasp_y: 0, max_ext: 1_000_000 };
        let c2 = PivotConstants { t_park: 0.0, x_park: 0, y_park: 0, x_piv: 0, y_piv: 0, fibre_type: FibreType::Object, in_use: true, grasp_x: 0, grasp_y: 0, max_ext: 1_000_000 };
        let current1 = CurrentPivot { theta: 0.0, fibre_length: 1000.0, fvp_x: 0, fvp_y: 2000, xf: 0, yf: 2000, xb: 0, yb: 2000, parked: false };
        let current2 = CurrentPivot { theta: 0.0, fibre_length: 0.0, fvp_x: 0, fvp_y: 0, xf: 0, yf: 0, xb: 0, yb: 0, parked: true };
        let target1 = TargetPivot { theta: 0.0, fibre_length: 1050.0, fvp_x: 0, fvp_y: -50, xf: 0, yf: -50, must_move: MustMove::Yes, parked: false };
        let target2 = TargetPivot { theta: 0.0, fibre_length: 2000.0, fvp_x: 0, fvp_y: -2000, xf: 0, yf: -2000, must_move: MustMove::Yes, parked: false };
        let mut field = FieldData {
            constants: vec![c1, c2],
            current: vec![current1, current2],
            target: vec![target1, target2],
            offsets: vec![PivotOffsets::default(); 2],
            fiducials: vec![],
            above: vec![0],
        };
        let mut graph = CrossoverGraph::from_above_array(field.num_pivots(), &field.above.clone());
        let mut geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrA);
        let mut stream = CommandStream::new(&field.current.clone(), field.above.clone());

        let blocked_off = {
            let mut plan = GeneralPlan {
                field: &mut field,
                graph: &mut graph,
                geometry: &mut geom,
                clearances: clearances(),
                park_may_collide: false,
                stream: &mut stream,
                pivots_left: 2,
                num_unparked_not_moved: 1,
                already_parked: vec![0, 0],
                mf_committed: vec![false, false],
                num_moves_prevented: vec![0, 0],
                num_moves: 0,
                num_parks: 0,
                list_reset: false,
                progress: ProgressTracker::new(),
            };
            plan.direct_move(0).unwrap()
        };
        assert_eq!(blocked_off, None, "parked pivot 2 must be skipped entirely when the override forces collisions off");

        let blocked_on = {
            let mut plan = GeneralPlan {
                field: &mut field,
                graph: &mut graph,
                geometry: &mut geom,
                clearances: clearances(),
                park_may_collide: true,
                stream: &mut stream,
                pivots_left: 2,
                num_unparked_not_moved: 1,
                already_parked: vec![0, 0],
                mf_committed: vec![false, false],
                num_moves_prevented: vec![0, 0],
                num_moves: 0,
                num_parks: 0,
                list_reset: false,
                progress: ProgressTracker::new(),
            };
            plan.direct_move(0).unwrap()
        };
        assert_eq!(blocked_on, Some(2), "forcing collisions on must surface pivot 2's parked button under pivot 1's target");
    }

    #[test]
    fn crossover_forces_a_park() {
        let mut field = scenarios::crossover_forces_park();
        let mut graph = CrossoverGraph::from_above_array(field.num_pivots(), &field.above.clone());
        let mut geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrA);
        let mut stream = CommandStream::new(&field.current.clone(), field.above.clone());
        run_general(&mut field, &mut graph, &mut geom, clearances(), ParkMayCollideOverride::ForceFalse, &mut stream).unwrap();
        assert_eq!(stream.num_parks, 1);
        assert_eq!(stream.num_moves, 2);
        assert_eq!(stream.lines.len(), 3);
        assert_eq!(stream.lines[0].command, Command::ParkFibre { pivot: 1 });
    }
}
