//! Special Sequencer (INSTR-B): park-then-place with furthest-first
//! ordering and cross-swap (SPEC_FULL.md S4.5).

use tracing::info;

use crate::angles::button_anchor;
use crate::command::Command;
use crate::command::CommandStream;
use crate::crossover::CrossoverGraph;
use crate::error::{DeltaError, DeltaResult};
use crate::geometry::{Fibre, GeometryProvider};
use crate::model::{ClearanceParams, FieldData, MustMove};

use super::ProgressTracker;

const DIST_MAX: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
struct SortRecord {
    pivot: usize,
    dist: f64,
    ext: f64,
}

fn dist_of(xf: i64, yf: i64) -> f64 {
    (xf as f64).hypot(yf as f64)
}

fn park_order(field: &FieldData, ext_spring_out: i64) -> Vec<SortRecord> {
    let mut records: Vec<SortRecord> = (0..field.num_pivots())
        .filter(|&i| !field.current[i].parked)
        .map(|i| {
            let c = field.current[i];
            let piv = field.constants[i];
            SortRecord {
                pivot: i,
                dist: dist_of(c.xf, c.yf),
                ext: ((c.xf - piv.x_piv) as f64).hypot((c.yf - piv.y_piv) as f64),
            }
        })
        .collect();

    if ext_spring_out <= -1 {
        records.sort_by(|a, b| a.dist.partial_cmp(&b.dist).unwrap());
    } else if ext_spring_out == 0 {
        records.sort_by(|a, b| b.dist.partial_cmp(&a.dist).unwrap());
    } else {
        let threshold = ext_spring_out as f64;
        let (mut springers, mut rest): (Vec<_>, Vec<_>) = records.into_iter().partition(|r| r.ext > threshold);
        if springers.len() > 1 {
            springers.sort_by(|a, b| b.ext.partial_cmp(&a.ext).unwrap());
        } else {
            springers.sort_by(|a, b| b.dist.partial_cmp(&a.dist).unwrap());
        }
        rest.sort_by(|a, b| b.dist.partial_cmp(&a.dist).unwrap());
        springers.extend(rest);
        records = springers;
    }
    records
}

fn move_order(field: &FieldData, ext_spring_out: i64) -> Vec<SortRecord> {
    let mut records: Vec<SortRecord> = (0..field.num_pivots())
        .filter(|&i| !field.target[i].parked)
        .map(|i| {
            let t = field.target[i];
            let piv = field.constants[i];
            SortRecord {
                pivot: i,
                dist: dist_of(t.xf, t.yf),
                ext: ((t.xf - piv.x_piv) as f64).hypot((t.yf - piv.y_piv) as f64),
            }
        })
        .collect();
    // Spring-out is a property of a fibre's current extension, not its
    // target pose, so moveOrder follows only the distance direction of
    // the selected mode; the caller walks it tail-first so the net effect
    // mirrors parkOrder in reverse.
    if ext_spring_out <= -1 {
        records.sort_by(|a, b| a.dist.partial_cmp(&b.dist).unwrap());
    } else {
        records.sort_by(|a, b| b.dist.partial_cmp(&a.dist).unwrap());
    }
    records
}

/// The number of spring-out fibres computed by `park_order`'s mode-2
/// branch, needed separately for the command footer's `numSpringOutParks`.
fn spring_out_count(field: &FieldData, ext_spring_out: i64) -> u32 {
    if ext_spring_out <= 0 {
        return 0;
    }
    let threshold = ext_spring_out as f64;
    (0..field.num_pivots())
        .filter(|&i| !field.current[i].parked)
        .filter(|&i| {
            let c = field.current[i];
            let piv = field.constants[i];
            let ext = ((c.xf - piv.x_piv) as f64).hypot((c.yf - piv.y_piv) as f64);
            ext > threshold
        })
        .count() as u32
}

struct SpecialPlan<'a> {
    field: &'a mut FieldData,
    graph: &'a mut CrossoverGraph,
    geometry: &'a mut dyn GeometryProvider,
    clearances: ClearanceParams,
    stream: &'a mut CommandStream,
    pivots_left: i64,
    already_parked: Vec<u8>,
    num_moves: u32,
    num_parks: u32,
    progress: ProgressTracker,
}

impl<'a> SpecialPlan<'a> {
    fn publish_progress(&mut self) {
        self.progress.update(self.num_moves, self.num_parks, self.pivots_left);
    }

    /// Find `crossing_pivot` later in `park_order`, validate the
    /// furthest-first distance tolerance, un-cull any gap it was sitting
    /// in past `last_park_index`, and rotate it into place immediately
    /// before `index` (SPEC_FULL.md S4.5).
    fn cross_swap(
        &mut self,
        park_order: &mut [SortRecord],
        index: usize,
        last_park_index: &mut i64,
        first_move_index: &mut i64,
        crossing_pivot: usize,
    ) -> DeltaResult<()> {
        let found_index = park_order
            .iter()
            .enumerate()
            .skip(index + 1)
            .find(|(_, r)| r.pivot == crossing_pivot)
            .map(|(idx, _)| idx)
            .ok_or_else(|| {
                DeltaError::PlanInconsistent(format!(
                    "pivot {} crosses pivot {} which is not scheduled for parking",
                    park_order[index].pivot + 1,
                    crossing_pivot + 1
                ))
            })?;

        let d1 = park_order[index].dist;
        let d2 = park_order[found_index].dist;
        if d1 == 0.0 || (d1 - d2).abs() / d1.abs() > DIST_MAX {
            return Err(DeltaError::PlanInconsistent(format!(
                "pivot {} and pivot {} differ in distance from centre by more than the furthest-first tolerance",
                park_order[index].pivot + 1,
                park_order[found_index].pivot + 1
            )));
        }

        if found_index as i64 > *last_park_index {
            let gap = found_index as i64 - *last_park_index;
            *last_park_index = found_index as i64;
            *first_move_index += gap;
            self.pivots_left += 2 * gap;
        }

        park_order[index..=found_index].rotate_right(1);
        Ok(())
    }

    fn record_park(&mut self, candidate: usize) -> DeltaResult<()> {
        match self.field.target[candidate].must_move {
            MustMove::No => {
                self.field.target[candidate].must_move = MustMove::Yes;
            }
            MustMove::IfNeeded => {
                self.field.target[candidate].must_move = MustMove::No;
            }
            MustMove::Yes => {}
        }

        self.already_parked[candidate] += 1;
        if self.already_parked[candidate] > super::MAX_PARKS {
            return Err(DeltaError::PlanInconsistent(format!("pivot {} parked more than {} times", candidate + 1, super::MAX_PARKS)));
        }

        self.pivots_left -= 1;

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
        self.publish_progress();
        Ok(())
    }

    fn record_move(&mut self, i: usize) -> DeltaResult<()> {
        if self.graph.n_above(i) > 0 {
            return Err(DeltaError::CrossoverInconsistent {
                pivot: (i + 1) as u32,
                detail: "nAbove > 0 at the start of the place phase".to_string(),
            });
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
        let p = self.field.num_pivots();
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

        self.stream.add_cmd(Command::MoveFibre { pivot: (i + 1) as u32, xf: t.xf, yf: t.yf, theta: t.theta })?;
        self.num_moves += 1;
        self.publish_progress();
        Ok(())
    }
}

/// Run the Special Sequencer (INSTR-B) to completion.
pub fn run_special(
    field: &mut FieldData,
    graph: &mut CrossoverGraph,
    geometry: &mut dyn GeometryProvider,
    clearances: ClearanceParams,
    ext_spring_out: i64,
    stream: &mut CommandStream,
) -> DeltaResult<()> {
    let p = field.num_pivots();

    let mut pivots_left: i64 = 0;
    for i in 0..p {
        if !field.current[i].parked {
            pivots_left += 1;
        }
        if !field.target[i].parked {
            pivots_left += 1;
        }
    }

    let mut park_list = park_order(field, ext_spring_out);
    let move_list = move_order(field, ext_spring_out);
    let num_spring_out = spring_out_count(field, ext_spring_out);

    let mut last_park_index = park_list.len() as i64 - 1;
    let mut first_move_index = move_list.len() as i64 - 1;

    while last_park_index >= 0
        && first_move_index >= 0
        && park_list[last_park_index as usize].pivot == move_list[first_move_index as usize].pivot
        && field.target[park_list[last_park_index as usize].pivot].must_move == MustMove::No
    {
        last_park_index -= 1;
        first_move_index -= 1;
        pivots_left -= 2;
    }

    let mut plan = SpecialPlan {
        field,
        graph,
        geometry,
        clearances,
        stream,
        pivots_left,
        already_parked: vec![0u8; p],
        num_moves: 0,
        num_parks: 0,
        progress: ProgressTracker::new(),
    };

    let mut index = 0i64;
    while index <= last_park_index {
        loop {
            let pivot = park_list[index as usize].pivot;
            if plan.graph.n_above(pivot) == 0 {
                break;
            }
            let crossing_pivot = plan.graph.above(pivot)[0] as usize;
            plan.cross_swap(&mut park_list, index as usize, &mut last_park_index, &mut first_move_index, crossing_pivot)?;
        }
        let pivot = park_list[index as usize].pivot;
        plan.record_park(pivot)?;
        index += 1;
    }

    if plan.pivots_left != 0 {
        let mut idx = first_move_index;
        while idx >= 0 {
            let pivot = move_list[idx as usize].pivot;
            plan.record_move(pivot)?;
            idx -= 1;
        }
    }

    plan.stream.add_moves(plan.num_moves, plan.num_parks);
    let spring_parks = num_spring_out.min(plan.num_parks);
    plan.stream.add_spring_out_parks(spring_parks);
    info!(num_moves = plan.num_moves, num_parks = plan.num_parks, num_spring_out_parks = spring_parks, "Special Sequencer completed plan");
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
    fn park_then_place_orders_furthest_first() {
        let mut field = scenarios::special_park_then_place();
        let mut graph = CrossoverGraph::from_above_array(field.num_pivots(), &field.above.clone());
        let mut geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrB);
        let mut stream = CommandStream::new(&field.current.clone(), field.above.clone());
        run_special(&mut field, &mut graph, &mut geom, clearances(), 0, &mut stream).unwrap();

        assert_eq!(stream.num_parks, 3);
        assert_eq!(stream.num_moves, 3);
        assert_eq!(stream.lines.len(), 6);
        assert_eq!(stream.lines[0].command, Command::ParkFibre { pivot: 3 });
        assert_eq!(stream.lines[1].command, Command::ParkFibre { pivot: 2 });
        assert_eq!(stream.lines[2].command, Command::ParkFibre { pivot: 1 });
        assert_eq!(stream.lines[3].command, Command::MoveFibre { pivot: 1, xf: 5_000, yf: 0, theta: 0.0 });
        assert_eq!(stream.lines[4].command, Command::MoveFibre { pivot: 2, xf: 10_000, yf: 0, theta: 0.0 });
        assert_eq!(stream.lines[5].command, Command::MoveFibre { pivot: 3, xf: 15_000, yf: 0, theta: 0.0 });
        assert_eq!(stream.num_spring_out_parks, Some(0));
    }

    #[test]
    fn already_correct_pivots_are_culled() {
        let mut field = scenarios::special_park_then_place();
        // Pivot 1 (index 0) is already at its target: no round trip needed.
        field.target[0].must_move = MustMove::No;
        let mut graph = CrossoverGraph::from_above_array(field.num_pivots(), &field.above.clone());
        let mut geom = ReferenceGeometry::new(field.num_pivots(), 0, Instrument::InstrB);
        let mut stream = CommandStream::new(&field.current.clone(), field.above.clone());
        run_special(&mut field, &mut graph, &mut geom, clearances(), 0, &mut stream).unwrap();

        assert_eq!(stream.num_parks, 2);
        assert_eq!(stream.num_moves, 2);
    }
}
