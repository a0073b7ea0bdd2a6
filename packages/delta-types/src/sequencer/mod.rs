//! The two Sequencer variants (SPEC_FULL.md S4.4, S4.5): General (INSTR-A)
//! and Special (INSTR-B). Both simulate execution against an interim
//! `Current` state, mutate the Crossover Graph as moves commit, and append
//! to a `CommandStream`.

pub mod general;
pub mod special;

pub use general::run_general;
pub use special::run_special;

/// A pivot may be parked at most this many times per plan; a second
/// attempt is `PLAN_INCONSISTENT` (SPEC_FULL.md S4.4).
pub const MAX_PARKS: u8 = 1;

/// `DELTA_PROG` computation constants (SPEC_FULL.md S5).
pub const PROGRESS_SCALE: f64 = 0.25;
pub const PROGRESS_RESOLUTION: f64 = 3.0;

/// `100 * (numMoves + numParks) / (numMoves + numParks + pivotsLeft * SCALE)`.
/// A plan with nothing left to do and nothing done yet (the trivial
/// identity plan) reports 100%.
pub fn compute_progress(num_moves: u32, num_parks: u32, pivots_left: i64) -> f64 {
    let done = (num_moves + num_parks) as f64;
    let denom = done + (pivots_left.max(0) as f64) * PROGRESS_SCALE;
    if denom <= 0.0 {
        100.0
    } else {
        100.0 * done / denom
    }
}

/// Tracks the last published `DELTA_PROG` value and decides when a new
/// value has moved far enough to republish (SPEC_FULL.md S5, S10.1).
pub struct ProgressTracker {
    last_published: f64,
    published_anything: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self { last_published: 0.0, published_anything: false }
    }

    /// Returns `Some(value)` if this progress reading should be published:
    /// the first reading, a move of more than `PROGRESS_RESOLUTION` points
    /// since the last publish, or reaching exactly 100.0.
    pub fn update(&mut self, num_moves: u32, num_parks: u32, pivots_left: i64) -> Option<f64> {
        let value = compute_progress(num_moves, num_parks, pivots_left);
        let should_publish = !self.published_anything
            || (value - self.last_published).abs() > PROGRESS_RESOLUTION
            || value >= 100.0;
        if should_publish {
            self.last_published = value;
            self.published_anything = true;
            tracing::debug!(progress = value, num_moves, num_parks, pivots_left, "DELTA_PROG update");
            Some(value)
        } else {
            None
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
