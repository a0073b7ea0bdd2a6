//! A deterministic, disc/segment-distance reference `GeometryProvider`.
//!
//! This is not flight geometry — the real collision predicates are an
//! external collaborator per SPEC_FULL.md S1/S4.1. It exists to exercise
//! the Validator and Sequencers against fixtures in tests, the same role
//! the radio-physics simulator in the corpus this was distilled from plays
//! for its own consumers: point-to-segment distance checks against a
//! configurable clearance, not a product-grade geometry kernel.

use delta_types::{Button, Fibre, FibreType, GeometryProvider, Instrument};

#[derive(Debug, Clone)]
pub struct ReferenceGeometry {
    num_pivots: usize,
    num_fiducials: usize,
    instrument: Instrument,
    instrument_name: String,
    telescope_name: String,
    /// Disc radius used for button/button and button/fibre proximity.
    pub button_radius: f64,
    /// Usable plate radius for `on_field`.
    pub plate_radius: f64,
    pub park_may_collide: bool,
    pub fib_ang_variable: bool,
    but_clear: i64,
    fib_clear: i64,
}

impl ReferenceGeometry {
    pub fn new(num_pivots: usize, num_fiducials: usize, instrument: Instrument) -> Self {
        let (instrument_name, telescope_name) = match instrument {
            Instrument::InstrA => ("INSTR-A".to_string(), "AAT".to_string()),
            Instrument::InstrB => ("SIXDF".to_string(), "UKST".to_string()),
        };
        Self {
            num_pivots,
            num_fiducials,
            instrument,
            instrument_name,
            telescope_name,
            button_radius: 400.0,
            plate_radius: 300_000.0,
            park_may_collide: false,
            fib_ang_variable: true,
            but_clear: 0,
            fib_clear: 0,
        }
    }

    /// Minimum distance from point `p` to the segment `a`-`b`.
    fn point_to_segment_dist(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
        let dx = bx - ax;
        let dy = by - ay;
        let len_sq = (dx * dx + dy * dy).max(1e-9);
        let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
        let closest_x = ax + t * dx;
        let closest_y = ay + t * dy;
        (px - closest_x).hypot(py - closest_y)
    }

    /// Approximate minimum distance between two segments by sampling both
    /// endpoints of each against the other segment. Sufficient for a test
    /// fixture's collision fixture, not a production-grade kernel.
    fn segment_to_segment_dist(a1x: f64, a1y: f64, a2x: f64, a2y: f64, b1x: f64, b1y: f64, b2x: f64, b2y: f64) -> f64 {
        let d1 = Self::point_to_segment_dist(a1x, a1y, b1x, b1y, b2x, b2y);
        let d2 = Self::point_to_segment_dist(a2x, a2y, b1x, b1y, b2x, b2y);
        let d3 = Self::point_to_segment_dist(b1x, b1y, a1x, a1y, a2x, a2y);
        let d4 = Self::point_to_segment_dist(b2x, b2y, a1x, a1y, a2x, a2y);
        d1.min(d2).min(d3).min(d4)
    }
}

impl GeometryProvider for ReferenceGeometry {
    fn num_pivots(&self) -> usize {
        self.num_pivots
    }

    fn num_fiducials(&self) -> usize {
        self.num_fiducials
    }

    fn instrument(&self) -> Instrument {
        self.instrument
    }

    fn instrument_name(&self) -> &str {
        &self.instrument_name
    }

    fn telescope_name(&self) -> &str {
        &self.telescope_name
    }

    fn on_field(&self, x: i64, y: i64) -> bool {
        (x as f64).hypot(y as f64) <= self.plate_radius
    }

    fn invalid_position(&self, _plate: u8, _fibre_type: FibreType, _x: i64, _y: i64, _theta: f64) -> bool {
        // The reference fixture has no obstruction map; every on-field
        // position is otherwise valid.
        false
    }

    fn col_but_but(&self, a: Button, b: Button) -> bool {
        let dist = (a.x as f64 - b.x as f64).hypot(a.y as f64 - b.y as f64);
        dist < 2.0 * self.button_radius + self.but_clear as f64
    }

    fn col_but_fib(&self, button: Button, fibre: Fibre) -> bool {
        let dist = Self::point_to_segment_dist(
            button.x as f64,
            button.y as f64,
            fibre.piv_x as f64,
            fibre.piv_y as f64,
            fibre.fvp_x as f64,
            fibre.fvp_y as f64,
        );
        dist < self.button_radius + self.fib_clear as f64
    }

    fn col_fib_fib(&self, a: Fibre, b: Fibre) -> bool {
        let dist = Self::segment_to_segment_dist(
            a.piv_x as f64, a.piv_y as f64, a.fvp_x as f64, a.fvp_y as f64,
            b.piv_x as f64, b.piv_y as f64, b.fvp_x as f64, b.fvp_y as f64,
        );
        dist < self.fib_clear as f64
    }

    fn col_fiducial(&self, _button: Button, fibre: Fibre, fid_x: i64, fid_y: i64) -> bool {
        let dist = Self::point_to_segment_dist(
            fid_x as f64,
            fid_y as f64,
            fibre.piv_x as f64,
            fibre.piv_y as f64,
            fibre.fvp_x as f64,
            fibre.fvp_y as f64,
        );
        dist < self.fib_clear as f64
    }

    fn set_but_clear(&mut self, clearance: i64) {
        self.but_clear = clearance;
    }

    fn set_fib_clear(&mut self, clearance: i64) {
        self.fib_clear = clearance;
    }

    fn park_may_collide(&self) -> bool {
        self.park_may_collide
    }

    fn fib_ang_variable(&self) -> bool {
        self.fib_ang_variable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distant_buttons_do_not_collide() {
        let geom = ReferenceGeometry::new(2, 0, Instrument::InstrA);
        let a = Button { x: 0, y: 0, theta: 0.0 };
        let b = Button { x: 100_000, y: 0, theta: 0.0 };
        assert!(!geom.col_but_but(a, b));
    }

    #[test]
    fn coincident_buttons_collide() {
        let geom = ReferenceGeometry::new(2, 0, Instrument::InstrA);
        let a = Button { x: 0, y: 0, theta: 0.0 };
        let b = Button { x: 10, y: 0, theta: 0.0 };
        assert!(geom.col_but_but(a, b));
    }
}
