use crate::model::{FibreType, Instrument};

/// A button's pose: its physical end-cap position and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Button {
    pub x: i64,
    pub y: i64,
    pub theta: f64,
}

/// A fibre ray: the mechanical pivot anchor plus the fibre-end ("virtual
/// pivot") position it currently reaches to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fibre {
    pub piv_x: i64,
    pub piv_y: i64,
    pub fvp_x: i64,
    pub fvp_y: i64,
}

/// Per-instrument geometric predicates. The CORE is polymorphic over this
/// capability set; the low-level collision math itself is an external
/// collaborator (see SPEC_FULL.md S1, S4.1).
///
/// `set_but_clear`/`set_fib_clear` configure the clearance pad used by the
/// next `col_*` call on this provider. Callers must treat a
/// `set_*_clear` followed by exactly one predicate call as a single
/// sequence and never interleave predicate calls from two different
/// contexts against one provider instance.
pub trait GeometryProvider {
    fn num_pivots(&self) -> usize;
    fn num_fiducials(&self) -> usize;
    fn instrument(&self) -> Instrument;
    fn instrument_name(&self) -> &str;
    fn telescope_name(&self) -> &str;

    fn on_field(&self, x: i64, y: i64) -> bool;
    fn invalid_position(&self, plate: u8, fibre_type: FibreType, x: i64, y: i64, theta: f64) -> bool;

    fn col_but_but(&self, a: Button, b: Button) -> bool;
    fn col_but_fib(&self, button: Button, fibre: Fibre) -> bool;
    fn col_fib_fib(&self, a: Fibre, b: Fibre) -> bool;
    /// Does the button+fibre of one pivot obstruct the fiducial at
    /// `(fid_x, fid_y)`?
    fn col_fiducial(&self, button: Button, fibre: Fibre, fid_x: i64, fid_y: i64) -> bool;

    fn set_but_clear(&mut self, clearance: i64);
    fn set_fib_clear(&mut self, clearance: i64);

    /// Whether parked fibres can still collide with moving ones. The
    /// Sequencer's own behavior is additionally gated by a configurable
    /// override — see `ParkMayCollideOverride` and SPEC_FULL.md S9.
    fn park_may_collide(&self) -> bool;

    /// Whether the button/fibre bend-angle check is meaningful for this
    /// instrument.
    fn fib_ang_variable(&self) -> bool;
}

/// The configurable override for the Sequencer's park-may-collide
/// decision. The legacy source hard-coded this to "off"; this
/// specification resolves the open question by exposing it as
/// configuration rather than a constant (SPEC_FULL.md S9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParkMayCollideOverride {
    /// Use the Geometry Provider's own answer unmodified.
    Inherit,
    ForceTrue,
    #[default]
    ForceFalse,
}

impl ParkMayCollideOverride {
    pub fn resolve(&self, provider_answer: bool) -> bool {
        match self {
            ParkMayCollideOverride::Inherit => provider_answer,
            ParkMayCollideOverride::ForceTrue => true,
            ParkMayCollideOverride::ForceFalse => false,
        }
    }
}
