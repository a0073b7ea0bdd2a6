//! Shared data model and planning core for the fibre-positioner delta
//! planner: the Field Data Model, the Crossover Graph, the Command Stream,
//! the Geometry Provider interface, the fixed error taxonomy, the Field
//! Validator, the two Sequencer variants, and the Action Driver that ties
//! them together.

pub mod angles;
pub mod command;
pub mod crossover;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod model;
pub mod sequencer;
pub mod validator;

pub use command::{Command, CommandLine, CommandStream};
pub use crossover::CrossoverGraph;
pub use driver::{generate, DriverOutcome};
pub use error::{DeltaError, DeltaResult};
pub use geometry::{Button, Fibre, GeometryProvider, ParkMayCollideOverride};
pub use model::{
    BendAngleLimits, ClearanceParams, CurrentPivot, FibreType, FieldData, Fiducial,
    GenerateFlags, GenerateRequest, Instrument, MustMove, PivotConstants, PivotOffsets,
    TargetPivot,
};
pub use sequencer::{compute_progress, run_general, run_special, ProgressTracker, MAX_PARKS};
pub use validator::validate;
