use serde::{Deserialize, Serialize};

/// The two fibre classes a pivot may carry. Guide fibres and object fibres
/// use different clearance and bend-angle limits throughout the Validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FibreType {
    #[default]
    Guide,
    Object,
}

/// Whether a pivot's target configuration requires it to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MustMove {
    #[default]
    No,
    Yes,
    IfNeeded,
}

/// The instrument a plan is being generated for. Selected once, at process
/// activation, from the task/queue name the request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instrument {
    /// General positioner: fibres may be re-arranged in place.
    InstrA,
    /// Furthest-first / park-first positioner (6dF-style).
    InstrB,
}

impl Instrument {
    /// Names beginning with `SIXDF` configure INSTR-B, otherwise INSTR-A.
    pub fn from_task_name(name: &str) -> Self {
        if name.starts_with("SIXDF") {
            Instrument::InstrB
        } else {
            Instrument::InstrA
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, Instrument::InstrB)
    }
}

/// Immutable-during-a-plan per-pivot constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotConstants {
    pub t_park: f64,
    pub x_park: i64,
    pub y_park: i64,
    pub x_piv: i64,
    pub y_piv: i64,
    pub fibre_type: FibreType,
    pub in_use: bool,
    pub grasp_x: i64,
    pub grasp_y: i64,
    pub max_ext: i64,
}

/// The interim state the Sequencer mutates to simulate execution, starting
/// from the real current configuration. Crossing counts are not stored
/// here — they live in the `CrossoverGraph`, whose adjacency vector
/// lengths are the counts (see SPEC_FULL.md S9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPivot {
    pub theta: f64,
    pub fibre_length: f64,
    pub fvp_x: i64,
    pub fvp_y: i64,
    pub xf: i64,
    pub yf: i64,
    pub xb: i64,
    pub yb: i64,
    pub parked: bool,
}

/// The target configuration. Mutated by the Sequencer only to record that
/// a pivot's move has been accounted for (`must_move` cleared).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPivot {
    pub theta: f64,
    pub fibre_length: f64,
    pub fvp_x: i64,
    pub fvp_y: i64,
    pub xf: i64,
    pub yf: i64,
    pub must_move: MustMove,
    pub parked: bool,
}

/// A survey reference mark on the plate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fiducial {
    pub xf: i64,
    pub yf: i64,
    pub in_use: bool,
}

/// Offsets read but not consumed by the planning core itself; retained for
/// the downstream executor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotOffsets {
    pub x_off_pl: i64,
    pub y_off_pl: i64,
    pub x_off_fr_pk: i64,
    pub y_off_fr_pk: i64,
    pub x_off_to_pk: i64,
    pub y_off_to_pk: i64,
}

fn default_above() -> Vec<i64> {
    vec![0]
}

/// Owns the full per-pivot and per-fiducial arrays for one plan. All arrays
/// are indexed 0-based by pivot/fiducial number throughout the CORE; the
/// 1-based convention only appears at the exchange boundary (command lines,
/// the `above` array).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldData {
    pub constants: Vec<PivotConstants>,
    pub current: Vec<CurrentPivot>,
    pub target: Vec<TargetPivot>,
    #[serde(default)]
    pub offsets: Vec<PivotOffsets>,
    #[serde(default)]
    pub fiducials: Vec<Fiducial>,
    /// The current crossover graph, in the flat exchange-format `above`
    /// array (SPEC_FULL.md S4.2). Travels alongside `current` since
    /// crossings are a property of the starting configuration.
    #[serde(default = "default_above")]
    pub above: Vec<i64>,
}

impl FieldData {
    pub fn num_pivots(&self) -> usize {
        self.constants.len()
    }

    pub fn num_fiducials(&self) -> usize {
        self.fiducials.len()
    }

    /// Straight-line distance between two pivots' anchor points.
    pub fn pivot_dist(&self, i: usize, j: usize) -> f64 {
        let dx = (self.constants[i].x_piv - self.constants[j].x_piv) as f64;
        let dy = (self.constants[i].y_piv - self.constants[j].y_piv) as f64;
        dx.hypot(dy)
    }
}

/// The flag word recognized on a GENERATE request, decoded from the flag
/// name list in the exchange format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFlags {
    pub debug: bool,
    pub display: bool,
    pub no_field_check: bool,
    pub no_order_check: bool,
    pub no_delta: bool,
    pub check_full_field: bool,
    pub special: bool,
}

impl GenerateFlags {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, crate::DeltaError> {
        let mut flags = GenerateFlags::default();
        for name in names {
            match name.as_ref() {
                "DEBUG" => flags.debug = true,
                "DISPLAY" => flags.display = true,
                "NO_FIELD_CHECK" => flags.no_field_check = true,
                "NO_ORDER_CHECK" => {
                    return Err(crate::DeltaError::InvalidArgument(
                        "NO_ORDER_CHECK is not supported".to_string(),
                    ))
                }
                "NO_DELTA" => flags.no_delta = true,
                "CHECK_FULL_FIELD" => flags.check_full_field = true,
                "SPECIAL" => flags.special = true,
                other => {
                    return Err(crate::DeltaError::InvalidArgument(format!(
                        "unrecognized flag: {other}"
                    )))
                }
            }
        }
        Ok(flags)
    }
}

/// The decoded GENERATE request: scalar thresholds, flags, and the five
/// field structures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// 0 means "read per-pivot maxExt from Constants instead".
    pub max_fib_ext: i64,
    pub max_but_ang_g: f64,
    pub max_piv_ang_g: f64,
    pub max_but_ang_o: f64,
    pub max_piv_ang_o: f64,
    pub but_clear_g: i64,
    pub fib_clear_g: i64,
    pub but_clear_o: i64,
    pub fib_clear_o: i64,
    pub flags: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ext_spring_out: Option<i64>,
    pub field: FieldData,
}

impl GenerateRequest {
    /// Decode the recognized flag-name list, rejecting `NO_ORDER_CHECK`
    /// and any unknown flag as `INVALID_ARGUMENT` (SPEC_FULL.md S6).
    pub fn parsed_flags(&self) -> Result<GenerateFlags, crate::DeltaError> {
        GenerateFlags::from_names(&self.flags)
    }

    /// The clearance parameters, bundled for the Validator and General
    /// Sequencer's predicate calls.
    pub fn clearances(&self) -> ClearanceParams {
        ClearanceParams {
            but_clear_g: self.but_clear_g,
            fib_clear_g: self.fib_clear_g,
            but_clear_o: self.but_clear_o,
            fib_clear_o: self.fib_clear_o,
        }
    }

    /// The bend-angle limits, bundled for the Validator's pass 4.
    pub fn bend_angle_limits(&self) -> BendAngleLimits {
        BendAngleLimits {
            max_but_ang_g: self.max_but_ang_g,
            max_piv_ang_g: self.max_piv_ang_g,
            max_but_ang_o: self.max_but_ang_o,
            max_piv_ang_o: self.max_piv_ang_o,
        }
    }
}

/// Guide/object clearance pad values consulted before each collision
/// predicate call (SPEC_FULL.md S4.1, S4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearanceParams {
    pub but_clear_g: i64,
    pub fib_clear_g: i64,
    pub but_clear_o: i64,
    pub fib_clear_o: i64,
}

impl ClearanceParams {
    /// The button/button clearance for a pair of fibre types: guide if
    /// either endpoint is a guide fibre, else object (SPEC_FULL.md S4.3
    /// pass 1).
    pub fn button(&self, a: FibreType, b: FibreType) -> i64 {
        if a == FibreType::Guide || b == FibreType::Guide {
            self.but_clear_g
        } else {
            self.but_clear_o
        }
    }

    /// The fibre-side clearance for a single fibre's own type
    /// (SPEC_FULL.md S4.3 pass 2).
    pub fn fibre(&self, t: FibreType) -> i64 {
        match t {
            FibreType::Guide => self.fib_clear_g,
            FibreType::Object => self.fib_clear_o,
        }
    }
}

/// Guide/object bend-angle maxima consulted in Validator pass 4
/// (SPEC_FULL.md S4.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BendAngleLimits {
    pub max_but_ang_g: f64,
    pub max_piv_ang_g: f64,
    pub max_but_ang_o: f64,
    pub max_piv_ang_o: f64,
}

impl BendAngleLimits {
    pub fn button_limit(&self, t: FibreType) -> f64 {
        match t {
            FibreType::Guide => self.max_but_ang_g,
            FibreType::Object => self.max_but_ang_o,
        }
    }

    pub fn pivot_limit(&self, t: FibreType) -> f64 {
        match t {
            FibreType::Guide => self.max_piv_ang_g,
            FibreType::Object => self.max_piv_ang_o,
        }
    }
}
