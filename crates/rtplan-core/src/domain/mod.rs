pub mod errors;

pub use errors::{GeometryIssue, PlanError, PlanErrorCategory, PlanResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RadiationType {
    #[default]
    Photon,
    Electron,
    Proton,
    Neutron,
    Ion,
}

impl RadiationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Photon => "PHOTON",
            Self::Electron => "ELECTRON",
            Self::Proton => "PROTON",
            Self::Neutron => "NEUTRON",
            Self::Ion => "ION",
        }
    }
}

impl Display for RadiationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GantryDirection {
    Cw,
    Ccw,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlcPositions {
    #[serde(default)]
    pub bank_a: Vec<f64>,
    #[serde(default)]
    pub bank_b: Vec<f64>,
}

impl MlcPositions {
    pub fn new(bank_a: Vec<f64>, bank_b: Vec<f64>) -> Self {
        Self { bank_a, bank_b }
    }

    /// Number of leaf pairs both banks agree on.
    pub fn pair_count(&self) -> usize {
        self.bank_a.len().min(self.bank_b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.pair_count() == 0
    }

    pub fn gap(&self, pair: usize) -> f64 {
        self.bank_b[pair] - self.bank_a[pair]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JawPositions {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

impl JawPositions {
    pub const fn new(x1: f64, x2: f64, y1: f64, y2: f64) -> Self {
        Self { x1, x2, y1, y2 }
    }

    /// X opening, or `None` when the jaw pair was not recorded (both zero).
    pub fn x_opening(&self) -> Option<(f64, f64)> {
        recorded_opening(self.x1, self.x2)
    }

    /// Y opening, or `None` when the jaw pair was not recorded (both zero).
    pub fn y_opening(&self) -> Option<(f64, f64)> {
        recorded_opening(self.y1, self.y2)
    }
}

fn recorded_opening(low: f64, high: f64) -> Option<(f64, f64)> {
    if low == 0.0 && high == 0.0 {
        None
    } else {
        Some((low, high))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPoint {
    pub index: usize,
    #[serde(default)]
    pub gantry_angle: f64,
    #[serde(default)]
    pub gantry_rotation_direction: GantryDirection,
    #[serde(default)]
    pub collimator_angle: f64,
    #[serde(default)]
    pub cumulative_meterset_weight: f64,
    #[serde(rename = "mlc", default)]
    pub mlc: MlcPositions,
    #[serde(rename = "jaw", default)]
    pub jaws: JawPositions,
    #[serde(default)]
    pub couch_angle: Option<f64>,
}

impl ControlPoint {
    pub fn new(
        index: usize,
        gantry_angle: f64,
        cumulative_meterset_weight: f64,
        mlc: MlcPositions,
        jaws: JawPositions,
    ) -> Self {
        Self {
            index,
            gantry_angle,
            gantry_rotation_direction: GantryDirection::None,
            collimator_angle: 0.0,
            cumulative_meterset_weight,
            mlc,
            jaws,
            couch_angle: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beam {
    #[serde(default)]
    pub number: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub radiation_type: RadiationType,
    #[serde(default)]
    pub energy_label: Option<String>,
    #[serde(default)]
    pub nominal_energy: Option<f64>,
    pub control_points: Vec<ControlPoint>,
    #[serde(default)]
    pub leaf_widths: Vec<f64>,
    #[serde(default)]
    pub leaf_boundaries: Vec<f64>,
    #[serde(rename = "numberOfLeaves", default)]
    pub number_of_leaf_pairs: usize,
    #[serde(rename = "beamMU", default)]
    pub beam_mu: Option<f64>,
    #[serde(default)]
    pub is_arc: bool,
    #[serde(default)]
    pub gantry_angle_start: f64,
    #[serde(default)]
    pub gantry_angle_end: f64,
}

impl Beam {
    pub fn new(number: i32, name: impl Into<String>, control_points: Vec<ControlPoint>) -> Self {
        let gantry_angle_start = control_points.first().map_or(0.0, |cp| cp.gantry_angle);
        let gantry_angle_end = control_points.last().map_or(0.0, |cp| cp.gantry_angle);
        Self {
            number,
            name: name.into(),
            control_points,
            gantry_angle_start,
            gantry_angle_end,
            ..Self::default()
        }
    }

    pub fn with_leaf_widths(mut self, leaf_widths: Vec<f64>) -> Self {
        self.number_of_leaf_pairs = leaf_widths.len();
        self.leaf_widths = leaf_widths;
        self
    }

    pub fn with_leaf_boundaries(mut self, leaf_boundaries: Vec<f64>) -> Self {
        self.leaf_widths = leaf_boundaries
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).abs())
            .collect();
        self.number_of_leaf_pairs = self.leaf_widths.len();
        self.leaf_boundaries = leaf_boundaries;
        self
    }

    pub fn with_mu(mut self, beam_mu: f64) -> Self {
        self.beam_mu = Some(beam_mu);
        self
    }

    pub fn with_arc(mut self, is_arc: bool) -> Self {
        self.is_arc = is_arc;
        self
    }

    /// Beam MU, with unset or non-finite values read as 0.
    pub fn mu(&self) -> f64 {
        self.beam_mu
            .filter(|mu| mu.is_finite() && *mu > 0.0)
            .unwrap_or(0.0)
    }

    /// Weight used for plan-level aggregation: beam MU, or 1 when unset.
    pub fn mu_weight(&self) -> f64 {
        let mu = self.mu();
        if mu > 0.0 { mu } else { 1.0 }
    }

    /// Leaf pairs declared by the plan, falling back to the width list and
    /// then to the machine default.
    pub fn declared_leaf_pairs(&self, default_pairs: usize) -> usize {
        if self.number_of_leaf_pairs > 0 {
            self.number_of_leaf_pairs
        } else if !self.leaf_widths.is_empty() {
            self.leaf_widths.len()
        } else {
            default_pairs
        }
    }

    /// Electron beams and beams without any bank data have no MLC metrics.
    pub fn has_mlc_data(&self) -> bool {
        self.radiation_type != RadiationType::Electron
            && self.control_points.iter().any(|cp| !cp.mlc.is_empty())
    }

    pub fn is_fff(&self) -> bool {
        self.energy_label
            .as_deref()
            .is_some_and(|label| label.to_ascii_uppercase().contains("FFF"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Technique {
    Vmat,
    Imrt,
    Conformal,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    #[serde(default)]
    pub label: String,
    pub beams: Vec<Beam>,
    #[serde(default)]
    pub prescribed_dose: Option<f64>,
    #[serde(default)]
    pub dose_per_fraction: Option<f64>,
    #[serde(default)]
    pub number_of_fractions: Option<u32>,
}

impl Plan {
    pub fn new(label: impl Into<String>, beams: Vec<Beam>) -> Self {
        Self {
            label: label.into(),
            beams,
            ..Self::default()
        }
    }

    pub fn total_mu(&self) -> f64 {
        self.beams.iter().map(Beam::mu).sum()
    }

    pub fn technique(&self) -> Technique {
        if self.beams.is_empty() {
            return Technique::Unknown;
        }

        let has_arcs = self.beams.iter().any(|beam| beam.is_arc);
        let has_sequences = self.beams.iter().any(|beam| beam.control_points.len() > 2);
        match (has_arcs, has_sequences) {
            (true, true) => Technique::Vmat,
            (false, true) => Technique::Imrt,
            _ => Technique::Conformal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    #[serde(default)]
    pub number: Option<i32>,
    #[serde(default)]
    pub contours: Vec<Contour>,
}

impl Structure {
    pub fn new(name: impl Into<String>, contours: Vec<Contour>) -> Self {
        Self {
            name: name.into(),
            number: None,
            contours,
        }
    }

    pub fn point_count(&self) -> usize {
        self.contours.iter().map(|contour| contour.points.len()).sum()
    }

    pub fn points(&self) -> impl Iterator<Item = &[f64; 3]> {
        self.contours.iter().flat_map(|contour| contour.points.iter())
    }
}

/// Rejects structurally invalid plans. Everything else is recovered by the
/// engine itself.
pub fn validate_plan(plan: &Plan) -> PlanResult<()> {
    for beam in &plan.beams {
        if beam.control_points.is_empty() {
            return Err(PlanError::input_validation(
                "INPUT.BEAM_CONTROL_POINTS",
                format!(
                    "beam {} ('{}') has no control point sequence",
                    beam.number, beam.name
                ),
            ));
        }

        if let Some(mu) = beam.beam_mu.filter(|mu| !mu.is_finite() || *mu < 0.0) {
            return Err(PlanError::input_validation(
                "INPUT.BEAM_MU",
                format!("beam {} has invalid meterset {}", beam.number, mu),
            ));
        }
    }

    Ok(())
}
