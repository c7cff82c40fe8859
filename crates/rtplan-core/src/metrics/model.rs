use crate::delivery::LimitingFactor;
use crate::domain::{RadiationType, Technique};
use crate::geometry::SmallApertureFlags;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPointMetrics {
    pub index: usize,
    pub gantry_angle: f64,
    /// Meterset fraction delivered since the previous control point.
    pub meterset_weight: f64,
    /// mm².
    pub aperture_area: f64,
    /// mm.
    pub aperture_perimeter: f64,
    /// mm².
    pub jaw_area: f64,
    /// Travel of every leaf since the previous control point, mm.
    pub leaf_travel: f64,
    pub small_aperture_flags: SmallApertureFlags,
    #[serde(rename = "AM", default)]
    pub aperture_modulation: Option<f64>,
}

/// Complexity and deliverability indices of one beam.
///
/// MLC-derived indices are `None` for beams that carry no leaf data
/// (electron beams and jaw-only fields).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeamMetrics {
    pub beam_number: i32,
    pub beam_name: String,
    pub radiation_type: RadiationType,
    #[serde(rename = "beamMU")]
    pub beam_mu: f64,
    pub number_of_control_points: usize,

    #[serde(rename = "MCS")]
    pub mcs: Option<f64>,
    #[serde(rename = "LSV")]
    pub lsv: Option<f64>,
    #[serde(rename = "AAV")]
    pub aav: Option<f64>,
    /// Union aperture `A_max`, mm².
    pub union_aperture_area: Option<f64>,
    #[serde(rename = "MFA")]
    pub mfa: Option<f64>,
    #[serde(rename = "LT")]
    pub lt: Option<f64>,
    #[serde(rename = "LTMCS")]
    pub ltmcs: Option<f64>,
    #[serde(rename = "LG")]
    pub lg: Option<f64>,
    #[serde(rename = "MAD")]
    pub mad: Option<f64>,
    #[serde(rename = "EFS")]
    pub efs: Option<f64>,
    pub psmall: Option<f64>,
    #[serde(rename = "MUCA")]
    pub muca: f64,
    #[serde(rename = "LTMU")]
    pub ltmu: Option<f64>,
    #[serde(rename = "LTNLMU")]
    pub ltnlmu: Option<f64>,
    #[serde(rename = "LNA")]
    pub lna: Option<f64>,
    #[serde(rename = "NL")]
    pub nl: Option<f64>,
    #[serde(rename = "LTAL")]
    pub ltal: Option<f64>,
    #[serde(rename = "mDRV")]
    pub mdrv: Option<f64>,
    #[serde(rename = "GT")]
    pub gt: Option<f64>,
    #[serde(rename = "GS")]
    pub gs: Option<f64>,
    #[serde(rename = "mGSV")]
    pub mgsv: Option<f64>,
    #[serde(rename = "LS")]
    pub ls: Option<f64>,
    #[serde(rename = "PA")]
    pub pa: Option<f64>,
    #[serde(rename = "JA")]
    pub ja: f64,
    #[serde(rename = "PM")]
    pub pm: Option<f64>,
    #[serde(rename = "TG")]
    pub tg: Option<f64>,
    #[serde(rename = "MD")]
    pub md: Option<f64>,
    #[serde(rename = "MI")]
    pub mi: Option<f64>,
    #[serde(rename = "SAS5")]
    pub sas5: Option<f64>,
    #[serde(rename = "SAS10")]
    pub sas10: Option<f64>,
    #[serde(rename = "EM")]
    pub em: Option<f64>,
    #[serde(rename = "PI")]
    pub pi: Option<f64>,
    #[serde(rename = "BAM")]
    pub bam: Option<f64>,

    pub arc_length: Option<f64>,
    pub average_gantry_speed: Option<f64>,
    /// Seconds.
    pub estimated_delivery_time: f64,
    #[serde(rename = "MUperDegree")]
    pub mu_per_degree: Option<f64>,
    pub avg_dose_rate: f64,
    pub avg_mlc_speed: f64,
    pub limiting_factor: Option<LimitingFactor>,
    pub collimator_angle_start: Option<f64>,
    pub collimator_angle_end: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub control_point_metrics: Vec<ControlPointMetrics>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetrics {
    pub plan_label: String,
    pub technique: Option<Technique>,
    #[serde(rename = "totalMU")]
    pub total_mu: f64,
    pub prescribed_dose: Option<f64>,
    pub dose_per_fraction: Option<f64>,
    pub number_of_fractions: Option<u32>,
    #[serde(rename = "MUperGy")]
    pub mu_per_gy: Option<f64>,

    #[serde(rename = "MCS")]
    pub mcs: f64,
    #[serde(rename = "LSV")]
    pub lsv: f64,
    #[serde(rename = "AAV")]
    pub aav: f64,
    #[serde(rename = "MFA")]
    pub mfa: f64,
    #[serde(rename = "LT")]
    pub lt: f64,
    #[serde(rename = "LTMCS")]
    pub ltmcs: f64,
    #[serde(rename = "LG")]
    pub lg: Option<f64>,
    #[serde(rename = "MAD")]
    pub mad: Option<f64>,
    #[serde(rename = "EFS")]
    pub efs: Option<f64>,
    pub psmall: Option<f64>,
    #[serde(rename = "MUCA")]
    pub muca: Option<f64>,
    #[serde(rename = "LTMU")]
    pub ltmu: Option<f64>,
    #[serde(rename = "LTNLMU")]
    pub ltnlmu: Option<f64>,
    #[serde(rename = "LNA")]
    pub lna: Option<f64>,
    #[serde(rename = "NL")]
    pub nl: Option<f64>,
    #[serde(rename = "LTAL")]
    pub ltal: Option<f64>,
    #[serde(rename = "mDRV")]
    pub mdrv: Option<f64>,
    #[serde(rename = "GT")]
    pub gt: Option<f64>,
    #[serde(rename = "GS")]
    pub gs: Option<f64>,
    #[serde(rename = "mGSV")]
    pub mgsv: Option<f64>,
    #[serde(rename = "LS")]
    pub ls: Option<f64>,
    #[serde(rename = "PA")]
    pub pa: Option<f64>,
    #[serde(rename = "JA")]
    pub ja: Option<f64>,
    #[serde(rename = "PM")]
    pub pm: Option<f64>,
    #[serde(rename = "TG")]
    pub tg: Option<f64>,
    #[serde(rename = "MD")]
    pub md: Option<f64>,
    #[serde(rename = "MI")]
    pub mi: Option<f64>,
    #[serde(rename = "SAS5")]
    pub sas5: Option<f64>,
    #[serde(rename = "SAS10")]
    pub sas10: Option<f64>,
    #[serde(rename = "EM")]
    pub em: Option<f64>,
    #[serde(rename = "PI")]
    pub pi: Option<f64>,
    #[serde(rename = "PAM")]
    pub pam: Option<f64>,
    /// Seconds.
    pub total_delivery_time: Option<f64>,

    pub beam_metrics: Vec<BeamMetrics>,
}

impl PlanMetrics {
    pub fn beam(&self, beam_number: i32) -> Option<&BeamMetrics> {
        self.beam_metrics
            .iter()
            .find(|metrics| metrics.beam_number == beam_number)
    }

    /// Drops the per-control-point detail from every beam.
    pub fn without_control_points(mut self) -> Self {
        for beam in &mut self.beam_metrics {
            beam.control_point_metrics.clear();
        }
        self
    }
}
