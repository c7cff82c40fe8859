//! Delivery-time estimate from machine speed limits.
//!
//! Every transition between control points is bounded by three limits: the
//! dose rate, the gantry speed (arcs only) and the fastest leaf. The slowest
//! of them sets the segment time.

use crate::common::MachineProfile;
use crate::common::constants::SECONDS_PER_MINUTE;
use crate::domain::{Beam, ControlPoint, GeometryIssue};
use crate::numerics::{angular_distance_deg, mean_abs_first_difference, ratio_or, stable_sum};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitingFactor {
    DoseRate,
    GantrySpeed,
    MlcSpeed,
}

impl LimitingFactor {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DoseRate => "doseRate",
            Self::GantrySpeed => "gantrySpeed",
            Self::MlcSpeed => "mlcSpeed",
        }
    }

    /// Picks the binding limit; ties resolve dose rate first, then gantry.
    fn binding(dose_rate: f64, gantry: f64, mlc: f64) -> Self {
        if dose_rate >= gantry && dose_rate >= mlc {
            Self::DoseRate
        } else if gantry >= mlc {
            Self::GantrySpeed
        } else {
            Self::MlcSpeed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTiming {
    pub mu: f64,
    pub gantry_travel: f64,
    pub max_leaf_travel: f64,
    pub total_leaf_travel: f64,
    pub time: f64,
    pub limit: LimitingFactor,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeliveryEstimate {
    /// Seconds.
    pub total_time: f64,
    pub limiting_factor: Option<LimitingFactor>,
    /// MU/min.
    pub avg_dose_rate: f64,
    /// mm/s per leaf pair.
    pub avg_mlc_speed: f64,
    pub arc_length: Option<f64>,
    pub avg_gantry_speed: Option<f64>,
    pub mu_per_degree: Option<f64>,
    pub dose_rate_variation: Option<f64>,
    pub gantry_speed_variation: Option<f64>,
    pub segments: Vec<SegmentTiming>,
}

impl DeliveryEstimate {
    pub fn total_leaf_travel(&self) -> f64 {
        let travel: Vec<f64> = self
            .segments
            .iter()
            .map(|segment| segment.total_leaf_travel)
            .collect();
        stable_sum(&travel)
    }
}

pub fn estimate_delivery(beam: &Beam, profile: &MachineProfile) -> DeliveryEstimate {
    if beam.control_points.len() < 2 {
        return DeliveryEstimate::default();
    }

    let beam_mu = beam.mu();
    let dose_rate_per_second = profile.dose_rate_for(beam.is_fff()) / SECONDS_PER_MINUTE;

    let segments: Vec<SegmentTiming> = beam
        .control_points
        .windows(2)
        .map(|window| {
            time_segment(
                &window[0],
                &window[1],
                beam_mu,
                beam.is_arc,
                dose_rate_per_second,
                profile,
            )
        })
        .collect();

    let mut limit_times = [0.0_f64; 3];
    for segment in &segments {
        limit_times[segment.limit as usize] += segment.time;
    }
    let limiting_factor = LimitingFactor::binding(limit_times[0], limit_times[1], limit_times[2]);

    let times: Vec<f64> = segments.iter().map(|segment| segment.time).collect();
    let total_time = stable_sum(&times);

    let arc_length = beam.is_arc.then(|| {
        let travel: Vec<f64> = segments.iter().map(|segment| segment.gantry_travel).collect();
        stable_sum(&travel)
    });
    let leaf_pairs = beam.declared_leaf_pairs(profile.default_leaf_pairs) as f64;

    let mut estimate = DeliveryEstimate {
        total_time,
        limiting_factor: Some(limiting_factor),
        avg_dose_rate: ratio_or(beam_mu, total_time, 0.0) * SECONDS_PER_MINUTE,
        avg_mlc_speed: 0.0,
        arc_length,
        avg_gantry_speed: arc_length
            .filter(|arc| *arc > 0.0 && total_time > 0.0)
            .map(|arc| arc / total_time),
        mu_per_degree: arc_length
            .filter(|arc| *arc > 0.0)
            .map(|arc| beam_mu / arc),
        dose_rate_variation: None,
        gantry_speed_variation: None,
        segments,
    };
    estimate.avg_mlc_speed = ratio_or(
        ratio_or(estimate.total_leaf_travel(), total_time, 0.0),
        leaf_pairs,
        0.0,
    );

    let timed: Vec<&SegmentTiming> = estimate
        .segments
        .iter()
        .filter(|segment| segment.time > 0.0)
        .collect();
    let dose_rates: Vec<f64> = timed
        .iter()
        .map(|segment| segment.mu / segment.time * SECONDS_PER_MINUTE)
        .collect();
    estimate.dose_rate_variation = mean_abs_first_difference(&dose_rates);

    if beam.is_arc {
        let gantry_speeds: Vec<f64> = timed
            .iter()
            .filter(|segment| segment.gantry_travel > 0.0)
            .map(|segment| segment.gantry_travel / segment.time)
            .collect();
        estimate.gantry_speed_variation = mean_abs_first_difference(&gantry_speeds);
    }

    estimate
}

fn time_segment(
    previous: &ControlPoint,
    current: &ControlPoint,
    beam_mu: f64,
    is_arc: bool,
    dose_rate_per_second: f64,
    profile: &MachineProfile,
) -> SegmentTiming {
    let weight = (current.cumulative_meterset_weight - previous.cumulative_meterset_weight).max(0.0);
    let mu = weight * beam_mu;
    let gantry_travel = angular_distance_deg(previous.gantry_angle, current.gantry_angle);
    let gantry_travel = if gantry_travel.is_finite() {
        gantry_travel
    } else {
        debug!(
            issue = %GeometryIssue::MalformedGeometry,
            control_point = current.index,
            "non-finite gantry angle; segment counted without gantry travel"
        );
        0.0
    };

    let pairs = previous.mlc.pair_count().min(current.mlc.pair_count());
    let mut max_leaf_travel = 0.0_f64;
    let mut total_leaf_travel = 0.0;
    for pair in 0..pairs {
        for travel in [
            (current.mlc.bank_a[pair] - previous.mlc.bank_a[pair]).abs(),
            (current.mlc.bank_b[pair] - previous.mlc.bank_b[pair]).abs(),
        ] {
            if travel.is_finite() {
                max_leaf_travel = max_leaf_travel.max(travel);
                total_leaf_travel += travel;
            }
        }
    }

    let dose_rate_time = mu / dose_rate_per_second;
    let gantry_time = if is_arc {
        gantry_travel / profile.max_gantry_speed
    } else {
        0.0
    };
    let mlc_time = max_leaf_travel / profile.max_mlc_speed;

    SegmentTiming {
        mu,
        gantry_travel,
        max_leaf_travel,
        total_leaf_travel,
        time: dose_rate_time.max(gantry_time).max(mlc_time),
        limit: LimitingFactor::binding(dose_rate_time, gantry_time, mlc_time),
    }
}

#[cfg(test)]
mod tests {
    use super::{LimitingFactor, estimate_delivery};
    use crate::common::MachineProfile;
    use crate::domain::{Beam, ControlPoint, JawPositions, MlcPositions};

    fn control_point(index: usize, gantry: f64, weight: f64, bank_a: f64) -> ControlPoint {
        ControlPoint::new(
            index,
            gantry,
            weight,
            MlcPositions::new(vec![bank_a, -5.0], vec![5.0, 5.0]),
            JawPositions::new(-50.0, 50.0, -50.0, 50.0),
        )
    }

    #[test]
    fn single_control_point_has_no_delivery() {
        let beam = Beam::new(1, "Static", vec![control_point(0, 0.0, 1.0, -5.0)]).with_mu(100.0);
        let estimate = estimate_delivery(&beam, &MachineProfile::default());
        assert_eq!(estimate.total_time, 0.0);
        assert_eq!(estimate.limiting_factor, None);
    }

    #[test]
    fn dose_rate_bound_segments_sum_mu_over_rate() {
        let beam = Beam::new(
            1,
            "Step",
            vec![
                control_point(0, 0.0, 0.0, -5.0),
                control_point(1, 0.0, 0.5, -5.0),
                control_point(2, 0.0, 1.0, -5.0),
            ],
        )
        .with_mu(200.0);
        let estimate = estimate_delivery(&beam, &MachineProfile::default());
        assert!((estimate.total_time - 20.0).abs() < 1.0e-12);
        assert_eq!(estimate.limiting_factor, Some(LimitingFactor::DoseRate));
        assert!((estimate.avg_dose_rate - 600.0).abs() < 1.0e-9);
        assert_eq!(estimate.dose_rate_variation, Some(0.0));
        assert_eq!(estimate.arc_length, None);
    }

    #[test]
    fn gantry_bound_arc_crossing_zero() {
        let beam = Beam::new(
            1,
            "Arc",
            vec![
                control_point(0, 350.0, 0.0, -5.0),
                control_point(1, 10.0, 0.01, -5.0),
            ],
        )
        .with_mu(100.0)
        .with_arc(true);
        let estimate = estimate_delivery(&beam, &MachineProfile::default());
        assert_eq!(estimate.arc_length, Some(20.0));
        assert!((estimate.total_time - 20.0 / 4.8).abs() < 1.0e-12);
        assert_eq!(estimate.limiting_factor, Some(LimitingFactor::GantrySpeed));
        assert_eq!(estimate.mu_per_degree, Some(5.0));
        assert!((estimate.avg_gantry_speed.expect("gantry speed") - 4.8).abs() < 1.0e-12);
    }

    #[test]
    fn leaf_travel_can_bind() {
        let beam = Beam::new(
            1,
            "Sweep",
            vec![
                control_point(0, 0.0, 0.0, -55.0),
                control_point(1, 0.0, 0.001, 45.0),
            ],
        )
        .with_mu(100.0);
        let estimate = estimate_delivery(&beam, &MachineProfile::default());
        assert!((estimate.total_time - 4.0).abs() < 1.0e-12);
        assert_eq!(estimate.limiting_factor, Some(LimitingFactor::MlcSpeed));
        assert_eq!(estimate.total_leaf_travel(), 100.0);
    }

    #[test]
    fn fff_beams_use_fff_ceiling() {
        let mut beam = Beam::new(
            1,
            "FFF",
            vec![control_point(0, 0.0, 0.0, -5.0), control_point(1, 0.0, 1.0, -5.0)],
        )
        .with_mu(1400.0);
        beam.energy_label = Some("10FFF".to_string());
        let profile = MachineProfile {
            max_dose_rate_fff: Some(2400.0),
            ..MachineProfile::default()
        };
        let estimate = estimate_delivery(&beam, &profile);
        assert!((estimate.total_time - 35.0).abs() < 1.0e-12);
    }

    #[test]
    fn limiting_factor_serializes_camel_case() {
        let json = serde_json::to_string(&LimitingFactor::GantrySpeed).expect("serialize");
        assert_eq!(json, "\"gantrySpeed\"");
        assert_eq!(LimitingFactor::MlcSpeed.as_str(), "mlcSpeed");
    }

    #[test]
    fn non_finite_gantry_angle_adds_no_travel() {
        let beam = Beam::new(
            1,
            "Arc",
            vec![
                control_point(0, 0.0, 0.0, -5.0),
                control_point(1, f64::NAN, 0.5, -5.0),
                control_point(2, 90.0, 1.0, -5.0),
            ],
        )
        .with_mu(10.0)
        .with_arc(true);
        let estimate = estimate_delivery(&beam, &MachineProfile::default());
        assert_eq!(estimate.arc_length, Some(0.0));
        assert!(estimate.total_time.is_finite());
        assert_eq!(estimate.limiting_factor, Some(LimitingFactor::DoseRate));
        assert_eq!(estimate.segments[0].gantry_travel, 0.0);
    }
}
