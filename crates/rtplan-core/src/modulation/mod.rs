//! Aperture modulation: how much of the target the aperture hides.
//!
//! AM for one control point is `1 - area(target ∩ aperture) / area(target)`
//! in the beam's eye view. BAM averages AM over a beam by meterset weight,
//! PAM averages BAM over the plan by beam MU.

pub mod bev;

pub use bev::{
    TargetOutline, aperture_polygon, project_point_to_bev, project_target, target_bev_polygon,
};

use crate::common::MachineProfile;
use crate::common::constants::{MIN_POLYGON_AREA_MM2, WEIGHT_EPSILON};
use crate::domain::{Beam, ControlPoint, Plan, Structure};
use crate::geometry::effective_leaf_boundaries;
use crate::numerics::WeightedAccumulator;
use geo::{Area, BooleanOps, MultiPolygon, Polygon};
use tracing::trace;

pub fn aperture_modulation(target: &Polygon<f64>, aperture: Option<&MultiPolygon<f64>>) -> f64 {
    let target_area = target.unsigned_area();
    if target_area < MIN_POLYGON_AREA_MM2 {
        return 0.0;
    }
    let Some(aperture) = aperture else {
        return 1.0;
    };

    let exposed = MultiPolygon::new(vec![target.clone()])
        .intersection(aperture)
        .unsigned_area();
    (1.0 - exposed / target_area).clamp(0.0, 1.0)
}

/// AM at one control point, or `None` when the target cannot be projected.
pub fn control_point_modulation(
    structure: &Structure,
    control_point: &ControlPoint,
    boundaries: &[f64],
) -> Option<f64> {
    modulation_with_outline(
        structure,
        TargetOutline::of(structure),
        control_point,
        boundaries,
    )
}

fn modulation_with_outline(
    structure: &Structure,
    outline: TargetOutline,
    control_point: &ControlPoint,
    boundaries: &[f64],
) -> Option<f64> {
    if let Some(couch_angle) = control_point.couch_angle.filter(|angle| *angle != 0.0) {
        trace!(
            couch_angle,
            control_point = control_point.index,
            "couch rotation is not applied to the BEV projection"
        );
    }

    let target = project_target(structure, outline, control_point.gantry_angle)?;
    let aperture = aperture_polygon(&control_point.mlc, &control_point.jaws, boundaries);
    Some(aperture_modulation(&target, aperture.as_ref()))
}

/// AM for every control point of the beam, in sequence order.
pub fn control_point_modulations(
    structure: &Structure,
    beam: &Beam,
    boundaries: &[f64],
) -> Vec<Option<f64>> {
    let outline = TargetOutline::of(structure);
    beam.control_points
        .iter()
        .map(|control_point| {
            modulation_with_outline(structure, outline, control_point, boundaries)
        })
        .collect()
}

/// Folds per-control-point AM into BAM. Each control point after the first
/// is weighted by the meterset delivered to reach it.
pub fn fold_beam_modulation(beam: &Beam, modulations: &[Option<f64>]) -> Option<f64> {
    if beam.control_points.len() < 2 {
        return None;
    }

    let mut accumulator = WeightedAccumulator::default();
    for (window, modulation) in beam.control_points.windows(2).zip(modulations.iter().skip(1)) {
        let weight =
            (window[1].cumulative_meterset_weight - window[0].cumulative_meterset_weight).max(0.0);
        if let Some(modulation) = modulation {
            accumulator.push(*modulation, weight);
        }
    }

    if accumulator.total_weight() <= WEIGHT_EPSILON {
        return None;
    }
    accumulator.weighted_mean()
}

pub fn beam_aperture_modulation(
    structure: &Structure,
    beam: &Beam,
    profile: &MachineProfile,
) -> Option<f64> {
    if !beam.has_mlc_data() || beam.control_points.len() < 2 {
        return None;
    }
    let boundaries = effective_leaf_boundaries(beam, profile);
    let modulations = control_point_modulations(structure, beam, &boundaries);
    fold_beam_modulation(beam, &modulations)
}

/// Folds `(BAM, beam weight)` pairs into PAM.
pub fn fold_plan_modulation(beams: impl IntoIterator<Item = (f64, f64)>) -> Option<f64> {
    let mut accumulator = WeightedAccumulator::default();
    for (modulation, weight) in beams {
        accumulator.push(modulation, weight);
    }

    if accumulator.total_weight() <= WEIGHT_EPSILON {
        return None;
    }
    accumulator.weighted_mean()
}

pub fn plan_aperture_modulation(
    structure: &Structure,
    plan: &Plan,
    profile: &MachineProfile,
) -> Option<f64> {
    fold_plan_modulation(plan.beams.iter().filter_map(|beam| {
        beam_aperture_modulation(structure, beam, profile).map(|bam| (bam, beam.mu_weight()))
    }))
}

#[cfg(test)]
mod tests {
    use super::{
        aperture_modulation, beam_aperture_modulation, control_point_modulation,
        fold_plan_modulation, plan_aperture_modulation,
    };
    use crate::common::MachineProfile;
    use crate::domain::{
        Beam, Contour, ControlPoint, JawPositions, MlcPositions, Plan, RadiationType, Structure,
    };
    use geo::{LineString, MultiPolygon, Polygon};

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]),
            Vec::new(),
        )
    }

    fn target() -> Structure {
        Structure::new(
            "PTV",
            vec![Contour {
                points: vec![
                    [-5.0, -5.0, 0.0],
                    [5.0, -5.0, 0.0],
                    [5.0, 5.0, 0.0],
                    [-5.0, 5.0, 0.0],
                ],
            }],
        )
    }

    fn beam(bank_a: f64, bank_b: f64) -> Beam {
        let control_point = |index: usize, weight: f64| {
            ControlPoint::new(
                index,
                0.0,
                weight,
                MlcPositions::new(vec![bank_a], vec![bank_b]),
                JawPositions::new(-50.0, 50.0, -50.0, 50.0),
            )
        };
        Beam::new(1, "Beam 1", vec![control_point(0, 0.0), control_point(1, 1.0)])
            .with_leaf_boundaries(vec![-10.0, 10.0])
    }

    #[test]
    fn contained_target_is_unmodulated() {
        let aperture = MultiPolygon::new(vec![square(-10.0, -10.0, 10.0, 10.0)]);
        let am = aperture_modulation(&square(-5.0, -5.0, 5.0, 5.0), Some(&aperture));
        assert!(am.abs() < 1.0e-9);
    }

    #[test]
    fn disjoint_or_missing_aperture_blocks_everything() {
        let target = square(-15.0, -5.0, -5.0, 5.0);
        let aperture = MultiPolygon::new(vec![square(5.0, -5.0, 15.0, 5.0)]);
        assert!((aperture_modulation(&target, Some(&aperture)) - 1.0).abs() < 1.0e-9);
        assert_eq!(aperture_modulation(&target, None), 1.0);
    }

    #[test]
    fn half_covered_target() {
        let aperture = MultiPolygon::new(vec![square(0.0, -5.0, 10.0, 5.0)]);
        let am = aperture_modulation(&square(-5.0, -5.0, 5.0, 5.0), Some(&aperture));
        assert!((am - 0.5).abs() < 1.0e-9);
    }

    #[test]
    fn degenerate_target_reports_zero() {
        let sliver = square(0.0, 0.0, 1.0e-4, 1.0e-4);
        assert_eq!(aperture_modulation(&sliver, None), 0.0);
    }

    #[test]
    fn open_beam_does_not_modulate_target() {
        let open = beam(-10.0, 10.0);
        let am = control_point_modulation(&target(), &open.control_points[1], &[-10.0, 10.0])
            .expect("target should project");
        assert!(am.abs() < 0.01);

        let profile = MachineProfile::default();
        let bam = beam_aperture_modulation(&target(), &open, &profile).expect("bam");
        assert!(bam.abs() < 0.01);

        let plan = Plan::new("p", vec![open]);
        let pam = plan_aperture_modulation(&target(), &plan, &profile).expect("pam");
        assert!(pam.abs() < 0.01);
    }

    #[test]
    fn closed_beam_blocks_target() {
        let closed = beam(0.0, 0.0);
        let profile = MachineProfile::default();
        assert_eq!(beam_aperture_modulation(&target(), &closed, &profile), Some(1.0));
        let plan = Plan::new("p", vec![closed]);
        assert_eq!(plan_aperture_modulation(&target(), &plan, &profile), Some(1.0));
    }

    #[test]
    fn empty_structure_gives_no_modulation() {
        let open = beam(-10.0, 10.0);
        let empty = Structure::new("Empty", Vec::new());
        assert_eq!(
            control_point_modulation(&empty, &open.control_points[0], &[-10.0, 10.0]),
            None
        );
        let plan = Plan::new("p", vec![open]);
        assert_eq!(
            plan_aperture_modulation(&empty, &plan, &MachineProfile::default()),
            None
        );
    }

    #[test]
    fn single_control_point_and_electron_beams_have_no_bam() {
        let profile = MachineProfile::default();
        let mut single = beam(-10.0, 10.0);
        single.control_points.truncate(1);
        assert_eq!(beam_aperture_modulation(&target(), &single, &profile), None);

        let mut electron = beam(-10.0, 10.0);
        electron.radiation_type = RadiationType::Electron;
        assert_eq!(beam_aperture_modulation(&target(), &electron, &profile), None);
    }

    #[test]
    fn plan_modulation_weights_by_beam() {
        let pam = fold_plan_modulation([(0.2, 100.0), (0.8, 300.0)]).expect("pam");
        assert!((pam - 0.65).abs() < 1.0e-12);
        assert_eq!(fold_plan_modulation([(0.5, 0.0)]), None);
        assert_eq!(fold_plan_modulation(std::iter::empty::<(f64, f64)>()), None);
    }

    #[test]
    fn target_behind_non_finite_leaf_is_fully_blocked() {
        let mut unrecorded_x = beam(f64::NAN, f64::NAN);
        for control_point in &mut unrecorded_x.control_points {
            control_point.jaws = JawPositions::new(0.0, 0.0, -50.0, 50.0);
        }

        for blocked in [beam(f64::NAN, f64::NAN), unrecorded_x] {
            let am = control_point_modulation(&target(), &blocked.control_points[1], &[-10.0, 10.0])
                .expect("target should project");
            assert_eq!(am, 1.0);
            let bam = beam_aperture_modulation(&target(), &blocked, &MachineProfile::default());
            assert_eq!(bam, Some(1.0));
        }
    }
}
