//! Per-beam aggregation of the control-arc scores, the per-control-point
//! aperture descriptors and the delivery estimate.

use super::model::{BeamMetrics, ControlPointMetrics};
use crate::common::MachineProfile;
use crate::common::constants::{LTMCS_TRAVEL_SCALE_MM, MM2_PER_CM2, SMALL_FIELD_AREA_MM2};
use crate::delivery::{DeliveryEstimate, estimate_delivery};
use crate::domain::{Beam, Structure};
use crate::geometry::{
    ClippedAperture, ControlArc, build_control_arcs, effective_leaf_boundaries, jaw_area,
};
use crate::modulation::{control_point_modulations, fold_beam_modulation};
use crate::numerics::{
    WeightedAccumulator, coefficient_of_variation, mean, ratio_or, stable_sum,
    weighted_mean_or_mean,
};
use tracing::{debug, trace};

/// Running per-leaf maximum of the area each pair opens across the arcs of
/// a beam. Its sum is the union aperture `A_max`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnionAperture {
    per_leaf_max: Vec<f64>,
}

impl UnionAperture {
    pub fn new(leaf_pairs: usize) -> Self {
        Self {
            per_leaf_max: vec![0.0; leaf_pairs],
        }
    }

    pub fn record(&mut self, contributions: &[f64]) {
        if contributions.len() > self.per_leaf_max.len() {
            self.per_leaf_max.resize(contributions.len(), 0.0);
        }
        for (maximum, contribution) in self.per_leaf_max.iter_mut().zip(contributions) {
            if *contribution > *maximum {
                *maximum = *contribution;
            }
        }
    }

    pub fn area(&self) -> f64 {
        stable_sum(&self.per_leaf_max)
    }
}

/// Modulation complexity scores over the control arcs of one beam.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct ArcScores {
    lsv: f64,
    aav: f64,
    mcs: f64,
    union_area: f64,
    plan_modulation: f64,
    leaf_travel: f64,
    active_leaves: usize,
}

fn score_control_arcs(arcs: &[ControlArc], boundaries: &[f64]) -> ArcScores {
    if arcs.is_empty() {
        return ArcScores::default();
    }

    let pairs = arcs.iter().map(ControlArc::pair_count).max().unwrap_or(0);
    let mut union = UnionAperture::new(pairs);
    let mut areas = Vec::with_capacity(arcs.len());
    let mut lsvs = Vec::with_capacity(arcs.len());
    for arc in arcs {
        areas.push(arc.area(boundaries));
        lsvs.push(arc.lsv());
        union.record(&arc.leaf_contributions(boundaries));
    }
    let union_area = union.area();

    let aavs: Vec<f64> = areas
        .iter()
        .map(|area| ratio_or(*area, union_area, 0.0))
        .collect();
    let mcss: Vec<f64> = lsvs.iter().zip(&aavs).map(|(lsv, aav)| lsv * aav).collect();
    let delta_mu: Vec<f64> = arcs.iter().map(|arc| arc.delta_mu).collect();
    let total_delta_mu = stable_sum(&delta_mu);

    let weighted = |values: &[f64]| weighted_mean_or_mean(values, &delta_mu).unwrap_or(0.0);
    let lsv = weighted(&lsvs);
    let aav = weighted(&aavs);
    let mcs = weighted(&mcss);

    let plan_modulation = if union_area > 0.0 && total_delta_mu > 0.0 {
        let delivered: Vec<f64> = areas.iter().zip(&delta_mu).map(|(a, mu)| a * mu).collect();
        1.0 - stable_sum(&delivered) / (total_delta_mu * union_area)
    } else {
        1.0 - mcs
    };

    let travel: Vec<f64> = arcs.iter().map(|arc| arc.leaf_travel).collect();
    ArcScores {
        lsv,
        aav,
        mcs,
        union_area,
        plan_modulation,
        leaf_travel: stable_sum(&travel),
        active_leaves: arcs.iter().map(ControlArc::active_leaf_count).sum(),
    }
}

/// Meterset-weighted descriptors of the jaw-clipped control point apertures.
#[derive(Debug, Clone, Copy, Default)]
struct ApertureSummary {
    leaf_gap: WeightedAccumulator,
    asymmetry: WeightedAccumulator,
    field_size: WeightedAccumulator,
    tongue_and_groove: WeightedAccumulator,
    irregularity: WeightedAccumulator,
    edge: WeightedAccumulator,
    sas5: WeightedAccumulator,
    sas10: WeightedAccumulator,
    small_field: WeightedAccumulator,
}

impl ApertureSummary {
    fn push(&mut self, aperture: &ClippedAperture, area: f64, weight: f64) {
        let flags = aperture.small_aperture_flags();
        let indicator = |flag: bool| if flag { 1.0 } else { 0.0 };

        self.leaf_gap.push(aperture.leaf_gap(), weight);
        self.asymmetry.push(aperture.mean_asymmetry(), weight);
        self.field_size.push(aperture.equivalent_field_size(), weight);
        self.tongue_and_groove.push(aperture.tongue_and_groove(), weight);
        self.irregularity.push(aperture.irregularity(), weight);
        self.edge.push(aperture.edge_metric(), weight);
        self.sas5.push(indicator(flags.below_5mm), weight);
        self.sas10.push(indicator(flags.below_10mm), weight);
        self.small_field
            .push(indicator(area > 0.0 && area < SMALL_FIELD_AREA_MM2), weight);
    }
}

pub fn calculate_beam_metrics(
    beam: &Beam,
    profile: &MachineProfile,
    structure: Option<&Structure>,
) -> BeamMetrics {
    let boundaries = effective_leaf_boundaries(beam, profile);
    let leaf_pairs = beam.declared_leaf_pairs(profile.default_leaf_pairs);
    let delivery = estimate_delivery(beam, profile);
    let has_mlc = beam.has_mlc_data();
    if !has_mlc {
        debug!(
            beam = beam.number,
            radiation = %beam.radiation_type,
            "beam carries no leaf data; MLC indices are omitted"
        );
    }

    let modulations = match structure {
        Some(structure) if has_mlc => control_point_modulations(structure, beam, &boundaries),
        _ => vec![None; beam.control_points.len()],
    };

    let mut summary = ApertureSummary::default();
    let mut control_point_metrics = Vec::with_capacity(beam.control_points.len());
    let mut open_areas = Vec::new();
    let mut jaw_areas = Vec::with_capacity(beam.control_points.len());
    let mut weights = Vec::with_capacity(beam.control_points.len());
    let mut previous_weight: Option<f64> = None;

    for (position, control_point) in beam.control_points.iter().enumerate() {
        let cumulative = control_point.cumulative_meterset_weight;
        let weight = match previous_weight {
            Some(previous) => (cumulative - previous).max(0.0),
            None => cumulative.max(0.0),
        };
        previous_weight = Some(cumulative);

        let aperture = ClippedAperture::from_control_point(control_point, &boundaries);
        let area = aperture.area();
        summary.push(&aperture, area, weight);
        if area > 0.0 {
            open_areas.push(area);
        }
        let jaws = jaw_area(&control_point.jaws);
        jaw_areas.push(jaws);
        weights.push(weight);

        let leaf_travel = position
            .checked_sub(1)
            .and_then(|segment| delivery.segments.get(segment))
            .map_or(0.0, |segment| segment.total_leaf_travel);

        control_point_metrics.push(ControlPointMetrics {
            index: control_point.index,
            gantry_angle: control_point.gantry_angle,
            meterset_weight: weight,
            aperture_area: area,
            aperture_perimeter: aperture.perimeter(),
            jaw_area: jaws,
            leaf_travel,
            small_aperture_flags: aperture.small_aperture_flags(),
            aperture_modulation: modulations.get(position).copied().flatten(),
        });
    }

    let arcs = build_control_arcs(beam, &boundaries, leaf_pairs);
    let scores = score_control_arcs(&arcs, &boundaries);
    let arc_count = arcs.len();
    let control_point_count = beam.control_points.len();
    let beam_mu = beam.mu();
    let pairs = leaf_pairs as f64;
    let lt = scores.leaf_travel;

    let mlc = |value: f64| has_mlc.then_some(value);
    let mlc_opt = |value: Option<f64>| if has_mlc { value } else { None };

    let bam = if structure.is_some() && has_mlc {
        fold_beam_modulation(beam, &modulations)
    } else {
        None
    };

    let metrics = BeamMetrics {
        beam_number: beam.number,
        beam_name: beam.name.clone(),
        radiation_type: beam.radiation_type,
        beam_mu,
        number_of_control_points: control_point_count,

        mcs: mlc(scores.mcs),
        lsv: mlc(scores.lsv),
        aav: mlc(scores.aav),
        union_aperture_area: mlc(scores.union_area),
        mfa: mlc(mean(&open_areas).unwrap_or(0.0) / MM2_PER_CM2),
        lt: mlc(lt),
        ltmcs: mlc(scores.mcs / (1.0 + (1.0 + lt / LTMCS_TRAVEL_SCALE_MM).log10())),
        lg: mlc_opt(summary.leaf_gap.mean_or_unweighted()),
        mad: mlc_opt(summary.asymmetry.mean_or_unweighted()),
        efs: mlc_opt(summary.field_size.mean_or_unweighted()),
        psmall: mlc_opt(summary.small_field.mean_or_unweighted()),
        muca: ratio_or(beam_mu, arc_count as f64, 0.0),
        ltmu: mlc(ratio_or(lt, beam_mu, 0.0)),
        ltnlmu: mlc(ratio_or(lt, pairs * beam_mu, 0.0)),
        lna: mlc(ratio_or(lt, pairs * arc_count as f64, 0.0)),
        nl: mlc(ratio_or(2.0 * scores.active_leaves as f64, arc_count as f64, 0.0)),
        ltal: mlc_opt(
            delivery
                .arc_length
                .filter(|arc| *arc > 0.0)
                .map(|arc| lt / arc),
        ),
        mdrv: delivery.dose_rate_variation,
        gt: delivery.arc_length,
        gs: delivery.avg_gantry_speed,
        mgsv: delivery.gantry_speed_variation,
        ls: mlc(delivery.avg_mlc_speed),
        pa: mlc(stable_sum(&open_areas) / MM2_PER_CM2),
        ja: mean(&jaw_areas).unwrap_or(0.0) / MM2_PER_CM2,
        pm: mlc(if arc_count == 0 {
            0.0
        } else {
            scores.plan_modulation
        }),
        tg: mlc_opt(summary.tongue_and_groove.mean_or_unweighted()),
        md: (control_point_count > 1)
            .then(|| coefficient_of_variation(&weights))
            .flatten(),
        mi: mlc_opt(
            (control_point_count > 1 && lt > 0.0)
                .then(|| lt / (pairs * control_point_count as f64)),
        ),
        sas5: mlc_opt(summary.sas5.mean_or_unweighted()),
        sas10: mlc_opt(summary.sas10.mean_or_unweighted()),
        em: mlc_opt(summary.edge.mean_or_unweighted()),
        pi: mlc_opt(summary.irregularity.mean_or_unweighted()),
        bam,

        arc_length: delivery.arc_length,
        average_gantry_speed: delivery.avg_gantry_speed,
        estimated_delivery_time: delivery.total_time,
        mu_per_degree: delivery.mu_per_degree,
        avg_dose_rate: delivery.avg_dose_rate,
        avg_mlc_speed: delivery.avg_mlc_speed,
        limiting_factor: delivery.limiting_factor,
        collimator_angle_start: beam.control_points.first().map(|cp| cp.collimator_angle),
        collimator_angle_end: beam.control_points.last().map(|cp| cp.collimator_angle),

        control_point_metrics,
    };

    log_summary(&metrics, &delivery);
    metrics
}

fn log_summary(metrics: &BeamMetrics, delivery: &DeliveryEstimate) {
    trace!(
        beam = metrics.beam_number,
        control_points = metrics.number_of_control_points,
        mcs = metrics.mcs,
        lt = metrics.lt,
        delivery_seconds = delivery.total_time,
        limiting = delivery.limiting_factor.map(|factor| factor.as_str()),
        "beam metrics computed"
    );
}
