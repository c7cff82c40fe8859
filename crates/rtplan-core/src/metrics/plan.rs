//! Plan-level aggregation of beam metrics.
//!
//! Ratio-type indices are averaged with beam MU as the weight (1 for beams
//! without a meterset); extensive quantities are summed.

use super::beam::calculate_beam_metrics;
use super::model::{BeamMetrics, PlanMetrics};
use crate::common::MachineProfile;
use crate::common::constants::LTMCS_TRAVEL_SCALE_MM;
use crate::domain::{Plan, Structure};
use crate::modulation::fold_plan_modulation;
use crate::numerics::{WeightedAccumulator, mean, ratio_or, stable_sum};
use tracing::debug;

/// One MU-weighted plan field: where to read it on a beam and where to
/// store the average on the plan.
struct WeightedField {
    extract: fn(&BeamMetrics) -> Option<f64>,
    assign: fn(&mut PlanMetrics, Option<f64>),
}

const WEIGHTED_FIELDS: &[WeightedField] = &[
    WeightedField {
        extract: |beam| beam.mcs,
        assign: |plan, value| plan.mcs = value.unwrap_or(0.0),
    },
    WeightedField {
        extract: |beam| beam.lsv,
        assign: |plan, value| plan.lsv = value.unwrap_or(0.0),
    },
    WeightedField {
        extract: |beam| beam.aav,
        assign: |plan, value| plan.aav = value.unwrap_or(0.0),
    },
    WeightedField {
        extract: |beam| beam.mfa,
        assign: |plan, value| plan.mfa = value.unwrap_or(0.0),
    },
    WeightedField {
        extract: |beam| beam.lg,
        assign: |plan, value| plan.lg = value,
    },
    WeightedField {
        extract: |beam| beam.mad,
        assign: |plan, value| plan.mad = value,
    },
    WeightedField {
        extract: |beam| beam.efs,
        assign: |plan, value| plan.efs = value,
    },
    WeightedField {
        extract: |beam| beam.psmall,
        assign: |plan, value| plan.psmall = value,
    },
    WeightedField {
        extract: |beam| Some(beam.muca),
        assign: |plan, value| plan.muca = value,
    },
    WeightedField {
        extract: |beam| beam.ltnlmu,
        assign: |plan, value| plan.ltnlmu = value,
    },
    WeightedField {
        extract: |beam| beam.lna,
        assign: |plan, value| plan.lna = value,
    },
    WeightedField {
        extract: |beam| beam.nl,
        assign: |plan, value| plan.nl = value,
    },
    WeightedField {
        extract: |beam| beam.ltal,
        assign: |plan, value| plan.ltal = value,
    },
    WeightedField {
        extract: |beam| beam.mdrv,
        assign: |plan, value| plan.mdrv = value,
    },
    WeightedField {
        extract: |beam| beam.gs,
        assign: |plan, value| plan.gs = value,
    },
    WeightedField {
        extract: |beam| beam.mgsv,
        assign: |plan, value| plan.mgsv = value,
    },
    WeightedField {
        extract: |beam| beam.ls,
        assign: |plan, value| plan.ls = value,
    },
    WeightedField {
        extract: |beam| beam.pm,
        assign: |plan, value| plan.pm = value,
    },
    WeightedField {
        extract: |beam| beam.tg,
        assign: |plan, value| plan.tg = value,
    },
    WeightedField {
        extract: |beam| beam.md,
        assign: |plan, value| plan.md = value,
    },
    WeightedField {
        extract: |beam| beam.mi,
        assign: |plan, value| plan.mi = value,
    },
    WeightedField {
        extract: |beam| beam.sas5,
        assign: |plan, value| plan.sas5 = value,
    },
    WeightedField {
        extract: |beam| beam.sas10,
        assign: |plan, value| plan.sas10 = value,
    },
    WeightedField {
        extract: |beam| beam.em,
        assign: |plan, value| plan.em = value,
    },
    WeightedField {
        extract: |beam| beam.pi,
        assign: |plan, value| plan.pi = value,
    },
];

/// Beam-weighted mean of `extract` over the beams that report it.
fn weighted_field(beams: &[BeamMetrics], extract: fn(&BeamMetrics) -> Option<f64>) -> Option<f64> {
    let mut accumulator = WeightedAccumulator::default();
    for beam in beams {
        if let Some(value) = extract(beam) {
            accumulator.push(value, beam_weight(beam));
        }
    }
    accumulator.weighted_mean()
}

fn beam_weight(beam: &BeamMetrics) -> f64 {
    if beam.beam_mu > 0.0 { beam.beam_mu } else { 1.0 }
}

fn positive(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}

pub fn calculate_plan_metrics(
    plan: &Plan,
    profile: &MachineProfile,
    structure: Option<&Structure>,
) -> PlanMetrics {
    let beam_metrics: Vec<BeamMetrics> = plan
        .beams
        .iter()
        .map(|beam| calculate_beam_metrics(beam, profile, structure))
        .collect();
    aggregate_plan_metrics(plan, beam_metrics)
}

/// Folds already computed beam metrics into the plan record.
pub fn aggregate_plan_metrics(plan: &Plan, beam_metrics: Vec<BeamMetrics>) -> PlanMetrics {
    let mut metrics = PlanMetrics {
        plan_label: plan.label.clone(),
        technique: Some(plan.technique()),
        prescribed_dose: plan.prescribed_dose,
        dose_per_fraction: plan.dose_per_fraction,
        number_of_fractions: plan.number_of_fractions,
        ..PlanMetrics::default()
    };
    if beam_metrics.is_empty() {
        debug!(plan = %plan.label, "plan has no beams; reporting zeroed metrics");
        return metrics;
    }

    for field in WEIGHTED_FIELDS {
        (field.assign)(&mut metrics, weighted_field(&beam_metrics, field.extract));
    }

    let collect = |extract: fn(&BeamMetrics) -> f64| -> Vec<f64> {
        beam_metrics.iter().map(extract).collect()
    };
    let total_mu = stable_sum(&collect(|beam| beam.beam_mu));
    let total_lt = stable_sum(&collect(|beam| beam.lt.unwrap_or(0.0)));

    metrics.total_mu = total_mu;
    metrics.lt = total_lt;
    metrics.ltmcs = metrics.mcs / (1.0 + (1.0 + total_lt / LTMCS_TRAVEL_SCALE_MM).log10());
    metrics.ltmu = (total_mu > 0.0).then(|| total_lt / total_mu);
    metrics.mu_per_gy = plan
        .prescribed_dose
        .filter(|dose| *dose > 0.0 && total_mu > 0.0)
        .map(|dose| ratio_or(total_mu, dose, 0.0));

    metrics.gt = positive(stable_sum(&collect(|beam| beam.gt.unwrap_or(0.0))));
    metrics.pa = positive(stable_sum(&collect(|beam| beam.pa.unwrap_or(0.0))));
    metrics.total_delivery_time =
        positive(stable_sum(&collect(|beam| beam.estimated_delivery_time)));
    metrics.ja = mean(&collect(|beam| beam.ja)).and_then(positive);

    metrics.pam = fold_plan_modulation(
        beam_metrics
            .iter()
            .filter_map(|beam| beam.bam.map(|bam| (bam, beam_weight(beam)))),
    );

    metrics.beam_metrics = beam_metrics;
    metrics
}
