//! Control arcs: the midpoint aperture between two consecutive control
//! points, with the leaf pairs that take part in the complexity scores.

use super::aperture::{ca_area, effective_width, lsv_bank};
use super::leaves::boundary_pairs;
use crate::domain::{Beam, ControlPoint, GeometryIssue};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ControlArc {
    /// Index of the control point that opens the arc.
    pub start_index: usize,
    pub mid_bank_a: Vec<f64>,
    pub mid_bank_b: Vec<f64>,
    pub gaps: Vec<f64>,
    pub jaw_y1: f64,
    pub jaw_y2: f64,
    /// `max(0, Δ cumulative meterset weight)`.
    pub delta_mu: f64,
    pub active: Vec<bool>,
    /// Travel of the active leaves between the two real control points.
    pub leaf_travel: f64,
}

impl ControlArc {
    pub fn pair_count(&self) -> usize {
        self.gaps.len()
    }

    pub fn active_leaf_count(&self) -> usize {
        self.active.iter().filter(|is_active| **is_active).count()
    }

    pub fn area(&self, boundaries: &[f64]) -> f64 {
        ca_area(
            &self.mid_bank_a,
            &self.mid_bank_b,
            boundaries,
            self.jaw_y1,
            self.jaw_y2,
            &self.active,
        )
    }

    /// Area each active pair contributes; inactive pairs report 0.
    pub fn leaf_contributions(&self, boundaries: &[f64]) -> Vec<f64> {
        (0..self.pair_count())
            .map(|pair| {
                if self.active[pair] {
                    self.gaps[pair] * effective_width(boundaries, pair, self.jaw_y1, self.jaw_y2)
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Product of the two per-bank leaf sequence variabilities.
    pub fn lsv(&self) -> f64 {
        lsv_bank(&self.mid_bank_a, &self.active) * lsv_bank(&self.mid_bank_b, &self.active)
    }
}

/// Smallest leaf gap recorded anywhere in the beam, floored at 0.
pub fn plan_min_gap(beam: &Beam, leaf_pairs: usize) -> f64 {
    let minimum = beam
        .control_points
        .iter()
        .flat_map(|cp| {
            let pairs = cp.mlc.pair_count().min(leaf_pairs);
            (0..pairs).map(move |pair| cp.mlc.gap(pair))
        })
        .filter(|gap| gap.is_finite())
        .fold(f64::INFINITY, f64::min);

    if minimum.is_finite() && minimum >= 0.0 {
        minimum
    } else {
        0.0
    }
}

/// A pair is active when its Y extent overlaps the jaw opening and its gap
/// exceeds `min_gap`.
pub fn determine_active_leaves(
    gaps: &[f64],
    boundaries: &[f64],
    jaw_y1: f64,
    jaw_y2: f64,
    min_gap: f64,
) -> Vec<bool> {
    gaps.iter()
        .enumerate()
        .map(|(pair, gap)| {
            let within_jaw = match (boundaries.get(pair), boundaries.get(pair + 1)) {
                (Some(&low), Some(&high)) => high > jaw_y1 && low < jaw_y2,
                _ => false,
            };
            within_jaw && *gap > min_gap
        })
        .collect()
}

/// Interpolates every pair of consecutive control points. A beam with a
/// single control point has no arcs.
pub fn build_control_arcs(beam: &Beam, boundaries: &[f64], leaf_pairs: usize) -> Vec<ControlArc> {
    let pair_cap = leaf_pairs.min(boundary_pairs(boundaries));
    let min_gap = plan_min_gap(beam, pair_cap);

    beam.control_points
        .windows(2)
        .map(|window| build_arc(&window[0], &window[1], boundaries, pair_cap, min_gap))
        .collect()
}

fn build_arc(
    first: &ControlPoint,
    second: &ControlPoint,
    boundaries: &[f64],
    pair_cap: usize,
    min_gap: f64,
) -> ControlArc {
    let (a1, b1) = (&first.mlc.bank_a, &first.mlc.bank_b);
    let (a2, b2) = (&second.mlc.bank_a, &second.mlc.bank_b);
    let pairs = a1
        .len()
        .min(b1.len())
        .min(a2.len())
        .min(b2.len())
        .min(pair_cap);
    if a1.len() != a2.len() || b1.len() != b2.len() || a1.len() != b1.len() {
        debug!(
            issue = %GeometryIssue::MalformedGeometry,
            control_point = first.index,
            pairs,
            "bank lengths differ; truncating control arc"
        );
    }

    let mid_bank_a: Vec<f64> = (0..pairs).map(|pair| (a1[pair] + a2[pair]) / 2.0).collect();
    let mid_bank_b: Vec<f64> = (0..pairs).map(|pair| (b1[pair] + b2[pair]) / 2.0).collect();
    // a pair with a non-finite position never becomes active
    let gaps: Vec<f64> = mid_bank_a
        .iter()
        .zip(&mid_bank_b)
        .enumerate()
        .map(|(pair, (a, b))| {
            let gap = b - a;
            if gap.is_finite() {
                gap
            } else {
                debug!(
                    issue = %GeometryIssue::MalformedGeometry,
                    control_point = first.index,
                    pair,
                    "non-finite leaf position; pair excluded from control arc"
                );
                0.0
            }
        })
        .collect();

    let (jaw_y1, jaw_y2) = midpoint_y_opening(first, second);
    let active = determine_active_leaves(&gaps, boundaries, jaw_y1, jaw_y2, min_gap);

    let leaf_travel = (0..pairs)
        .filter(|pair| active[*pair])
        .map(|pair| (a2[pair] - a1[pair]).abs() + (b2[pair] - b1[pair]).abs())
        .sum();
    let delta_mu = (second.cumulative_meterset_weight - first.cumulative_meterset_weight).max(0.0);

    ControlArc {
        start_index: first.index,
        mid_bank_a,
        mid_bank_b,
        gaps,
        jaw_y1,
        jaw_y2,
        delta_mu,
        active,
        leaf_travel,
    }
}

/// Averages the Y jaws of both control points. A side without recorded
/// jaws defers to the other; with neither the opening is unbounded.
/// A (0, 0) pair means "not recorded", never a closed jaw.
fn midpoint_y_opening(first: &ControlPoint, second: &ControlPoint) -> (f64, f64) {
    match (first.jaws.y_opening(), second.jaws.y_opening()) {
        (Some((y1a, y2a)), Some((y1b, y2b))) => ((y1a + y1b) / 2.0, (y2a + y2b) / 2.0),
        (Some(opening), None) | (None, Some(opening)) => opening,
        (None, None) => (f64::NEG_INFINITY, f64::INFINITY),
    }
}
