//! Leaf stack geometry: turns leaf widths (or stored boundaries) into the
//! `N + 1` boundary offsets every aperture computation indexes into.

use crate::common::MachineProfile;
use crate::common::constants::DEFAULT_LEAF_PAIRS;
use crate::domain::{Beam, GeometryIssue};
use tracing::debug;

/// Accumulates `leaf_pairs` widths into boundaries centred on the beam axis.
///
/// Missing or unusable widths fall back to `default_width`. With no pairs
/// and no widths the standard 60-pair stack is synthesized.
pub fn compute_leaf_boundaries(
    leaf_widths: &[f64],
    leaf_pairs: usize,
    default_width: f64,
) -> Vec<f64> {
    let pairs = match (leaf_pairs, leaf_widths.len()) {
        (0, 0) => DEFAULT_LEAF_PAIRS,
        (0, declared) => declared,
        (pairs, _) => pairs,
    };

    let mut boundaries = Vec::with_capacity(pairs + 1);
    let mut edge = 0.0;
    boundaries.push(edge);
    for pair in 0..pairs {
        let width = match leaf_widths.get(pair) {
            Some(&width) if width.is_finite() && width > 0.0 => width,
            Some(&width) => {
                debug!(
                    issue = %GeometryIssue::MalformedGeometry,
                    pair,
                    width,
                    "replacing unusable leaf width with default"
                );
                default_width
            }
            None => default_width,
        };
        edge += width;
        boundaries.push(edge);
    }

    let offset = edge / 2.0;
    boundaries.iter_mut().for_each(|boundary| *boundary -= offset);
    boundaries
}

/// Stored boundaries when the plan carries a usable array, otherwise the
/// stack resolved from widths and the machine defaults.
pub fn effective_leaf_boundaries(beam: &Beam, profile: &MachineProfile) -> Vec<f64> {
    let stored = &beam.leaf_boundaries;
    if stored.len() >= 2 {
        if stored.iter().all(|boundary| boundary.is_finite()) {
            return stored.clone();
        }
        debug!(
            issue = %GeometryIssue::MalformedGeometry,
            beam = beam.number,
            "stored leaf boundaries contain non-finite values; resolving from widths"
        );
    }

    compute_leaf_boundaries(
        &beam.leaf_widths,
        beam.declared_leaf_pairs(profile.default_leaf_pairs),
        profile.default_leaf_width,
    )
}

/// Width of pair `k`, or 0 when the boundary array does not reach it.
pub fn leaf_width(boundaries: &[f64], pair: usize) -> f64 {
    match (boundaries.get(pair), boundaries.get(pair + 1)) {
        (Some(low), Some(high)) => (high - low).abs(),
        _ => 0.0,
    }
}

/// Number of leaf pairs the boundary array describes.
pub fn boundary_pairs(boundaries: &[f64]) -> usize {
    boundaries.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::{boundary_pairs, compute_leaf_boundaries, effective_leaf_boundaries, leaf_width};
    use crate::common::MachineProfile;
    use crate::domain::Beam;

    #[test]
    fn four_five_millimetre_leaves_centre_on_axis() {
        let boundaries = compute_leaf_boundaries(&[5.0; 4], 4, 5.0);
        assert_eq!(boundaries, vec![-10.0, -5.0, 0.0, 5.0, 10.0]);
    }

    #[test]
    fn missing_widths_use_default_width() {
        let boundaries = compute_leaf_boundaries(&[10.0], 3, 5.0);
        assert_eq!(boundaries, vec![-10.0, 0.0, 5.0, 10.0]);
    }

    #[test]
    fn empty_stack_synthesizes_sixty_default_pairs() {
        let boundaries = compute_leaf_boundaries(&[], 0, 5.0);
        assert_eq!(boundary_pairs(&boundaries), 60);
        assert_eq!(boundaries[0], -150.0);
        assert_eq!(boundaries[60], 150.0);
    }

    #[test]
    fn unusable_widths_are_replaced() {
        let boundaries = compute_leaf_boundaries(&[5.0, f64::NAN, -2.0], 3, 5.0);
        assert_eq!(boundaries, vec![-7.5, -2.5, 2.5, 7.5]);
    }

    #[test]
    fn stored_boundaries_take_precedence() {
        let beam = Beam::new(1, "Arc", Vec::new())
            .with_leaf_widths(vec![5.0, 5.0])
            .with_leaf_boundaries(vec![-20.0, 0.0, 10.0]);
        let boundaries = effective_leaf_boundaries(&beam, &MachineProfile::default());
        assert_eq!(boundaries, vec![-20.0, 0.0, 10.0]);
        assert_eq!(leaf_width(&boundaries, 0), 20.0);
        assert_eq!(leaf_width(&boundaries, 5), 0.0);
    }

    #[test]
    fn widths_resolve_when_boundaries_absent() {
        let beam = Beam::new(1, "Arc", Vec::new()).with_leaf_widths(vec![10.0, 10.0]);
        let boundaries = effective_leaf_boundaries(&beam, &MachineProfile::default());
        assert_eq!(boundaries, vec![-10.0, 0.0, 10.0]);
    }
}
