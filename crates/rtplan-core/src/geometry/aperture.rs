//! Aperture geometry for control-arc midpoints and for individual control
//! points clipped against both jaw pairs.

use super::leaves::{boundary_pairs, leaf_width};
use crate::common::constants::SMALL_APERTURE_THRESHOLDS_MM;
use crate::domain::{ControlPoint, GeometryIssue, JawPositions};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Part of leaf pair `k` lying inside the Y-jaw opening `[jaw_y1, jaw_y2]`.
pub fn effective_width(boundaries: &[f64], pair: usize, jaw_y1: f64, jaw_y2: f64) -> f64 {
    match (boundaries.get(pair), boundaries.get(pair + 1)) {
        (Some(&low), Some(&high)) => (high.min(jaw_y2) - low.max(jaw_y1)).max(0.0),
        _ => 0.0,
    }
}

/// Open area of a control-arc midpoint, counting active pairs only.
pub fn ca_area(
    bank_a: &[f64],
    bank_b: &[f64],
    boundaries: &[f64],
    jaw_y1: f64,
    jaw_y2: f64,
    active: &[bool],
) -> f64 {
    bank_a
        .iter()
        .zip(bank_b)
        .zip(active)
        .enumerate()
        .filter(|(_, (_, is_active))| **is_active)
        .map(|(pair, ((a, b), _))| {
            let gap = b - a;
            if gap > 0.0 {
                gap * effective_width(boundaries, pair, jaw_y1, jaw_y2)
            } else {
                0.0
            }
        })
        .sum()
}

/// Leaf sequence variability of one bank (Masi): the mean of
/// `1 - |Δposition| / max |Δposition|` over consecutive active leaves.
pub fn lsv_bank(positions: &[f64], active: &[bool]) -> f64 {
    let active_positions: Vec<f64> = positions
        .iter()
        .zip(active)
        .filter_map(|(position, is_active)| is_active.then_some(*position))
        .collect();
    if active_positions.len() < 2 {
        return 1.0;
    }

    let differences: Vec<f64> = active_positions
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .collect();
    let max_difference = differences.iter().copied().fold(0.0, f64::max);
    if max_difference == 0.0 || !max_difference.is_finite() {
        return 1.0;
    }

    let total: f64 = differences
        .iter()
        .map(|difference| 1.0 - difference / max_difference)
        .sum();
    total / differences.len() as f64
}

/// Rectangle enclosed by the jaws in mm²; an unrecorded pair spans nothing.
pub fn jaw_area(jaws: &JawPositions) -> f64 {
    ((jaws.x2 - jaws.x1) * (jaws.y2 - jaws.y1)).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmallApertureFlags {
    pub below_2mm: bool,
    pub below_5mm: bool,
    pub below_10mm: bool,
    pub below_20mm: bool,
}

impl SmallApertureFlags {
    pub fn from_min_gap(min_gap: Option<f64>) -> Self {
        let [two, five, ten, twenty] = SMALL_APERTURE_THRESHOLDS_MM;
        let below = |threshold: f64| min_gap.is_some_and(|gap| gap < threshold);
        Self {
            below_2mm: below(two),
            below_5mm: below(five),
            below_10mm: below(ten),
            below_20mm: below(twenty),
        }
    }
}

/// One leaf pair after clipping to the jaws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedLeaf {
    pub bank_a: f64,
    pub bank_b: f64,
    pub width: f64,
}

impl ClippedLeaf {
    pub fn gap(&self) -> f64 {
        (self.bank_b - self.bank_a).max(0.0)
    }

    pub fn is_open(&self) -> bool {
        self.bank_b > self.bank_a && self.width > 0.0
    }

    pub fn area(&self) -> f64 {
        if self.is_open() {
            self.gap() * self.width
        } else {
            0.0
        }
    }
}

/// Aperture of a single control point with each leaf's Y extent clipped to
/// the Y jaws and its opening clipped to the X jaws.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClippedAperture {
    leaves: Vec<ClippedLeaf>,
}

impl ClippedAperture {
    pub fn from_control_point(control_point: &ControlPoint, boundaries: &[f64]) -> Self {
        let mlc = &control_point.mlc;
        let pairs = mlc.pair_count().min(boundary_pairs(boundaries));
        let y_opening = control_point.jaws.y_opening();
        let x_opening = control_point.jaws.x_opening();

        let leaves = (0..pairs)
            .map(|pair| {
                let width = match y_opening {
                    Some((y1, y2)) => effective_width(boundaries, pair, y1, y2),
                    None => leaf_width(boundaries, pair),
                };
                let (mut bank_a, mut bank_b) = (mlc.bank_a[pair], mlc.bank_b[pair]);
                if !bank_a.is_finite() || !bank_b.is_finite() {
                    debug!(
                        issue = %GeometryIssue::MalformedGeometry,
                        control_point = control_point.index,
                        pair,
                        "non-finite leaf position; leaf pair treated as closed"
                    );
                    (bank_a, bank_b) = (0.0, 0.0);
                } else if let Some((x1, x2)) = x_opening {
                    bank_a = bank_a.max(x1);
                    bank_b = bank_b.min(x2);
                }
                ClippedLeaf {
                    bank_a,
                    bank_b,
                    width,
                }
            })
            .collect();

        Self { leaves }
    }

    pub fn leaves(&self) -> &[ClippedLeaf] {
        &self.leaves
    }

    fn open_leaves(&self) -> impl Iterator<Item = &ClippedLeaf> {
        self.leaves.iter().filter(|leaf| leaf.is_open())
    }

    pub fn open_leaf_count(&self) -> usize {
        self.open_leaves().count()
    }

    /// mm².
    pub fn area(&self) -> f64 {
        self.leaves.iter().map(ClippedLeaf::area).sum()
    }

    /// Outline length walking the stack in boundary order. Each contiguous
    /// run of open leaves contributes its top and bottom edges, the steps
    /// between neighbouring leaf tips, and two end caps per leaf.
    pub fn perimeter(&self) -> f64 {
        let mut perimeter = 0.0;
        let mut previous: Option<&ClippedLeaf> = None;

        for leaf in &self.leaves {
            if !leaf.is_open() {
                if let Some(last) = previous.take() {
                    perimeter += last.gap();
                }
                continue;
            }

            perimeter += match previous {
                Some(last) => (leaf.bank_a - last.bank_a).abs() + (leaf.bank_b - last.bank_b).abs(),
                None => leaf.gap(),
            };
            perimeter += 2.0 * leaf.width;
            previous = Some(leaf);
        }

        if let Some(last) = previous {
            perimeter += last.gap();
        }
        perimeter
    }

    /// Tongue-and-groove exposure per unit open area.
    pub fn tongue_and_groove(&self) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }

        let exposure: f64 = self
            .leaves
            .windows(2)
            .filter(|pair| pair[0].is_open())
            .map(|pair| {
                let (current, next) = (&pair[0], &pair[1]);
                if next.is_open() {
                    ((next.bank_a - current.bank_a).abs() + (next.bank_b - current.bank_b).abs())
                        / 4.0
                } else {
                    current.gap() / 2.0
                }
            })
            .sum();
        exposure / area
    }

    /// `perimeter² / (4π·area)`; a circle scores 1.
    pub fn irregularity(&self) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 1.0;
        }
        let perimeter = self.perimeter();
        perimeter * perimeter / (4.0 * PI * area)
    }

    pub fn leaf_gap(&self) -> f64 {
        mean_over_open(self.open_leaves().map(ClippedLeaf::gap))
    }

    /// Mean distance of each open leaf pair's centre from the beam axis.
    pub fn mean_asymmetry(&self) -> f64 {
        mean_over_open(
            self.open_leaves()
                .map(|leaf| ((leaf.bank_a + leaf.bank_b) / 2.0).abs()),
        )
    }

    pub fn equivalent_field_size(&self) -> f64 {
        let perimeter = self.perimeter();
        if perimeter <= 0.0 {
            return 0.0;
        }
        4.0 * self.area() / perimeter
    }

    pub fn edge_metric(&self) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.perimeter() / (2.0 * area)
    }

    pub fn min_open_gap(&self) -> Option<f64> {
        self.open_leaves().map(ClippedLeaf::gap).reduce(f64::min)
    }

    pub fn small_aperture_flags(&self) -> SmallApertureFlags {
        SmallApertureFlags::from_min_gap(self.min_open_gap())
    }
}

fn mean_over_open(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::{ClippedAperture, SmallApertureFlags, ca_area, effective_width, jaw_area, lsv_bank};
    use crate::domain::{ControlPoint, JawPositions, MlcPositions};

    const BOUNDS: [f64; 5] = [-10.0, -5.0, 0.0, 5.0, 10.0];

    fn control_point(bank_a: Vec<f64>, bank_b: Vec<f64>, jaws: JawPositions) -> ControlPoint {
        ControlPoint::new(0, 0.0, 0.0, MlcPositions::new(bank_a, bank_b), jaws)
    }

    #[test]
    fn effective_width_clips_to_jaw() {
        assert_eq!(effective_width(&BOUNDS, 0, -7.0, 10.0), 2.0);
        assert_eq!(effective_width(&BOUNDS, 1, -7.0, 10.0), 5.0);
        assert_eq!(effective_width(&BOUNDS, 0, 0.0, 10.0), 0.0);
        assert_eq!(effective_width(&BOUNDS, 9, -10.0, 10.0), 0.0);
    }

    #[test]
    fn ca_area_counts_only_active_open_pairs() {
        let bank_a = [-5.0, -5.0, 0.0, -5.0];
        let bank_b = [5.0, 5.0, 0.0, 5.0];
        let active = [true, false, true, true];
        let area = ca_area(&bank_a, &bank_b, &BOUNDS, -10.0, 10.0, &active);
        assert_eq!(area, 100.0);
    }

    #[test]
    fn lsv_of_uniform_bank_is_one() {
        assert_eq!(lsv_bank(&[-5.0, -5.0, -5.0], &[true, true, true]), 1.0);
        assert_eq!(lsv_bank(&[-5.0, 3.0], &[true, false]), 1.0);
    }

    #[test]
    fn lsv_follows_masi_formula() {
        let lsv = lsv_bank(&[0.0, 2.0, 6.0], &[true, true, true]);
        // differences 2 and 4: (1 - 0.5 + 1 - 1) / 2
        assert!((lsv - 0.25).abs() < 1.0e-12);
    }

    #[test]
    fn closed_aperture_has_zero_area() {
        let cp = control_point(
            vec![0.0; 4],
            vec![0.0; 4],
            JawPositions::new(-10.0, 10.0, -10.0, 10.0),
        );
        let aperture = ClippedAperture::from_control_point(&cp, &BOUNDS);
        assert_eq!(aperture.area(), 0.0);
        assert_eq!(aperture.perimeter(), 0.0);
        assert_eq!(aperture.irregularity(), 1.0);
        assert_eq!(aperture.small_aperture_flags(), SmallApertureFlags::default());
    }

    #[test]
    fn jaws_clip_both_axes() {
        let cp = control_point(
            vec![-20.0; 4],
            vec![20.0; 4],
            JawPositions::new(-5.0, 5.0, -7.5, 7.5),
        );
        let aperture = ClippedAperture::from_control_point(&cp, &BOUNDS);
        assert_eq!(aperture.area(), 150.0);
        assert_eq!(aperture.open_leaf_count(), 4);
    }

    #[test]
    fn unrecorded_jaws_do_not_clip() {
        let cp = control_point(vec![-20.0; 4], vec![20.0; 4], JawPositions::default());
        let aperture = ClippedAperture::from_control_point(&cp, &BOUNDS);
        assert_eq!(aperture.area(), 800.0);
    }

    #[test]
    fn rectangle_perimeter_and_shape_indices() {
        let cp = control_point(vec![-10.0; 4], vec![10.0; 4], JawPositions::default());
        let aperture = ClippedAperture::from_control_point(&cp, &BOUNDS);
        assert_eq!(aperture.perimeter(), 80.0);
        assert_eq!(aperture.equivalent_field_size(), 20.0);
        assert_eq!(aperture.edge_metric(), 0.1);
        assert!((aperture.irregularity() - 4.0 / std::f64::consts::PI).abs() < 1.0e-12);
        assert_eq!(aperture.tongue_and_groove(), 0.0);
        assert_eq!(aperture.mean_asymmetry(), 0.0);
        assert_eq!(aperture.leaf_gap(), 20.0);
    }

    #[test]
    fn stepped_aperture_adds_tip_offsets() {
        let cp = control_point(
            vec![-10.0, -6.0, 0.0, 0.0],
            vec![10.0, 6.0, 0.0, 0.0],
            JawPositions::default(),
        );
        let aperture = ClippedAperture::from_control_point(&cp, &BOUNDS);
        // top 20, step 4 + 4, caps 4 * 5, bottom 12
        assert_eq!(aperture.perimeter(), 60.0);
        // (4 + 4) / 4 + 12 / 2 over 100 + 60
        assert!((aperture.tongue_and_groove() - 8.0 / 160.0).abs() < 1.0e-12);
    }

    #[test]
    fn small_aperture_flags_use_minimum_open_gap() {
        let cp = control_point(
            vec![-1.5, -10.0, 0.0, 0.0],
            vec![1.5, 10.0, 0.0, 0.0],
            JawPositions::default(),
        );
        let flags = ClippedAperture::from_control_point(&cp, &BOUNDS).small_aperture_flags();
        assert!(!flags.below_2mm);
        assert!(flags.below_5mm && flags.below_10mm && flags.below_20mm);
    }

    #[test]
    fn jaw_area_is_never_negative() {
        assert_eq!(jaw_area(&JawPositions::new(-50.0, 50.0, -20.0, 20.0)), 4000.0);
        assert_eq!(jaw_area(&JawPositions::new(10.0, -10.0, -20.0, 20.0)), 0.0);
    }

    #[test]
    fn non_finite_leaves_are_closed_with_or_without_x_jaws() {
        let recorded = JawPositions::new(-50.0, 50.0, -10.0, 10.0);
        let unrecorded_x = JawPositions::new(0.0, 0.0, -10.0, 10.0);

        for (bank_a, bank_b) in [
            (f64::NAN, f64::NAN),
            (f64::NEG_INFINITY, f64::INFINITY),
            (-5.0, f64::NAN),
        ] {
            for jaws in [recorded, unrecorded_x] {
                let cp = control_point(
                    vec![bank_a, -5.0, 0.0, 0.0],
                    vec![bank_b, 5.0, 0.0, 0.0],
                    jaws,
                );
                let aperture = ClippedAperture::from_control_point(&cp, &BOUNDS);
                assert_eq!(aperture.area(), 50.0, "leaf ({bank_a}, {bank_b}) with {jaws:?}");
                assert_eq!(aperture.open_leaf_count(), 1);
                assert!(!aperture.leaves()[0].is_open());
                assert!(aperture.perimeter().is_finite());
            }
        }
    }
}
