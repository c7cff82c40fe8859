//! Beam's-eye-view polygons for the target and the instantaneous aperture.

use crate::common::constants::MIN_POLYGON_AREA_MM2;
use crate::domain::{GeometryIssue, JawPositions, MlcPositions, Structure};
use crate::geometry::aperture::effective_width;
use crate::geometry::leaves::boundary_pairs;
use geo::{
    Area, BooleanOps, ConvexHull, Coord, Intersects, Line, LineString, MultiPoint, MultiPolygon,
    Point, Polygon, Rect,
};
use tracing::debug;

/// Rotates a patient-space point about the superior-inferior axis into the
/// beam's eye view: `x' = z·sin θ + x·cos θ`, `y' = y`.
pub fn project_point_to_bev(point: &[f64; 3], gantry_angle_deg: f64) -> Coord<f64> {
    let [x, y, z] = *point;
    let (sin, cos) = gantry_angle_deg.to_radians().sin_cos();
    Coord {
        x: z * sin + x * cos,
        y,
    }
}

/// How a structure's outline is drawn in the beam's eye view. Axial
/// contours keep their topology under the BEV rotation, so the choice is
/// made once per structure rather than per gantry angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutline {
    /// The single contour's own ring.
    OwnRing,
    /// Convex hull of every projected point.
    ConvexHull,
}

impl TargetOutline {
    /// A single contour that does not cross itself keeps its ring; several
    /// contours, or one that crosses itself, use the hull.
    pub fn of(structure: &Structure) -> Self {
        match structure.contours.as_slice() {
            [contour] if contour.points.len() >= 3 => {
                let mut ring: LineString<f64> = contour
                    .points
                    .iter()
                    .map(|[x, y, _]| Coord { x: *x, y: *y })
                    .collect();
                ring.close();
                if is_self_intersecting(&ring) {
                    Self::ConvexHull
                } else {
                    Self::OwnRing
                }
            }
            _ => Self::ConvexHull,
        }
    }
}

/// Projected outline of the target at `gantry_angle_deg`.
pub fn target_bev_polygon(structure: &Structure, gantry_angle_deg: f64) -> Option<Polygon<f64>> {
    project_target(structure, TargetOutline::of(structure), gantry_angle_deg)
}

/// Projects the target with an outline already chosen by
/// [`TargetOutline::of`]. A ring that projects edge-on collapses to the
/// hull of its points.
pub fn project_target(
    structure: &Structure,
    outline: TargetOutline,
    gantry_angle_deg: f64,
) -> Option<Polygon<f64>> {
    let points: Vec<Coord<f64>> = structure
        .points()
        .map(|point| project_point_to_bev(point, gantry_angle_deg))
        .collect();
    if points.len() < 3 {
        return None;
    }
    if points.iter().any(|point| !point.x.is_finite() || !point.y.is_finite()) {
        debug!(
            issue = %GeometryIssue::UnprojectableStructure,
            structure = %structure.name,
            "target contains non-finite coordinates"
        );
        return None;
    }

    let own_ring = match outline {
        TargetOutline::OwnRing => Some(Polygon::new(LineString::from(points.clone()), Vec::new()))
            .filter(|ring| ring.unsigned_area() >= MIN_POLYGON_AREA_MM2),
        TargetOutline::ConvexHull => None,
    };

    let polygon = own_ring.unwrap_or_else(|| {
        let cloud: MultiPoint<f64> = points.into_iter().map(Point::from).collect();
        cloud.convex_hull()
    });

    if polygon.unsigned_area() < MIN_POLYGON_AREA_MM2 {
        debug!(
            issue = %GeometryIssue::DegenerateInput,
            structure = %structure.name,
            gantry_angle_deg,
            "projected target has no area"
        );
        return None;
    }
    Some(polygon)
}

/// Checks whether any two non-neighbouring edges of a closed ring touch.
fn is_self_intersecting(ring: &LineString<f64>) -> bool {
    let edges: Vec<Line<f64>> = ring.lines().collect();
    let count = edges.len();
    for (i, edge) in edges.iter().enumerate() {
        for (j, other) in edges.iter().enumerate().skip(i + 2) {
            let wraps_to_start = i == 0 && j == count - 1;
            if !wraps_to_start && edge.intersects(other) {
                return true;
            }
        }
    }
    false
}

/// Union of one jaw-clipped rectangle per open leaf pair, or `None` when no
/// leaf pair leaves any opening.
pub fn aperture_polygon(
    mlc: &MlcPositions,
    jaws: &JawPositions,
    boundaries: &[f64],
) -> Option<MultiPolygon<f64>> {
    let pairs = mlc.pair_count().min(boundary_pairs(boundaries));
    let (x1, x2) = jaws
        .x_opening()
        .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
    let (y1, y2) = jaws
        .y_opening()
        .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));

    let mut aperture: Option<MultiPolygon<f64>> = None;
    for pair in 0..pairs {
        let (bank_a, bank_b) = (mlc.bank_a[pair], mlc.bank_b[pair]);
        if !bank_a.is_finite() || !bank_b.is_finite() {
            debug!(
                issue = %GeometryIssue::MalformedGeometry,
                pair,
                "non-finite leaf position; leaf pair left out of the aperture"
            );
            continue;
        }
        let left = bank_a.max(x1);
        let right = bank_b.min(x2);
        let bottom = boundaries[pair].max(y1);
        let top = boundaries[pair + 1].min(y2);
        if right <= left {
            continue;
        }
        if effective_width(boundaries, pair, y1, y2) <= 0.0 {
            continue;
        }

        let leaf = Rect::new(Coord { x: left, y: bottom }, Coord { x: right, y: top }).to_polygon();
        aperture = Some(match aperture {
            Some(open) => open.union(&MultiPolygon::new(vec![leaf])),
            None => MultiPolygon::new(vec![leaf]),
        });
    }

    aperture.filter(|open| open.unsigned_area() > 0.0)
}
