//! Shared thresholds for the complexity engine.
//!
//! Machine-dependent values live in [`super::config::MachineProfile`]; the
//! constants here are fixed by the metric definitions themselves.

pub const DEFAULT_LEAF_WIDTH_MM: f64 = 5.0;
pub const DEFAULT_LEAF_PAIRS: usize = 60;

pub const DEFAULT_MAX_DOSE_RATE: f64 = 600.0;
pub const DEFAULT_MAX_GANTRY_SPEED: f64 = 4.8;
pub const DEFAULT_MAX_MLC_SPEED: f64 = 25.0;

pub const MM2_PER_CM2: f64 = 100.0;
pub const SECONDS_PER_MINUTE: f64 = 60.0;
pub const FULL_CIRCLE_DEG: f64 = 360.0;

/// Apertures below this open area count towards the small-field fraction.
pub const SMALL_FIELD_AREA_MM2: f64 = 400.0;
pub const SMALL_APERTURE_THRESHOLDS_MM: [f64; 4] = [2.0, 5.0, 10.0, 20.0];

/// Leaf-travel scale in the LTMCS denominator.
pub const LTMCS_TRAVEL_SCALE_MM: f64 = 1000.0;

/// Smallest BEV polygon area treated as a usable target.
pub const MIN_POLYGON_AREA_MM2: f64 = 1.0e-6;
pub const WEIGHT_EPSILON: f64 = 1.0e-12;

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_LEAF_PAIRS, DEFAULT_LEAF_WIDTH_MM, SMALL_APERTURE_THRESHOLDS_MM,
        SMALL_FIELD_AREA_MM2,
    };

    #[test]
    fn default_leaf_stack_spans_thirty_centimetres() {
        assert_eq!(DEFAULT_LEAF_PAIRS as f64 * DEFAULT_LEAF_WIDTH_MM, 300.0);
    }

    #[test]
    fn small_aperture_thresholds_are_increasing() {
        assert!(
            SMALL_APERTURE_THRESHOLDS_MM
                .windows(2)
                .all(|pair| pair[0] < pair[1])
        );
        assert_eq!(SMALL_FIELD_AREA_MM2, 20.0 * 20.0);
    }
}
