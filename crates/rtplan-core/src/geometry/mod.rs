pub mod aperture;
pub mod control_arc;
pub mod leaves;

pub use aperture::{
    ClippedAperture, ClippedLeaf, SmallApertureFlags, ca_area, effective_width, jaw_area, lsv_bank,
};
pub use control_arc::{ControlArc, build_control_arcs, determine_active_leaves, plan_min_gap};
pub use leaves::{compute_leaf_boundaries, effective_leaf_boundaries};
