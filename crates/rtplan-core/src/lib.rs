//! Complexity and deliverability indices for radiotherapy treatment plans,
//! computed from the machine delivery sequence alone.

pub mod common;
pub mod delivery;
pub mod domain;
pub mod geometry;
pub mod io;
pub mod metrics;
pub mod modulation;
pub mod numerics;

pub use common::{MachineProfile, MachineProfileError, load_machine_profile};
pub use delivery::{DeliveryEstimate, LimitingFactor, estimate_delivery};
pub use domain::{
    Beam, Contour, ControlPoint, JawPositions, MlcPositions, Plan, PlanError, PlanErrorCategory,
    PlanResult, RadiationType, Structure, Technique, validate_plan,
};
pub use io::{InputLoadError, load_plan, load_structure, metrics_to_json, write_metrics};
pub use metrics::{
    BeamMetrics, ControlPointMetrics, PlanMetrics, calculate_beam_metrics, calculate_plan_metrics,
};
pub use modulation::{beam_aperture_modulation, plan_aperture_modulation};
