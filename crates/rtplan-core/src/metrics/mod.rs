pub mod beam;
pub mod model;
pub mod plan;

pub use beam::{UnionAperture, calculate_beam_metrics};
pub use model::{BeamMetrics, ControlPointMetrics, PlanMetrics};
pub use plan::{aggregate_plan_metrics, calculate_plan_metrics};
