pub mod cycle;
pub mod decision;
pub mod evaluator;
pub mod health_monitor;
pub mod schedule;

pub use cycle::{CycleReport, WateringCycle};
pub use decision::DecisionEngine;
pub use evaluator::ZoneEvaluator;
pub use health_monitor::HealthMonitor;
