use super::policy::ScoringPolicy;
use crate::models::VisionDetection;

/// A hazard seen on the ground that makes watering unsafe
#[derive(Debug, Clone, PartialEq)]
pub struct Hazard {
    pub label: String,
    pub confidence: f64,
}

impl Hazard {
    pub fn reason(&self) -> String {
        format!(
            "{} detected with confidence {:.2}",
            self.label.replace('_', " "),
            self.confidence
        )
    }
}

/// First detection whose label is a hazard and whose confidence clears the
/// threshold. Detections are checked in order.
pub fn detect(policy: &ScoringPolicy, detections: &[VisionDetection]) -> Option<Hazard> {
    detections.iter().find_map(|d| {
        let label = d.normalized_label();
        (policy.is_hazard(&label) && d.confidence > policy.hazard_confidence).then(|| Hazard {
            label,
            confidence: d.confidence,
        })
    })
}
