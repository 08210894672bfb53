//! Hydration scorer and emergency detector.
//!
//! `DecisionEngine::evaluate` is a pure function of its inputs: no I/O, no
//! clock, no hidden state. The same zone, readings and detections always
//! produce the same result.

pub mod emergency;
pub mod hydration;
pub mod policy;

pub use policy::ScoringPolicy;

use crate::models::{
    HydrationRecommendation, SensorSnapshot, VisionDetection, WeatherSnapshot, Zone,
    ZoneEvaluationResult,
};

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    policy: ScoringPolicy,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    /// Decide how long `zone` should be watered.
    ///
    /// Hazard detections short-circuit everything else. Without weather the
    /// dryness factor is neutral (0).
    pub fn evaluate(
        &self,
        zone: &Zone,
        sensor: &SensorSnapshot,
        weather: Option<&WeatherSnapshot>,
        detections: &[VisionDetection],
    ) -> ZoneEvaluationResult {
        if let Some(hazard) = emergency::detect(&self.policy, detections) {
            tracing::warn!(zone_id = zone.id, label = %hazard.label, confidence = hazard.confidence, "Emergency condition detected");
            return ZoneEvaluationResult::emergency(zone.id, hazard.reason());
        }

        let ideal = hydration::adjusted_ideal(&self.policy, zone);
        let dryness = weather
            .map(|w| hydration::dryness_factor(&self.policy, w))
            .unwrap_or(0.0);
        let score = hydration::score(&self.policy, sensor.soil_moisture, ideal, dryness);

        let recommendation = HydrationRecommendation::from_score(score);
        let limit = zone.max_runtime_minutes.max(0.0);
        let duration = self.policy.duration_for(score).clamp(0.0, limit);

        let mut notes = format!(
            "{} Moisture {:.1}% vs ideal {:.1}% ({}, {}, {}); dryness {:.2}.",
            recommendation.reason(),
            sensor.soil_moisture,
            ideal,
            zone.plant_type,
            zone.sun_exposure,
            zone.soil_type,
            dryness
        );
        if weather.is_none() {
            notes.push_str(" Weather unavailable, dryness treated as neutral.");
        }

        tracing::debug!(
            zone_id = zone.id,
            score,
            dryness,
            recommendation = %recommendation,
            duration,
            "Zone scored"
        );

        ZoneEvaluationResult {
            zone_id: zone.id,
            ideal_duration_minutes: duration,
            health_score: hydration::round_tenth(score),
            recommendation,
            emergency_detected: false,
            emergency_reason: None,
            weather_available: weather.is_some(),
            notes,
        }
    }
}
