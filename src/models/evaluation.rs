use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WeatherSnapshot;

/// What a zone's hydration score says about watering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HydrationRecommendation {
    WaterNow,
    Monitor,
    Hold,
}

impl HydrationRecommendation {
    /// Thresholds: below 40 water now, below 70 monitor, otherwise hold
    pub fn from_score(score: f64) -> Self {
        if score < 40.0 {
            HydrationRecommendation::WaterNow
        } else if score < 70.0 {
            HydrationRecommendation::Monitor
        } else {
            HydrationRecommendation::Hold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HydrationRecommendation::WaterNow => "WATER_NOW",
            HydrationRecommendation::Monitor => "MONITOR",
            HydrationRecommendation::Hold => "HOLD",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            HydrationRecommendation::WaterNow => {
                "Soil significantly drier than ideal for this plant and conditions."
            }
            HydrationRecommendation::Monitor => {
                "Soil slightly below ideal; monitor based on upcoming weather and usage."
            }
            HydrationRecommendation::Hold => {
                "Soil within or above ideal range; no immediate watering needed."
            }
        }
    }
}

impl std::fmt::Display for HydrationRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The decision engine's verdict for one zone.
///
/// This is the only record handed to callers outside the core (CLI output,
/// health snapshots, watering cycles).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneEvaluationResult {
    pub zone_id: u32,
    pub ideal_duration_minutes: f64,
    pub health_score: f64,
    pub recommendation: HydrationRecommendation,
    pub emergency_detected: bool,
    pub emergency_reason: Option<String>,
    pub weather_available: bool,
    pub notes: String,
}

impl ZoneEvaluationResult {
    pub fn emergency(zone_id: u32, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            zone_id,
            ideal_duration_minutes: 0.0,
            health_score: 0.0,
            recommendation: HydrationRecommendation::Hold,
            emergency_detected: true,
            notes: format!("Watering blocked: {}", reason),
            emergency_reason: Some(reason),
            weather_available: false,
        }
    }

    /// True when executing this result would open a valve
    pub fn wants_water(&self) -> bool {
        !self.emergency_detected && self.ideal_duration_minutes > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneFailure {
    pub zone_id: u32,
    pub error: String,
}

impl ZoneFailure {
    pub fn new(zone_id: u32, error: impl std::fmt::Display) -> Self {
        Self {
            zone_id,
            error: error.to_string(),
        }
    }
}

/// Per-zone outcome of evaluating a set of zones
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<ZoneEvaluationResult>,
    pub failures: Vec<ZoneFailure>,
}

impl BatchReport {
    pub fn push(&mut self, zone_id: u32, outcome: crate::error::Result<ZoneEvaluationResult>) {
        match outcome {
            Ok(result) => self.results.push(result),
            Err(e) => self.failures.push(ZoneFailure::new(zone_id, e)),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn emergencies(&self) -> impl Iterator<Item = &ZoneEvaluationResult> {
        self.results.iter().filter(|r| r.emergency_detected)
    }
}

/// Periodic observability record produced by the health monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub taken_at: DateTime<Utc>,
    pub simulation_mode: bool,
    pub config_version: u64,
    pub zones: Vec<ZoneEvaluationResult>,
    pub failures: Vec<ZoneFailure>,
    pub weather: Option<WeatherSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GardenError;

    #[test]
    fn recommendation_boundaries() {
        assert_eq!(
            HydrationRecommendation::from_score(39.9),
            HydrationRecommendation::WaterNow
        );
        assert_eq!(
            HydrationRecommendation::from_score(40.0),
            HydrationRecommendation::Monitor
        );
        assert_eq!(
            HydrationRecommendation::from_score(69.9),
            HydrationRecommendation::Monitor
        );
        assert_eq!(
            HydrationRecommendation::from_score(70.0),
            HydrationRecommendation::Hold
        );
    }

    #[test]
    fn recommendation_serializes_in_upper_snake_case() {
        let json = serde_json::to_string(&HydrationRecommendation::WaterNow).unwrap();
        assert_eq!(json, "\"WATER_NOW\"");
    }

    #[test]
    fn emergency_result_never_waters() {
        let result = ZoneEvaluationResult::emergency(3, "leak detected");
        assert!(result.emergency_detected);
        assert_eq!(result.ideal_duration_minutes, 0.0);
        assert!(!result.wants_water());
        assert_eq!(result.emergency_reason.as_deref(), Some("leak detected"));
    }

    #[test]
    fn batch_report_keeps_failures_separate() {
        let mut report = BatchReport::default();
        report.push(1, Ok(ZoneEvaluationResult::emergency(1, "mud")));
        report.push(2, Err(GardenError::ZoneNotConfigured(2)));

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].zone_id, 2);
        assert!(!report.is_clean());
        assert_eq!(report.emergencies().count(), 1);
    }
}
