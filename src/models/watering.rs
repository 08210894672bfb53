use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WateringAction {
    Start,
    Stop,
}

impl WateringAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WateringAction::Start => "start",
            WateringAction::Stop => "stop",
        }
    }
}

impl std::fmt::Display for WateringAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit record appended by the irrigation controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WateringEvent {
    pub timestamp: DateTime<Local>,
    pub action: WateringAction,
    pub zone: u32,
    pub duration_minutes: f64,
}

impl WateringEvent {
    pub fn start(zone: u32, duration_minutes: f64) -> Self {
        Self {
            timestamp: Local::now(),
            action: WateringAction::Start,
            zone,
            duration_minutes,
        }
    }

    pub fn stop(zone: u32, duration_minutes: f64) -> Self {
        Self {
            timestamp: Local::now(),
            action: WateringAction::Stop,
            zone,
            duration_minutes,
        }
    }
}

/// What a call to `IrrigationController::water` actually did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WateringOutcome {
    pub zone_id: u32,
    pub requested_minutes: f64,
    /// Duration after clamping to the runtime limit; 0 means the relay was never touched
    pub duration_minutes: f64,
    pub simulation: bool,
}

impl WateringOutcome {
    pub fn ran(&self) -> bool {
        self.duration_minutes > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_as_log_line() {
        let event = WateringEvent::start(4, 12.5);
        let line = serde_json::to_string(&event).unwrap();
        assert!(line.contains("\"action\":\"start\""));
        assert!(line.contains("\"zone\":4"));
        assert!(line.contains("\"duration_minutes\":12.5"));
        assert!(line.contains("\"timestamp\":"));
    }

    #[test]
    fn outcome_ran_only_with_positive_duration() {
        let outcome = WateringOutcome {
            zone_id: 1,
            requested_minutes: 10.0,
            duration_minutes: 0.0,
            simulation: true,
        };
        assert!(!outcome.ran());
    }
}
