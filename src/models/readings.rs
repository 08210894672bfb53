use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Soil sensor reading for one zone, taken for a single evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Volumetric soil moisture, 0-100 %
    pub soil_moisture: f64,
    /// Soil temperature in °C, when the zone has a probe
    #[serde(default)]
    pub soil_temperature: Option<f64>,
}

impl SensorSnapshot {
    pub fn new(soil_moisture: f64) -> Self {
        Self {
            soil_moisture,
            soil_temperature: None,
        }
    }

    pub fn with_temperature(mut self, celsius: f64) -> Self {
        self.soil_temperature = Some(celsius);
        self
    }

    /// Moisture is finite and inside the 0-100 % range
    pub fn is_valid(&self) -> bool {
        self.soil_moisture.is_finite() && (0.0..=100.0).contains(&self.soil_moisture)
    }
}

/// Current conditions plus the 24h rain outlook, in metric units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Air temperature in °C
    pub temperature: f64,
    /// Relative humidity, 0-100 %
    pub humidity: f64,
    /// Rain that fell over the last 24 hours, mm
    pub recent_rain_24h: f64,
    /// Rain expected over the next 24 hours, mm
    pub forecast_rain_24h: f64,
    /// Probability of precipitation over the next 24 hours, 0-1
    #[serde(default)]
    pub rain_probability: f64,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn new(temperature: f64, humidity: f64, recent_rain_24h: f64, forecast_rain_24h: f64) -> Self {
        Self {
            temperature,
            humidity,
            recent_rain_24h,
            forecast_rain_24h,
            rain_probability: 0.0,
            fetched_at: Utc::now(),
        }
    }
}

/// One object found by the vision pipeline in a zone camera frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionDetection {
    pub label: String,
    pub confidence: f64,
    /// Bounding box as `[x1, y1, x2, y2]` in image pixels
    #[serde(default)]
    pub bbox: [f64; 4],
}

impl VisionDetection {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: [0.0; 4],
        }
    }

    /// Label lowercased with spaces and dashes folded to underscores
    pub fn normalized_label(&self) -> String {
        self.label.trim().to_lowercase().replace([' ', '-'], "_")
    }
}
