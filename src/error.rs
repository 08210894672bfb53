use thiserror::Error;

#[derive(Error, Debug)]
pub enum GardenError {
    #[error("Configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Zone {0} is not configured")]
    ZoneNotConfigured(u32),

    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("Relay error: {0}")]
    Hardware(String),

    #[error("Emergency detected in zone {zone_id}: {reason}")]
    EmergencyDetected { zone_id: u32, reason: String },

    #[error("Weather provider error: {0}")]
    WeatherProvider(String),

    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("Vision feed error: {0}")]
    Vision(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, GardenError>;
