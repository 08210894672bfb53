use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantType {
    Turf,
    Vegetable,
    Shrub,
    Succulent,
    Other,
}

impl PlantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlantType::Turf => "turf",
            PlantType::Vegetable => "vegetable",
            PlantType::Shrub => "shrub",
            PlantType::Succulent => "succulent",
            PlantType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "turf" | "lawn" | "grass" => Some(PlantType::Turf),
            "vegetable" | "vegetables" => Some(PlantType::Vegetable),
            "shrub" | "shrubs" => Some(PlantType::Shrub),
            "succulent" | "succulents" => Some(PlantType::Succulent),
            "other" => Some(PlantType::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunExposure {
    FullSun,
    PartialShade,
    Shade,
    Unknown,
}

impl SunExposure {
    pub fn as_str(&self) -> &'static str {
        match self {
            SunExposure::FullSun => "full_sun",
            SunExposure::PartialShade => "partial_shade",
            SunExposure::Shade => "shade",
            SunExposure::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "full_sun" | "sun" => Some(SunExposure::FullSun),
            "partial_shade" | "partial_sun" => Some(SunExposure::PartialShade),
            "shade" | "full_shade" => Some(SunExposure::Shade),
            _ => None,
        }
    }
}

impl std::fmt::Display for SunExposure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilType {
    Sandy,
    Loam,
    Clay,
    Unknown,
}

impl SoilType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoilType::Sandy => "sandy",
            SoilType::Loam => "loam",
            SoilType::Clay => "clay",
            SoilType::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sandy" | "sand" => Some(SoilType::Sandy),
            "loam" => Some(SoilType::Loam),
            "clay" => Some(SoilType::Clay),
            _ => None,
        }
    }
}

impl std::fmt::Display for SoilType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zone metadata as seen by the decision engine.
///
/// Built from one configuration snapshot; a reload produces new `Zone` values
/// rather than mutating existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: u32,
    pub name: String,
    pub plant_type: PlantType,
    pub sun_exposure: SunExposure,
    pub soil_type: SoilType,
    /// Upper bound for a single continuous watering run in this zone
    pub max_runtime_minutes: f64,
}

impl Zone {
    pub fn new(id: u32, plant_type: PlantType, sun_exposure: SunExposure, soil_type: SoilType) -> Self {
        Self {
            id,
            name: format!("Zone {}", id),
            plant_type,
            sun_exposure,
            soil_type,
            max_runtime_minutes: 60.0,
        }
    }

    pub fn with_max_runtime(mut self, minutes: f64) -> Self {
        self.max_runtime_minutes = minutes.max(0.0);
        self
    }
}
