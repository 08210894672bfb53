use crate::error::{GardenError, Result};
use crate::models::{PlantType, SoilType, SunExposure, WeatherSnapshot, Zone};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Upper bound for any configured runtime limit (one day)
pub const MAX_RUNTIME_CEILING_MINUTES: f64 = 24.0 * 60.0;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SystemConfig {
    #[serde(default = "default_system_name")]
    pub name: String,
    #[serde(default = "default_true")]
    pub simulation_mode: bool,
    #[serde(default)]
    pub log_level: Option<String>,
    /// Real-time length of a simulated watering hold
    #[serde(default = "default_simulated_hold_ms")]
    pub simulated_hold_ms: u64,
    #[serde(default = "default_config_poll_seconds")]
    pub config_poll_seconds: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: default_system_name(),
            simulation_mode: true,
            log_level: None,
            simulated_hold_ms: default_simulated_hold_ms(),
            config_poll_seconds: default_config_poll_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HardwareConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            gpio_root: default_gpio_root(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(rename = "type", default)]
    pub polarity: RelayPolarity,
    /// `zone_<id>` -> GPIO line
    #[serde(default)]
    pub in_pins: BTreeMap<String, u32>,
}

/// Which electrical level energises a relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayPolarity {
    #[default]
    ActiveLow,
    ActiveHigh,
}

impl RelayPolarity {
    /// Pin level (true = high) that puts the relay in the requested state
    pub fn level(&self, on: bool) -> bool {
        match self {
            RelayPolarity::ActiveLow => !on,
            RelayPolarity::ActiveHigh => on,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_max_runtime")]
    pub max_continuous_runtime_minutes: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            max_continuous_runtime_minutes: default_max_runtime(),
        }
    }
}

#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct WeatherConfig {
    /// `openweather`, `static` or `none`
    #[serde(default = "default_weather_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub location: WeatherLocation,
    #[serde(default = "default_weather_cache_minutes")]
    pub cache_minutes: u64,
    /// Fixed conditions used by the `static` provider
    #[serde(rename = "static", default)]
    pub fixed: Option<WeatherSnapshot>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            provider: default_weather_provider(),
            api_key: String::new(),
            location: WeatherLocation::default(),
            cache_minutes: default_weather_cache_minutes(),
            fixed: None,
        }
    }
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("location", &self.location)
            .field("cache_minutes", &self.cache_minutes)
            .field("fixed", &self.fixed)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WeatherLocation {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,
}

impl Default for WeatherLocation {
    fn default() -> Self {
        Self {
            city: String::new(),
            state: None,
            country: default_country(),
        }
    }
}

impl WeatherLocation {
    /// OpenWeatherMap `q=` query: `city,state,country` or `city,country`
    pub fn query(&self) -> String {
        match self.state.as_deref().filter(|s| !s.is_empty()) {
            Some(state) => format!("{},{},{}", self.city, state, self.country),
            None => format!("{},{}", self.city, self.country),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SensorsConfig {
    /// `homeassistant` or `static`
    #[serde(default = "default_sensor_provider")]
    pub provider: String,
    #[serde(default)]
    pub homeassistant: Option<HomeAssistantConfig>,
    /// `zone_<id>` -> soil moisture %, used by the `static` provider
    #[serde(rename = "static", default)]
    pub fixed: BTreeMap<String, f64>,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            provider: default_sensor_provider(),
            homeassistant: None,
            fixed: BTreeMap::new(),
        }
    }
}

#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct HomeAssistantConfig {
    pub url: String,
    pub token: String,
}

impl std::fmt::Debug for HomeAssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VisionConfig {
    /// Directory where the inference pipeline drops `zone_<id>.json`
    #[serde(default)]
    pub detections_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `daily` or `every_x_days`
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default = "default_every_x_days")]
    pub every_x_days: u32,
    /// Local "HH:MM"; when unset the schedule is checked on every tick
    #[serde(default)]
    pub start_time: Option<String>,
    /// Zones a cycle covers; empty means every configured zone
    #[serde(default)]
    pub zones: Vec<u32>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: default_frequency(),
            every_x_days: default_every_x_days(),
            start_time: None,
            zones: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_health_interval")]
    pub health_interval_seconds: u64,
    #[serde(default = "default_schedule_check")]
    pub schedule_check_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            health_interval_seconds: default_health_interval(),
            schedule_check_seconds: default_schedule_check(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ZoneConfig {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_plant_type")]
    pub plant_type: String,
    #[serde(default = "default_sun_exposure")]
    pub sun_exposure: String,
    #[serde(default = "default_soil_type")]
    pub soil_type: String,
    #[serde(default)]
    pub max_runtime_minutes: Option<f64>,
    /// Home Assistant entity reporting soil moisture %
    #[serde(default)]
    pub moisture_entity: Option<String>,
    /// Home Assistant entity reporting soil temperature °C
    #[serde(default)]
    pub temperature_entity: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_system_name() -> String {
    "gardenops".into()
}

fn default_simulated_hold_ms() -> u64 {
    500
}

fn default_config_poll_seconds() -> u64 {
    2
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from(DEFAULT_GPIO_ROOT)
}

fn default_max_runtime() -> f64 {
    60.0
}

fn default_weather_provider() -> String {
    "openweather".into()
}

fn default_weather_cache_minutes() -> u64 {
    30
}

fn default_country() -> String {
    "US".into()
}

fn default_sensor_provider() -> String {
    "static".into()
}

fn default_frequency() -> String {
    "daily".into()
}

fn default_every_x_days() -> u32 {
    1
}

fn default_health_interval() -> u64 {
    300
}

fn default_schedule_check() -> u64 {
    60
}

fn default_plant_type() -> String {
    "other".into()
}

fn default_sun_exposure() -> String {
    "partial_shade".into()
}

fn default_soil_type() -> String {
    "loam".into()
}

fn check_runtime(field: &str, minutes: f64) -> Result<()> {
    if !minutes.is_finite() || !(0.0..=MAX_RUNTIME_CEILING_MINUTES).contains(&minutes) {
        return Err(GardenError::Config(format!(
            "{} must be between 0 and {} minutes, got {}",
            field, MAX_RUNTIME_CEILING_MINUTES, minutes
        )));
    }
    Ok(())
}

fn zone_key(zone_id: u32) -> String {
    format!("zone_{}", zone_id)
}

impl Config {
    /// Parse a YAML document into the raw tree and the typed view of it.
    ///
    /// `${VAR}` placeholders are substituted from the environment first.
    pub fn parse(content: &str) -> Result<(Self, serde_yaml::Value)> {
        let content = Self::substitute_env_vars(content);

        let document: serde_yaml::Value = serde_yaml::from_str(&content)
            .map_err(|e| GardenError::Config(format!("Failed to parse config: {}", e)))?;

        // An empty file parses as null; treat it like an empty mapping
        let document = match document {
            serde_yaml::Value::Null => serde_yaml::Value::Mapping(Default::default()),
            other => other,
        };

        let config: Config = serde_yaml::from_value(document.clone())
            .map_err(|e| GardenError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;

        Ok((config, document))
    }

    fn validate(&self) -> Result<()> {
        check_runtime(
            "thresholds.max_continuous_runtime_minutes",
            self.thresholds.max_continuous_runtime_minutes,
        )?;

        let mut seen = HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.id) {
                return Err(GardenError::Config(format!(
                    "zone id {} is listed more than once",
                    zone.id
                )));
            }
            if let Some(max) = zone.max_runtime_minutes {
                check_runtime(&format!("zone {} max_runtime_minutes", zone.id), max)?;
            }
        }

        if self.monitor.health_interval_seconds == 0 || self.monitor.schedule_check_seconds == 0 {
            return Err(GardenError::Config(
                "monitor intervals must be at least one second".into(),
            ));
        }

        Ok(())
    }

    pub fn zone(&self, zone_id: u32) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.id == zone_id)
    }

    pub fn zone_ids(&self) -> Vec<u32> {
        self.zones.iter().map(|z| z.id).collect()
    }

    pub fn pin_for_zone(&self, zone_id: u32) -> Option<u32> {
        self.hardware.relay.in_pins.get(&zone_key(zone_id)).copied()
    }

    pub fn static_moisture(&self, zone_id: u32) -> Option<f64> {
        self.sensors.fixed.get(&zone_key(zone_id)).copied()
    }

    /// Longest continuous run allowed for a zone: its own cap, never above the global one.
    /// A non-finite zone cap is ignored.
    pub fn runtime_limit(&self, zone_id: u32) -> f64 {
        let global = self.thresholds.max_continuous_runtime_minutes.max(0.0);
        self.zone(zone_id)
            .and_then(|z| z.max_runtime_minutes)
            .filter(|m| m.is_finite())
            .map(|m| m.clamp(0.0, global))
            .unwrap_or(global)
    }

    /// Decision-engine view of a configured zone.
    ///
    /// Unrecognised plant, sun or soil strings fall back to the neutral variants.
    pub fn zone_context(&self, zone_id: u32) -> Option<Zone> {
        let zone = self.zone(zone_id)?;

        let plant_type = PlantType::from_str(&zone.plant_type).unwrap_or_else(|| {
            tracing::warn!(zone_id, plant_type = %zone.plant_type, "Unknown plant type, using defaults");
            PlantType::Other
        });
        let sun_exposure = SunExposure::from_str(&zone.sun_exposure).unwrap_or(SunExposure::Unknown);
        let soil_type = SoilType::from_str(&zone.soil_type).unwrap_or(SoilType::Unknown);

        let name = if zone.name.is_empty() {
            format!("Zone {}", zone.id)
        } else {
            zone.name.clone()
        };

        Some(Zone {
            id: zone.id,
            name,
            plant_type,
            sun_exposure,
            soil_type,
            max_runtime_minutes: self.runtime_limit(zone_id),
        })
    }

    /// Search for the config file in standard locations.
    /// Returns the first existing path, or the XDG default path if none is found.
    pub fn find_config_path(config_override: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(p) = config_override {
            return Ok(p.clone());
        }

        // Try current directory first
        let local_config = PathBuf::from("config/gardenops.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().ok_or_else(|| {
            GardenError::ConfigUnavailable("Cannot determine config directory".into())
        })?;
        Ok(config_dir.join("gardenops").join("config.yaml"))
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        // Find all ${VAR_NAME} patterns and substitute
        let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
            Ok(re) => re,
            Err(_) => return result,
        };

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        // CLI override takes priority
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        // Then check env var
        if let Ok(dir) = std::env::var("GARDENOPS_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        // Use XDG data directory
        let data_dir = dirs::data_dir()
            .ok_or_else(|| GardenError::Config("Cannot determine data directory".into()))?
            .join("gardenops");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join("gardenops.db")
    }

    pub fn watering_log_path(data_dir: &Path) -> PathBuf {
        data_dir.join("watering.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
system:
  simulation_mode: true
  log_level: debug
hardware:
  relay:
    type: active_high
    in_pins:
      zone_1: 17
      zone_2: 27
thresholds:
  max_continuous_runtime_minutes: 45
zones:
  - id: 1
    name: Front lawn
    plant_type: turf
    sun_exposure: full_sun
    soil_type: loam
  - id: 2
    plant_type: cactus
    sun_exposure: shade
    soil_type: sandy
    max_runtime_minutes: 10
"#;

    #[test]
    fn parses_sample_document() {
        let (config, document) = Config::parse(SAMPLE).unwrap();
        assert!(config.system.simulation_mode);
        assert_eq!(config.hardware.relay.polarity, RelayPolarity::ActiveHigh);
        assert_eq!(config.pin_for_zone(1), Some(17));
        assert_eq!(config.pin_for_zone(3), None);
        assert_eq!(config.zones.len(), 2);
        assert_eq!(
            document["hardware"]["relay"]["in_pins"]["zone_2"].as_u64(),
            Some(27)
        );
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let (config, _) = Config::parse("zones: []").unwrap();
        assert_eq!(config.hardware.relay.polarity, RelayPolarity::ActiveLow);
        assert_eq!(config.thresholds.max_continuous_runtime_minutes, 60.0);
        assert_eq!(config.monitor.health_interval_seconds, 300);
        assert_eq!(config.system.config_poll_seconds, 2);
        assert_eq!(config.schedule.frequency, "daily");
        assert_eq!(config.hardware.gpio_root, PathBuf::from(DEFAULT_GPIO_ROOT));
    }

    #[test]
    fn empty_document_is_default() {
        let (config, _) = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn runtime_limit_respects_zone_override() {
        let (config, _) = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.runtime_limit(1), 45.0);
        assert_eq!(config.runtime_limit(2), 10.0);
        // Unknown zones still get the global ceiling
        assert_eq!(config.runtime_limit(99), 45.0);
    }

    #[test]
    fn zone_context_falls_back_on_unknown_values() {
        let (config, _) = Config::parse(SAMPLE).unwrap();
        let zone = config.zone_context(2).unwrap();
        assert_eq!(zone.plant_type, PlantType::Other);
        assert_eq!(zone.soil_type, SoilType::Sandy);
        assert_eq!(zone.name, "Zone 2");
        assert_eq!(zone.max_runtime_minutes, 10.0);
        assert!(config.zone_context(42).is_none());
    }

    #[test]
    fn relay_polarity_levels() {
        assert!(!RelayPolarity::ActiveLow.level(true));
        assert!(RelayPolarity::ActiveLow.level(false));
        assert!(RelayPolarity::ActiveHigh.level(true));
        assert!(!RelayPolarity::ActiveHigh.level(false));
    }

    #[test]
    fn rejects_duplicate_zone_ids() {
        let doc = "zones:\n  - id: 1\n  - id: 1\n";
        let err = Config::parse(doc).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn rejects_negative_runtime() {
        let doc = "thresholds:\n  max_continuous_runtime_minutes: -1\n";
        assert!(Config::parse(doc).is_err());
    }

    #[test]
    fn rejects_invalid_zone_runtime() {
        for value in [".nan", ".inf", "-3"] {
            let doc = format!("zones:\n  - id: 1\n    max_runtime_minutes: {}\n", value);
            let err = Config::parse(&doc).unwrap_err();
            assert!(err.to_string().contains("zone 1"), "{}: {}", value, err);
        }
    }

    #[test]
    fn rejects_runtime_above_ceiling() {
        let doc = "thresholds:\n  max_continuous_runtime_minutes: 1e300\n";
        assert!(Config::parse(doc).is_err());

        let doc = "zones:\n  - id: 1\n    max_runtime_minutes: 100000\n";
        assert!(Config::parse(doc).is_err());

        let doc = "thresholds:\n  max_continuous_runtime_minutes: 1440\n";
        assert!(Config::parse(doc).is_ok());
    }

    #[test]
    fn non_finite_zone_cap_falls_back_to_global() {
        let (mut config, _) = Config::parse(SAMPLE).unwrap();
        config.zones[1].max_runtime_minutes = Some(f64::NAN);
        assert_eq!(config.runtime_limit(config.zones[1].id), 45.0);
    }

    #[test]
    fn rejects_unknown_relay_type() {
        let doc = "hardware:\n  relay:\n    type: sideways\n";
        assert!(Config::parse(doc).is_err());
    }

    #[test]
    fn substitutes_environment_variables() {
        std::env::set_var("GARDENOPS_TEST_OWM_KEY", "abc123");
        let doc = "weather:\n  api_key: ${GARDENOPS_TEST_OWM_KEY}\n";
        let (config, _) = Config::parse(doc).unwrap();
        assert_eq!(config.weather.api_key, "abc123");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let doc = "weather:\n  api_key: supersecret\nsensors:\n  homeassistant:\n    url: http://ha.local\n    token: tok\n";
        let (config, _) = Config::parse(doc).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("supersecret"));
        assert!(!debug.contains("\"tok\""));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn weather_location_query() {
        let mut location = WeatherLocation {
            city: "Austin".into(),
            state: Some("TX".into()),
            country: "US".into(),
        };
        assert_eq!(location.query(), "Austin,TX,US");
        location.state = None;
        assert_eq!(location.query(), "Austin,US");
    }
}
