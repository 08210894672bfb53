use crate::config::{Config, SensorsConfig, VisionConfig, WeatherConfig};
use crate::config_store::ConfigSnapshot;
use crate::datasources::{SensorSource, VisionFeed, WeatherSource};
use crate::error::{GardenError, Result};
use crate::logic::decision::DecisionEngine;
use crate::models::{BatchReport, WeatherSnapshot, ZoneEvaluationResult};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Reachability of the remote collaborators; `None` means not in use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub sensors: Option<bool>,
    pub weather: Option<bool>,
}

impl ConnectionStatus {
    pub fn all_connected(&self) -> bool {
        self.sensors.unwrap_or(true) && self.weather.unwrap_or(true)
    }
}

/// Data sources built from one configuration, kept next to the sections
/// they were built from.
struct Sources {
    sensors_config: SensorsConfig,
    weather_config: WeatherConfig,
    vision_config: VisionConfig,
    sensors: SensorSource,
    weather: WeatherSource,
    vision: VisionFeed,
}

impl Sources {
    fn build(config: &Config) -> Self {
        Self {
            sensors_config: config.sensors.clone(),
            weather_config: config.weather.clone(),
            vision_config: config.vision.clone(),
            sensors: SensorSource::from_config(&config.sensors),
            weather: WeatherSource::from_config(&config.weather),
            vision: VisionFeed::from_dir(config.vision.detections_dir.clone()),
        }
    }

    fn built_from(&self, config: &Config) -> bool {
        self.sensors_config == config.sensors
            && self.weather_config == config.weather
            && self.vision_config == config.vision
    }
}

/// Gathers readings for a zone and runs them through the decision engine.
///
/// One instance is built by the orchestrator and shared by the schedule
/// loop, the health monitor and direct requests. Sources follow the
/// configuration each call is made with, so a reload that changes the
/// sensor, weather or vision sections takes effect on the next evaluation.
pub struct ZoneEvaluator {
    engine: DecisionEngine,
    sources: RwLock<Arc<Sources>>,
}

impl ZoneEvaluator {
    pub fn from_config(config: &Config) -> Self {
        let sources = Sources::build(config);
        info!(
            sensors = sources.sensors.name(),
            weather = sources.weather.name(),
            vision = matches!(sources.vision, VisionFeed::Directory(_)),
            "Zone evaluator ready"
        );
        Self {
            engine: DecisionEngine::new(),
            sources: RwLock::new(Arc::new(sources)),
        }
    }

    /// Sources for `config`, rebuilt when its collaborator sections differ
    /// from the ones currently in use. An unchanged rebuild keeps the
    /// weather cache.
    fn sources(&self, config: &Config) -> Arc<Sources> {
        {
            let current = self.sources.read().unwrap_or_else(PoisonError::into_inner);
            if current.built_from(config) {
                return Arc::clone(&current);
            }
        }

        let rebuilt = Arc::new(Sources::build(config));
        info!(
            sensors = rebuilt.sensors.name(),
            weather = rebuilt.weather.name(),
            vision = matches!(rebuilt.vision, VisionFeed::Directory(_)),
            "Data sources rebuilt for new configuration"
        );
        *self.sources.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&rebuilt);
        rebuilt
    }

    pub async fn check_connections(&self, config: &Config) -> ConnectionStatus {
        let sources = self.sources(config);
        ConnectionStatus {
            sensors: sources.sensors.test_connection().await,
            weather: sources.weather.test_connection().await,
        }
    }

    /// One weather snapshot for a batch. Provider failures are soft: logged,
    /// and the batch is scored with neutral dryness.
    pub async fn fetch_weather(&self, config: &Config) -> Option<WeatherSnapshot> {
        match self.sources(config).weather.current(config).await {
            Ok(weather) => weather,
            Err(e) => {
                warn!(error = %e, "Weather unavailable, scoring with neutral dryness");
                None
            }
        }
    }

    pub async fn evaluate_zone(
        &self,
        snapshot: &ConfigSnapshot,
        zone_id: u32,
        weather: Option<&WeatherSnapshot>,
    ) -> Result<ZoneEvaluationResult> {
        let config = &snapshot.config;
        let zone = config
            .zone_context(zone_id)
            .ok_or(GardenError::ZoneNotConfigured(zone_id))?;

        let sources = self.sources(config);
        let sensor = sources.sensors.read(config, zone_id).await?;
        // An unreadable detection file means safety cannot be confirmed
        let detections = sources.vision.detections(zone_id)?;

        Ok(self.engine.evaluate(&zone, &sensor, weather, &detections))
    }

    /// Evaluate `zone_ids` against one snapshot. A failing zone is recorded
    /// in the report and never stops the others.
    pub async fn evaluate_zones(
        &self,
        snapshot: &ConfigSnapshot,
        zone_ids: &[u32],
        weather: Option<&WeatherSnapshot>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for &zone_id in zone_ids {
            let outcome = self.evaluate_zone(snapshot, zone_id, weather).await;
            if let Err(e) = &outcome {
                warn!(zone_id, error = %e, "Zone evaluation failed");
            }
            report.push(zone_id, outcome);
        }
        report
    }

    pub async fn evaluate_all(
        &self,
        snapshot: &ConfigSnapshot,
        weather: Option<&WeatherSnapshot>,
    ) -> BatchReport {
        let zone_ids = snapshot.config.zone_ids();
        self.evaluate_zones(snapshot, &zone_ids, weather).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HydrationRecommendation;

    const CONFIG: &str = r#"
weather:
  provider: static
  static:
    temperature: 30
    humidity: 20
    recent_rain_24h: 0
    forecast_rain_24h: 0
sensors:
  provider: static
  static:
    zone_1: 30
    zone_2: 10
zones:
  - id: 1
    plant_type: turf
    sun_exposure: full_sun
    soil_type: loam
  - id: 2
    plant_type: vegetable
  - id: 3
    plant_type: shrub
"#;

    fn snapshot(yaml: &str) -> ConfigSnapshot {
        ConfigSnapshot::parse(yaml.to_string(), 1).unwrap()
    }

    #[tokio::test]
    async fn evaluates_zone_with_static_inputs() {
        let snapshot = snapshot(CONFIG);
        let evaluator = ZoneEvaluator::from_config(&snapshot.config);

        let weather = evaluator.fetch_weather(&snapshot.config).await;
        assert!(weather.is_some());

        let result = evaluator
            .evaluate_zone(&snapshot, 1, weather.as_ref())
            .await
            .unwrap();
        assert_eq!(result.health_score, 56.0);
        assert_eq!(result.recommendation, HydrationRecommendation::Monitor);
    }

    #[tokio::test]
    async fn local_collaborators_need_no_connection() {
        let snapshot = snapshot(CONFIG);
        let evaluator = ZoneEvaluator::from_config(&snapshot.config);
        let status = evaluator.check_connections(&snapshot.config).await;
        assert_eq!(status, ConnectionStatus::default());
        assert!(status.all_connected());
    }

    #[tokio::test]
    async fn batch_isolates_failing_zones() {
        let snapshot = snapshot(CONFIG);
        let evaluator = ZoneEvaluator::from_config(&snapshot.config);

        // Zone 3 has no sensor value, zone 9 does not exist
        let report = evaluator
            .evaluate_zones(&snapshot, &[1, 3, 9, 2], None)
            .await;
        let ok: Vec<u32> = report.results.iter().map(|r| r.zone_id).collect();
        let failed: Vec<u32> = report.failures.iter().map(|f| f.zone_id).collect();
        assert_eq!(ok, vec![1, 2]);
        assert_eq!(failed, vec![3, 9]);
        assert!(report.failures[1].error.contains("not configured"));
    }

    #[tokio::test]
    async fn weather_failure_is_soft() {
        // Static provider without values fails on every fetch
        let snapshot = snapshot("weather:\n  provider: static\nsensors:\n  static:\n    zone_1: 40\nzones:\n  - id: 1\n");
        let evaluator = ZoneEvaluator::from_config(&snapshot.config);

        let weather = evaluator.fetch_weather(&snapshot.config).await;
        assert!(weather.is_none());

        let report = evaluator.evaluate_all(&snapshot, weather.as_ref()).await;
        assert!(report.is_clean());
        assert!(!report.results[0].weather_available);
    }

    #[tokio::test]
    async fn hazard_file_marks_emergency() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("zone_1.json"),
            r#"[{"label": "leak", "confidence": 0.93}]"#,
        )
        .unwrap();
        let yaml = format!("{}vision:\n  detections_dir: {}\n", CONFIG, dir.path().display());
        let snapshot = snapshot(&yaml);
        let evaluator = ZoneEvaluator::from_config(&snapshot.config);

        let report = evaluator.evaluate_all(&snapshot, None).await;
        let emergencies: Vec<u32> = report.emergencies().map(|r| r.zone_id).collect();
        assert_eq!(emergencies, vec![1]);
    }

    #[tokio::test]
    async fn reloaded_vision_dir_is_consulted() {
        let boot = snapshot(CONFIG);
        let evaluator = ZoneEvaluator::from_config(&boot.config);
        let report = evaluator.evaluate_all(&boot, None).await;
        assert_eq!(report.emergencies().count(), 0);

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("zone_1.json"),
            r#"[{"label": "leak", "confidence": 0.95}]"#,
        )
        .unwrap();
        let yaml = format!("{}vision:\n  detections_dir: {}\n", CONFIG, dir.path().display());
        let reloaded = ConfigSnapshot::parse(yaml, 2).unwrap();

        let result = evaluator.evaluate_zone(&reloaded, 1, None).await.unwrap();
        assert!(result.emergency_detected);
        assert_eq!(result.ideal_duration_minutes, 0.0);
    }

    #[tokio::test]
    async fn reloaded_sensor_values_are_used() {
        let boot = snapshot(CONFIG);
        let evaluator = ZoneEvaluator::from_config(&boot.config);
        assert!(evaluator.evaluate_zone(&boot, 3, None).await.is_err());

        let yaml = CONFIG.replace("    zone_2: 10\n", "    zone_2: 10\n    zone_3: 25\n");
        let reloaded = ConfigSnapshot::parse(yaml, 2).unwrap();
        let result = evaluator.evaluate_zone(&reloaded, 3, None).await.unwrap();
        assert_eq!(result.zone_id, 3);
    }

    #[test]
    fn unchanged_sections_keep_sources() {
        let boot = snapshot(CONFIG);
        let evaluator = ZoneEvaluator::from_config(&boot.config);
        let first = evaluator.sources(&boot.config);

        // Zone edits alone leave the collaborators in place
        let yaml = CONFIG.replace("plant_type: shrub", "plant_type: succulent");
        let reloaded = ConfigSnapshot::parse(yaml, 2).unwrap();
        assert!(Arc::ptr_eq(&first, &evaluator.sources(&reloaded.config)));

        let yaml = CONFIG.replace("temperature: 30", "temperature: 12");
        let reloaded = ConfigSnapshot::parse(yaml, 3).unwrap();
        assert!(!Arc::ptr_eq(&first, &evaluator.sources(&reloaded.config)));
    }
}
