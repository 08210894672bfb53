use crate::config::{HomeAssistantConfig, ZoneConfig};
use crate::error::{GardenError, Result};
use crate::models::SensorSnapshot;
use serde::Deserialize;
use std::time::Duration;

pub struct HomeAssistantClient {
    client: reqwest::Client,
    config: HomeAssistantConfig,
}

#[derive(Debug, Deserialize)]
struct EntityState {
    state: String,
    #[allow(dead_code)]
    entity_id: String,
}

impl HomeAssistantClient {
    pub fn new(config: HomeAssistantConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    /// Soil readings for one zone from its configured entities.
    ///
    /// Moisture is required; a missing or non-numeric temperature is dropped.
    pub async fn fetch_zone(&self, zone: &ZoneConfig) -> Result<SensorSnapshot> {
        let entity = zone.moisture_entity.as_deref().ok_or_else(|| {
            GardenError::SensorUnavailable(format!("zone {} has no moisture_entity", zone.id))
        })?;

        let moisture = self.get_entity_state(entity).await?.ok_or_else(|| {
            GardenError::SensorUnavailable(format!("{} has no numeric state", entity))
        })?;
        let mut snapshot = SensorSnapshot::new(moisture);

        if let Some(entity) = zone.temperature_entity.as_deref() {
            match self.get_entity_state(entity).await {
                Ok(Some(temp)) => snapshot = snapshot.with_temperature(temp),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(zone_id = zone.id, entity, error = %e, "Soil temperature unavailable")
                }
            }
        }

        Ok(snapshot)
    }

    async fn get_entity_state(&self, entity_id: &str) -> Result<Option<f64>> {
        let url = format!("{}/api/states/{}", self.config.url.trim_end_matches('/'), entity_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| GardenError::SensorUnavailable(format!("Home Assistant: {}", e)))?;

        if !response.status().is_success() {
            return Err(GardenError::SensorUnavailable(format!(
                "Home Assistant returned {} for {}",
                response.status(),
                entity_id
            )));
        }

        let entity: EntityState = response.json().await.map_err(|e| {
            GardenError::SensorUnavailable(format!(
                "Failed to parse Home Assistant response: {}",
                e
            ))
        })?;

        Ok(parse_state(&entity.state))
    }

    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/api/", self.config.url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .send()
            .await
            .map_err(|e| GardenError::SensorUnavailable(format!("Home Assistant: {}", e)))?;

        Ok(response.status().is_success())
    }
}

/// Entity states are strings; "unavailable" and "unknown" are common
fn parse_state(state: &str) -> Option<f64> {
    state.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_states_only() {
        assert_eq!(parse_state("41.5"), Some(41.5));
        assert_eq!(parse_state(" 12 "), Some(12.0));
        assert_eq!(parse_state("unavailable"), None);
        assert_eq!(parse_state("unknown"), None);
        assert_eq!(parse_state("NaN"), None);
    }

    #[test]
    fn entity_state_deserializes() {
        let entity: EntityState = serde_json::from_str(
            r#"{"entity_id": "sensor.bed_moisture", "state": "37.2", "attributes": {"unit_of_measurement": "%"}}"#,
        )
        .unwrap();
        assert_eq!(parse_state(&entity.state), Some(37.2));
    }

    #[tokio::test]
    async fn zone_without_moisture_entity_is_unavailable() {
        let client = HomeAssistantClient::new(HomeAssistantConfig {
            url: "http://127.0.0.1:9".into(),
            token: "t".into(),
        })
        .unwrap();
        let zone = ZoneConfig {
            id: 4,
            name: String::new(),
            plant_type: "turf".into(),
            sun_exposure: "shade".into(),
            soil_type: "loam".into(),
            max_runtime_minutes: None,
            moisture_entity: None,
            temperature_entity: None,
        };
        let err = client.fetch_zone(&zone).await.unwrap_err();
        assert!(matches!(err, GardenError::SensorUnavailable(_)));
    }
}
