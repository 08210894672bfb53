pub mod homeassistant;
pub mod openweathermap;
pub mod vision;

pub use homeassistant::HomeAssistantClient;
pub use openweathermap::OpenWeatherMapClient;
pub use vision::VisionFeed;

use crate::config::{Config, SensorsConfig, WeatherConfig};
use crate::error::{GardenError, Result};
use crate::models::{SensorSnapshot, WeatherSnapshot};
use chrono::{DateTime, Utc};
use tracing::warn;

/// Where soil readings come from.
///
/// The client is built once at startup; zone entities and static values are
/// read from whichever config snapshot the caller passes in.
pub enum SensorSource {
    Static,
    HomeAssistant(HomeAssistantClient),
}

impl SensorSource {
    pub fn from_config(config: &SensorsConfig) -> Self {
        match config.provider.trim().to_lowercase().as_str() {
            "homeassistant" | "home_assistant" => match &config.homeassistant {
                Some(ha) => match HomeAssistantClient::new(ha.clone()) {
                    Ok(client) => return SensorSource::HomeAssistant(client),
                    Err(e) => warn!(error = %e, "Failed to build Home Assistant client, using static sensor values"),
                },
                None => warn!("sensors.homeassistant is not configured, using static sensor values"),
            },
            "static" => {}
            other => warn!(provider = other, "Unknown sensor provider, using static sensor values"),
        }
        SensorSource::Static
    }

    pub fn name(&self) -> &'static str {
        match self {
            SensorSource::Static => "static",
            SensorSource::HomeAssistant(_) => "homeassistant",
        }
    }

    /// `None` when there is nothing remote to reach
    pub async fn test_connection(&self) -> Option<bool> {
        match self {
            SensorSource::Static => None,
            SensorSource::HomeAssistant(client) => Some(client.test_connection().await.unwrap_or(false)),
        }
    }

    pub async fn read(&self, config: &Config, zone_id: u32) -> Result<SensorSnapshot> {
        let snapshot = match self {
            SensorSource::Static => {
                let moisture = config.static_moisture(zone_id).ok_or_else(|| {
                    GardenError::SensorUnavailable(format!(
                        "no sensors.static.zone_{} value configured",
                        zone_id
                    ))
                })?;
                SensorSnapshot::new(moisture)
            }
            SensorSource::HomeAssistant(client) => {
                let zone = config
                    .zone(zone_id)
                    .ok_or(GardenError::ZoneNotConfigured(zone_id))?;
                client.fetch_zone(zone).await?
            }
        };

        if !snapshot.is_valid() {
            return Err(GardenError::SensorUnavailable(format!(
                "zone {} soil moisture {} is outside 0-100",
                zone_id, snapshot.soil_moisture
            )));
        }
        Ok(snapshot)
    }
}

enum WeatherProvider {
    OpenWeatherMap(OpenWeatherMapClient),
    Static,
    Disabled,
}

/// Weather collaborator with its own TTL cache
pub struct WeatherSource {
    provider: WeatherProvider,
    ttl: chrono::Duration,
    cache: tokio::sync::Mutex<Option<WeatherSnapshot>>,
}

impl WeatherSource {
    pub fn from_config(config: &WeatherConfig) -> Self {
        let provider = match config.provider.trim().to_lowercase().as_str() {
            "openweather" | "openweathermap" => match OpenWeatherMapClient::new(config) {
                Ok(client) => WeatherProvider::OpenWeatherMap(client),
                Err(e) => {
                    warn!(error = %e, "OpenWeatherMap disabled, scoring without weather");
                    WeatherProvider::Disabled
                }
            },
            "static" => WeatherProvider::Static,
            "none" | "disabled" | "" => WeatherProvider::Disabled,
            other => {
                warn!(provider = other, "Unknown weather provider, scoring without weather");
                WeatherProvider::Disabled
            }
        };

        Self {
            provider,
            ttl: chrono::Duration::minutes(config.cache_minutes as i64),
            cache: tokio::sync::Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        match self.provider {
            WeatherProvider::OpenWeatherMap(_) => "openweather",
            WeatherProvider::Static => "static",
            WeatherProvider::Disabled => "disabled",
        }
    }

    pub async fn test_connection(&self) -> Option<bool> {
        match &self.provider {
            WeatherProvider::OpenWeatherMap(client) => Some(client.test_connection().await.unwrap_or(false)),
            WeatherProvider::Static | WeatherProvider::Disabled => None,
        }
    }

    /// Current conditions. `Ok(None)` means no provider is configured.
    pub async fn current(&self, config: &Config) -> Result<Option<WeatherSnapshot>> {
        match &self.provider {
            WeatherProvider::Disabled => Ok(None),
            WeatherProvider::Static => config.weather.fixed.clone().map(Some).ok_or_else(|| {
                GardenError::WeatherProvider("weather.static is not configured".into())
            }),
            WeatherProvider::OpenWeatherMap(client) => {
                let mut cache = self.cache.lock().await;
                if let Some(cached) = cache.as_ref().filter(|w| is_fresh(w, self.ttl, Utc::now())) {
                    tracing::debug!("Using cached weather snapshot");
                    return Ok(Some(cached.clone()));
                }

                let snapshot = client.fetch_snapshot().await?;
                *cache = Some(snapshot.clone());
                Ok(Some(snapshot))
            }
        }
    }
}

fn is_fresh(snapshot: &WeatherSnapshot, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
    now - snapshot.fetched_at < ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> Config {
        Config::parse(yaml).unwrap().0
    }

    #[tokio::test]
    async fn static_sensor_values() {
        let config = config("sensors:\n  provider: static\n  static:\n    zone_1: 33.5\n    zone_2: 140\n");
        let source = SensorSource::from_config(&config.sensors);
        assert_eq!(source.name(), "static");

        assert_eq!(source.read(&config, 1).await.unwrap().soil_moisture, 33.5);
        assert!(matches!(
            source.read(&config, 2).await,
            Err(GardenError::SensorUnavailable(_))
        ));
        assert!(matches!(
            source.read(&config, 3).await,
            Err(GardenError::SensorUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn home_assistant_without_settings_falls_back_to_static() {
        let config = config("sensors:\n  provider: homeassistant\n");
        assert_eq!(SensorSource::from_config(&config.sensors).name(), "static");
    }

    #[tokio::test]
    async fn static_weather_follows_the_snapshot() {
        let config = config(
            "weather:\n  provider: static\n  static:\n    temperature: 30\n    humidity: 20\n    recent_rain_24h: 0\n    forecast_rain_24h: 0\n",
        );
        let source = WeatherSource::from_config(&config.weather);
        let weather = source.current(&config).await.unwrap().unwrap();
        assert_eq!(weather.temperature, 30.0);

        let bare = self::config("weather:\n  provider: static\n");
        assert!(source.current(&bare).await.is_err());
    }

    #[tokio::test]
    async fn missing_key_disables_openweather() {
        let config = config("weather:\n  provider: openweather\n");
        let source = WeatherSource::from_config(&config.weather);
        assert_eq!(source.name(), "disabled");
        assert!(source.current(&config).await.unwrap().is_none());
        assert_eq!(source.test_connection().await, None);
    }

    #[test]
    fn cache_freshness() {
        let now = Utc::now();
        let mut snapshot = WeatherSnapshot::new(20.0, 50.0, 0.0, 0.0);
        let ttl = chrono::Duration::minutes(30);

        snapshot.fetched_at = now - chrono::Duration::minutes(29);
        assert!(is_fresh(&snapshot, ttl, now));
        snapshot.fetched_at = now - chrono::Duration::minutes(30);
        assert!(!is_fresh(&snapshot, ttl, now));
    }
}
