use crate::config::WeatherConfig;
use crate::error::{GardenError, Result};
use crate::models::WeatherSnapshot;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

const API_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Forecast entries are 3 hours apart; 8 of them cover the next 24 hours
const FORECAST_SLOTS_24H: u32 = 8;

pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    query: String,
}

// OpenWeatherMap API response structures
#[derive(Debug, Deserialize)]
struct OwmCurrentResponse {
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmWeather>,
    #[serde(default)]
    rain: Option<OwmRain>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    #[serde(default)]
    pop: f64, // probability of precipitation
    #[serde(default)]
    rain: Option<OwmRain>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OwmRain {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
    #[serde(rename = "3h", default)]
    three_hour: Option<f64>,
}

impl OwmRain {
    fn amount(&self) -> f64 {
        self.three_hour.or(self.one_hour).unwrap_or(0.0)
    }
}

impl OpenWeatherMapClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GardenError::WeatherProvider("weather.api_key is not configured".into()));
        }
        if config.location.city.trim().is_empty() {
            return Err(GardenError::WeatherProvider(
                "weather.location.city is not configured".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
            api_key: config.api_key.clone(),
            query: config.location.query(),
        })
    }

    /// Current conditions plus the next 24 hours of forecast rain
    pub async fn fetch_snapshot(&self) -> Result<WeatherSnapshot> {
        let current: OwmCurrentResponse = self.get("weather", &[]).await?;
        let cnt = FORECAST_SLOTS_24H.to_string();
        let forecast: OwmForecastResponse = self.get("forecast", &[("cnt", cnt.as_str())]).await?;

        let snapshot = convert(current, &forecast);
        tracing::info!(
            temperature = snapshot.temperature,
            humidity = snapshot.humidity,
            forecast_rain_24h = snapshot.forecast_rain_24h,
            rain_probability = snapshot.rain_probability,
            "Weather snapshot fetched"
        );
        Ok(snapshot)
    }

    /// Test connection to OpenWeatherMap API
    pub async fn test_connection(&self) -> Result<bool> {
        let url = self.url("weather", &[])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GardenError::WeatherProvider(format!("OpenWeatherMap: {}", e)))?;

        Ok(response.status().is_success())
    }

    fn url(&self, endpoint: &str, extra: &[(&str, &str)]) -> Result<reqwest::Url> {
        let params = [
            ("q", self.query.as_str()),
            ("appid", self.api_key.as_str()),
            ("units", "metric"),
        ];
        reqwest::Url::parse_with_params(
            &format!("{}/{}", self.base_url, endpoint),
            params.iter().chain(extra.iter()),
        )
        .map_err(|e| GardenError::WeatherProvider(format!("Invalid OpenWeatherMap URL: {}", e)))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str, extra: &[(&str, &str)]) -> Result<T> {
        let url = self.url(endpoint, extra)?;
        tracing::debug!(endpoint, location = %self.query, "Fetching weather");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GardenError::WeatherProvider(format!("OpenWeatherMap: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GardenError::WeatherProvider(format!(
                "OpenWeatherMap returned {}: {}",
                status, body
            )));
        }

        response.json().await.map_err(|e| {
            GardenError::WeatherProvider(format!("Failed to parse OpenWeatherMap response: {}", e))
        })
    }
}

fn convert(current: OwmCurrentResponse, forecast: &OwmForecastResponse) -> WeatherSnapshot {
    let forecast_rain: f64 = forecast
        .list
        .iter()
        .filter_map(|item| item.rain.as_ref())
        .map(OwmRain::amount)
        .sum();

    let forecast_pop = forecast
        .list
        .iter()
        .map(|item| item.pop)
        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.max(p))));

    let rain_probability = forecast_pop.unwrap_or_else(|| {
        current
            .weather
            .first()
            .map(|w| condition_rain_probability(&w.main))
            .unwrap_or(0.0)
    });

    WeatherSnapshot {
        temperature: current.main.temp,
        humidity: current.main.humidity.clamp(0.0, 100.0),
        // The current-weather endpoint only reports the last 1-3 hours
        recent_rain_24h: current.rain.as_ref().map(OwmRain::amount).unwrap_or(0.0),
        forecast_rain_24h: forecast_rain,
        rain_probability: rain_probability.clamp(0.0, 1.0),
        fetched_at: Utc::now(),
    }
}

/// Rough rain chance from the condition group when no forecast is available
fn condition_rain_probability(main: &str) -> f64 {
    let main = main.to_lowercase();
    if main.contains("rain") || main.contains("drizzle") || main.contains("thunderstorm") {
        0.8
    } else if main.contains("cloud") {
        0.3
    } else {
        0.05
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeatherLocation;

    const CURRENT: &str = r#"{
        "weather": [{"id": 500, "main": "Rain", "description": "light rain"}],
        "main": {"temp": 18.4, "feels_like": 18.0, "humidity": 82},
        "rain": {"1h": 0.6},
        "name": "Austin"
    }"#;

    const FORECAST: &str = r#"{
        "list": [
            {"dt": 1, "pop": 0.2},
            {"dt": 2, "pop": 0.65, "rain": {"3h": 1.5}},
            {"dt": 3, "pop": 0.4, "rain": {"3h": 0.25}}
        ]
    }"#;

    fn config(api_key: &str, city: &str) -> WeatherConfig {
        WeatherConfig {
            api_key: api_key.into(),
            location: WeatherLocation {
                city: city.into(),
                state: Some("TX".into()),
                country: "US".into(),
            },
            ..WeatherConfig::default()
        }
    }

    #[test]
    fn converts_current_and_forecast() {
        let current: OwmCurrentResponse = serde_json::from_str(CURRENT).unwrap();
        let forecast: OwmForecastResponse = serde_json::from_str(FORECAST).unwrap();

        let snapshot = convert(current, &forecast);
        assert_eq!(snapshot.temperature, 18.4);
        assert_eq!(snapshot.humidity, 82.0);
        assert_eq!(snapshot.recent_rain_24h, 0.6);
        assert_eq!(snapshot.forecast_rain_24h, 1.75);
        assert_eq!(snapshot.rain_probability, 0.65);
    }

    #[test]
    fn empty_forecast_falls_back_to_condition() {
        let current: OwmCurrentResponse =
            serde_json::from_str(r#"{"weather": [{"main": "Clouds"}], "main": {"temp": 25, "humidity": 40}}"#)
                .unwrap();
        let forecast: OwmForecastResponse = serde_json::from_str(r#"{"list": []}"#).unwrap();

        let snapshot = convert(current, &forecast);
        assert_eq!(snapshot.recent_rain_24h, 0.0);
        assert_eq!(snapshot.forecast_rain_24h, 0.0);
        assert_eq!(snapshot.rain_probability, 0.3);
    }

    #[test]
    fn condition_probabilities() {
        assert_eq!(condition_rain_probability("Thunderstorm"), 0.8);
        assert_eq!(condition_rain_probability("Drizzle"), 0.8);
        assert_eq!(condition_rain_probability("Clear"), 0.05);
    }

    #[test]
    fn client_requires_key_and_city() {
        assert!(OpenWeatherMapClient::new(&config("", "Austin")).is_err());
        assert!(OpenWeatherMapClient::new(&config("key", " ")).is_err());

        let client = OpenWeatherMapClient::new(&config("key", "San Antonio")).unwrap();
        let url = client.url("forecast", &[("cnt", "8")]).unwrap();
        assert_eq!(url.path(), "/data/2.5/forecast");
        assert_eq!(
            url.query(),
            Some("q=San+Antonio%2CTX%2CUS&appid=key&units=metric&cnt=8")
        );
    }
}
