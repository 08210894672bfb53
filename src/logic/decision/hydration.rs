//! Hydration scoring: how far a zone's soil moisture sits from its
//! weather-adjusted ideal, as a 0-100 score.

use super::policy::ScoringPolicy;
use crate::models::{WeatherSnapshot, Zone};

/// Ideal moisture for the zone after sun and soil modifiers
pub fn adjusted_ideal(policy: &ScoringPolicy, zone: &Zone) -> f64 {
    policy.base_ideal(zone.plant_type)
        * policy.sun_modifier(zone.sun_exposure)
        * policy.soil_modifier(zone.soil_type)
}

/// How strongly the weather is drying the soil, in `[0, max_dryness]`.
///
/// Hot, dry air and no recent or forecast rain push it up.
pub fn dryness_factor(policy: &ScoringPolicy, weather: &WeatherSnapshot) -> f64 {
    let temp_factor = (weather.temperature - 15.0) / 20.0;
    let humidity_factor = (50.0 - weather.humidity) / 50.0;
    let rain_factor =
        (1.0 - (weather.recent_rain_24h + weather.forecast_rain_24h) / 10.0).max(0.0);

    let dryness = 0.4 * temp_factor + 0.4 * humidity_factor + 0.2 * rain_factor;
    if dryness.is_nan() {
        return 0.0;
    }
    dryness.clamp(0.0, policy.max_dryness)
}

/// Unrounded score in `[0, 100]`
pub fn score(policy: &ScoringPolicy, soil_moisture: f64, ideal: f64, dryness: f64) -> f64 {
    let diff = soil_moisture - ideal;

    let score = if diff >= 0.0 {
        100.0 - diff.min(policy.wet_cap) * policy.wet_slope
    } else {
        // diff is negative here
        100.0 + diff.max(-policy.dry_cap) * policy.dry_slope
    };

    let score = score - dryness * policy.dryness_penalty;
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
