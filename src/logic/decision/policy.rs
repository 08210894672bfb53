use crate::models::{PlantType, SoilType, SunExposure};

/// Every tunable coefficient used by the decision engine.
///
/// The defaults are heuristics, not measured agronomy; deployments can
/// replace the table without touching the scoring code.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    /// Ideal soil moisture (%) per plant type
    pub turf_ideal: f64,
    pub vegetable_ideal: f64,
    pub shrub_ideal: f64,
    pub succulent_ideal: f64,
    pub other_ideal: f64,

    pub full_sun_modifier: f64,
    pub shade_modifier: f64,
    pub sandy_modifier: f64,
    pub clay_modifier: f64,

    pub max_dryness: f64,
    /// Score points removed per unit of dryness
    pub dryness_penalty: f64,

    /// Above-ideal moisture: penalty per point, capped at `wet_cap` points
    pub wet_slope: f64,
    pub wet_cap: f64,
    /// Below-ideal moisture: penalty per point, capped at `dry_cap` points
    pub dry_slope: f64,
    pub dry_cap: f64,

    /// `(score upper bound, minutes)`, ascending by bound. Scores at or above
    /// the last bound get no water.
    pub duration_steps: Vec<(f64, f64)>,

    /// Detection labels that block watering
    pub hazard_labels: Vec<String>,
    /// A hazard counts only with confidence strictly above this
    pub hazard_confidence: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            turf_ideal: 55.0,
            vegetable_ideal: 60.0,
            shrub_ideal: 50.0,
            succulent_ideal: 30.0,
            other_ideal: 50.0,
            full_sun_modifier: 1.1,
            shade_modifier: 0.9,
            sandy_modifier: 1.1,
            clay_modifier: 0.9,
            max_dryness: 1.5,
            dryness_penalty: 10.0,
            wet_slope: 0.8,
            wet_cap: 40.0,
            dry_slope: 1.2,
            dry_cap: 60.0,
            duration_steps: vec![(20.0, 20.0), (40.0, 15.0), (55.0, 10.0), (70.0, 5.0)],
            hazard_labels: ["water", "standing_water", "leak", "mud"]
                .into_iter()
                .map(String::from)
                .collect(),
            hazard_confidence: 0.8,
        }
    }
}

impl ScoringPolicy {
    pub fn base_ideal(&self, plant: PlantType) -> f64 {
        match plant {
            PlantType::Turf => self.turf_ideal,
            PlantType::Vegetable => self.vegetable_ideal,
            PlantType::Shrub => self.shrub_ideal,
            PlantType::Succulent => self.succulent_ideal,
            PlantType::Other => self.other_ideal,
        }
    }

    pub fn sun_modifier(&self, sun: SunExposure) -> f64 {
        match sun {
            SunExposure::FullSun => self.full_sun_modifier,
            SunExposure::Shade => self.shade_modifier,
            SunExposure::PartialShade | SunExposure::Unknown => 1.0,
        }
    }

    pub fn soil_modifier(&self, soil: SoilType) -> f64 {
        match soil {
            SoilType::Sandy => self.sandy_modifier,
            SoilType::Clay => self.clay_modifier,
            SoilType::Loam | SoilType::Unknown => 1.0,
        }
    }

    /// Minutes of water for a score; lower scores get longer runs
    pub fn duration_for(&self, score: f64) -> f64 {
        self.duration_steps
            .iter()
            .find(|(bound, _)| score < *bound)
            .map(|(_, minutes)| *minutes)
            .unwrap_or(0.0)
    }

    pub fn is_hazard(&self, label: &str) -> bool {
        self.hazard_labels.iter().any(|h| h == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_staircase_is_monotonic() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.duration_for(0.0), 20.0);
        assert_eq!(policy.duration_for(19.9), 20.0);
        assert_eq!(policy.duration_for(20.0), 15.0);
        assert_eq!(policy.duration_for(39.9), 15.0);
        assert_eq!(policy.duration_for(40.0), 10.0);
        assert_eq!(policy.duration_for(55.0), 5.0);
        assert_eq!(policy.duration_for(69.9), 5.0);
        assert_eq!(policy.duration_for(70.0), 0.0);
        assert_eq!(policy.duration_for(100.0), 0.0);

        let mut last = f64::INFINITY;
        for step in 0..=1000 {
            let minutes = policy.duration_for(step as f64 / 10.0);
            assert!(minutes <= last);
            last = minutes;
        }
    }

    #[test]
    fn modifiers_for_unknown_values_are_neutral() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.sun_modifier(SunExposure::Unknown), 1.0);
        assert_eq!(policy.soil_modifier(SoilType::Unknown), 1.0);
        assert_eq!(policy.soil_modifier(SoilType::Loam), 1.0);
        assert_eq!(policy.base_ideal(PlantType::Other), 50.0);
    }

    #[test]
    fn hazard_labels() {
        let policy = ScoringPolicy::default();
        assert!(policy.is_hazard("standing_water"));
        assert!(policy.is_hazard("mud"));
        assert!(!policy.is_hazard("grass"));
    }
}
