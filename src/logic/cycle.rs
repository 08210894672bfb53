//! Schedule-driven watering cycle: evaluate the scheduled zones, then water
//! the ones that need it, one at a time.

use crate::config_store::ConfigStore;
use crate::db::Database;
use crate::error::Result;
use crate::irrigation::IrrigationController;
use crate::logic::evaluator::ZoneEvaluator;
use crate::logic::schedule::{self, Schedule};
use crate::models::{BatchReport, WateringOutcome, ZoneFailure};
use crate::shutdown::StopSignal;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bookkeeping key for the single configured schedule
pub const DEFAULT_SCHEDULE: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    Emergency(String),
    NoWaterNeeded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedZone {
    pub zone_id: u32,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub evaluations: BatchReport,
    pub watered: Vec<WateringOutcome>,
    pub skipped: Vec<SkippedZone>,
    /// Zones whose watering call failed after a successful evaluation
    pub failures: Vec<ZoneFailure>,
}

pub struct WateringCycle {
    store: Arc<ConfigStore>,
    db: Database,
    evaluator: Arc<ZoneEvaluator>,
    controller: Arc<IrrigationController>,
}

impl WateringCycle {
    pub fn new(
        store: Arc<ConfigStore>,
        db: Database,
        evaluator: Arc<ZoneEvaluator>,
        controller: Arc<IrrigationController>,
    ) -> Self {
        Self {
            store,
            db,
            evaluator,
            controller,
        }
    }

    /// Run one cycle over the schedule's zones, whether or not it is due
    pub async fn run(&self) -> Result<CycleReport> {
        let snapshot = self.store.snapshot();
        let schedule = Schedule::from_config(&snapshot.config.schedule, None)?;
        let zone_ids = schedule.zones_for(&snapshot.config.zone_ids());

        let weather = self.evaluator.fetch_weather(&snapshot.config).await;
        let evaluations = self
            .evaluator
            .evaluate_zones(&snapshot, &zone_ids, weather.as_ref())
            .await;

        let mut report = CycleReport {
            evaluations,
            ..CycleReport::default()
        };

        for result in &report.evaluations.results {
            let zone_id = result.zone_id;

            if result.emergency_detected {
                let reason = result.emergency_reason.clone().unwrap_or_default();
                warn!(zone_id, reason = %reason, "Watering refused: emergency detected");
                report.skipped.push(SkippedZone {
                    zone_id,
                    reason: SkipReason::Emergency(reason),
                });
                continue;
            }

            if !result.wants_water() {
                debug!(zone_id, score = result.health_score, "No water needed");
                report.skipped.push(SkippedZone {
                    zone_id,
                    reason: SkipReason::NoWaterNeeded,
                });
                continue;
            }

            match self
                .controller
                .water(zone_id, result.ideal_duration_minutes)
                .await
            {
                Ok(outcome) if outcome.ran() => report.watered.push(outcome),
                Ok(_) => report.skipped.push(SkippedZone {
                    zone_id,
                    reason: SkipReason::NoWaterNeeded,
                }),
                Err(e) => {
                    warn!(zone_id, error = %e, "Watering failed");
                    report.failures.push(ZoneFailure::new(zone_id, e));
                }
            }
        }

        info!(
            evaluated = report.evaluations.results.len(),
            watered = report.watered.len(),
            skipped = report.skipped.len(),
            failed = report.evaluations.failures.len() + report.failures.len(),
            "Watering cycle finished"
        );
        Ok(report)
    }

    /// Run a cycle if the schedule is due at `now`, recording the run
    pub async fn check_and_run(&self, now: DateTime<Local>) -> Result<Option<CycleReport>> {
        let snapshot = self.store.snapshot();
        let last_run = self.db.last_run(DEFAULT_SCHEDULE)?;
        let schedule = Schedule::from_config(&snapshot.config.schedule, last_run)?;

        if !schedule::is_due(now, &schedule) {
            return Ok(None);
        }

        info!(frequency = %schedule.frequency, "Schedule due, starting watering cycle");
        let report = self.run().await?;
        self.db.record_run(DEFAULT_SCHEDULE, now, report.watered.len())?;
        Ok(Some(report))
    }

    pub fn spawn(self: &Arc<Self>, interval: Duration, mut stop: StopSignal) -> JoinHandle<()> {
        let cycle = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Schedule loop started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = cycle.check_and_run(Local::now()).await {
                            warn!(error = %e, "Schedule check failed");
                        }
                    }
                    _ = stop.stopped() => break,
                }
            }
            debug!("Schedule loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irrigation::watering_log::testing::MemoryLog;
    use crate::irrigation::SimulatedActuator;
    use chrono::TimeZone;

    const CONFIG: &str = r#"
system:
  simulated_hold_ms: 1
hardware:
  relay:
    in_pins:
      zone_1: 17
      zone_2: 27
      zone_3: 22
weather:
  provider: none
sensors:
  static:
    zone_1: 5
    zone_2: 70
    zone_3: 5
schedule:
  frequency: every_x_days
  every_x_days: 2
zones:
  - id: 1
    plant_type: turf
  - id: 2
    plant_type: turf
  - id: 3
    plant_type: turf
  - id: 4
    plant_type: turf
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        cycle: WateringCycle,
        db: Database,
        log: Arc<MemoryLog>,
    }

    fn fixture(yaml: &str, detections: &[(u32, &str)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let vision = dir.path().join("vision");
        std::fs::create_dir(&vision).unwrap();
        for (zone, json) in detections {
            std::fs::write(vision.join(format!("zone_{}.json", zone)), json).unwrap();
        }

        let path = dir.path().join("gardenops.yaml");
        std::fs::write(
            &path,
            format!("{}vision:\n  detections_dir: {}\n", yaml, vision.display()),
        )
        .unwrap();
        let store = Arc::new(ConfigStore::open(path).unwrap());

        let log = Arc::new(MemoryLog::default());
        let controller = Arc::new(IrrigationController::with_actuator(
            Arc::clone(&store),
            Box::new(SimulatedActuator::new()),
            true,
            log.clone(),
        ));
        let evaluator = Arc::new(ZoneEvaluator::from_config(&store.snapshot().config));
        let db = Database::open_in_memory().unwrap();
        let cycle = WateringCycle::new(store, db.clone(), evaluator, controller);

        Fixture {
            _dir: dir,
            cycle,
            db,
            log,
        }
    }

    #[tokio::test]
    async fn waters_dry_zones_and_skips_the_rest() {
        let f = fixture(CONFIG, &[(3, r#"[{"label": "standing_water", "confidence": 0.97}]"#)]);

        let report = f.cycle.run().await.unwrap();

        let watered: Vec<u32> = report.watered.iter().map(|o| o.zone_id).collect();
        assert_eq!(watered, vec![1]);
        assert!(report.watered[0].duration_minutes > 0.0);

        assert!(report.skipped.contains(&SkippedZone {
            zone_id: 2,
            reason: SkipReason::NoWaterNeeded,
        }));
        assert!(report
            .skipped
            .iter()
            .any(|s| s.zone_id == 3 && matches!(s.reason, SkipReason::Emergency(_))));

        // Zone 4 has no sensor value
        assert_eq!(report.evaluations.failures.len(), 1);
        assert_eq!(report.evaluations.failures[0].zone_id, 4);

        // Only the watered zone produced log records
        assert!(f.log.events().iter().all(|e| e.zone == 1));
    }

    #[tokio::test]
    async fn schedule_zone_list_limits_the_cycle() {
        let yaml = CONFIG.replace("  every_x_days: 2\n", "  every_x_days: 2\n  zones: [2]\n");
        let f = fixture(&yaml, &[]);

        let report = f.cycle.run().await.unwrap();
        assert_eq!(report.evaluations.results.len(), 1);
        assert!(report.watered.is_empty());
    }

    #[tokio::test]
    async fn check_and_run_records_last_run() {
        let f = fixture(CONFIG, &[]);
        let now = Local.with_ymd_and_hms(2024, 6, 10, 6, 0, 0).single().unwrap();

        let first = f.cycle.check_and_run(now).await.unwrap();
        assert!(first.is_some());
        assert_eq!(f.db.last_run(DEFAULT_SCHEDULE).unwrap(), Some(now));

        // Every two days: not due tomorrow, due the day after
        let tomorrow = now + chrono::Duration::days(1);
        assert!(f.cycle.check_and_run(tomorrow).await.unwrap().is_none());

        let later = now + chrono::Duration::days(2);
        assert!(f.cycle.check_and_run(later).await.unwrap().is_some());
        assert_eq!(f.db.last_run(DEFAULT_SCHEDULE).unwrap(), Some(later));
    }
}
