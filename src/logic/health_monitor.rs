use crate::config_store::ConfigStore;
use crate::db::Database;
use crate::logic::evaluator::ZoneEvaluator;
use crate::models::HealthSnapshot;
use crate::shutdown::StopSignal;
use chrono::Utc;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// About a week of snapshots at the default 5 minute interval
const SNAPSHOT_RETENTION: usize = 2016;

/// Periodic, read-only re-evaluation of every zone for observability
pub struct HealthMonitor {
    store: Arc<ConfigStore>,
    evaluator: Arc<ZoneEvaluator>,
    db: Option<Database>,
    simulation: bool,
    latest: RwLock<Option<HealthSnapshot>>,
}

impl HealthMonitor {
    pub fn new(
        store: Arc<ConfigStore>,
        evaluator: Arc<ZoneEvaluator>,
        db: Option<Database>,
        simulation: bool,
    ) -> Self {
        Self {
            store,
            evaluator,
            db,
            simulation,
            latest: RwLock::new(None),
        }
    }

    /// Take one snapshot: a weather fetch plus every configured zone.
    /// Failures land in the snapshot; nothing here returns an error.
    pub async fn snapshot_once(&self) -> HealthSnapshot {
        let config = self.store.snapshot();
        let weather = self.evaluator.fetch_weather(&config.config).await;
        let report = self.evaluator.evaluate_all(&config, weather.as_ref()).await;

        let snapshot = HealthSnapshot {
            taken_at: Utc::now(),
            simulation_mode: self.simulation,
            config_version: config.version,
            zones: report.results,
            failures: report.failures,
            weather,
        };

        info!(
            zones = snapshot.zones.len(),
            failures = snapshot.failures.len(),
            emergencies = snapshot.zones.iter().filter(|z| z.emergency_detected).count(),
            weather = snapshot.weather.is_some(),
            config_version = snapshot.config_version,
            "Health snapshot"
        );

        if let Some(db) = &self.db {
            if let Err(e) = db.save_health_snapshot(&snapshot) {
                warn!(error = %e, "Failed to persist health snapshot");
            } else if let Err(e) = db.prune_health_snapshots(SNAPSHOT_RETENTION) {
                warn!(error = %e, "Failed to prune health snapshots");
            }
        }

        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        snapshot
    }

    pub fn latest(&self) -> Option<HealthSnapshot> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn spawn(self: &Arc<Self>, interval: Duration, mut stop: StopSignal) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Health monitor started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.snapshot_once().await;
                    }
                    _ = stop.stopped() => break,
                }
            }
            debug!("Health monitor stopped");
        })
    }
}
