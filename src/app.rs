use crate::config::Config;
use crate::config_store::ConfigStore;
use crate::db::Database;
use crate::error::{GardenError, Result};
use crate::irrigation::{IrrigationController, JsonLinesLog};
use crate::logic::cycle::{CycleReport, WateringCycle, DEFAULT_SCHEDULE};
use crate::logic::evaluator::ConnectionStatus;
use crate::logic::{HealthMonitor, ZoneEvaluator};
use crate::models::{BatchReport, HealthSnapshot, WateringOutcome, ZoneEvaluationResult};
use crate::shutdown::{stop_pair, StopHandle};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Background tasks started by `App::start`
struct Running {
    loops_stop: StopHandle,
    loops: Vec<JoinHandle<()>>,
    watcher_stop: StopHandle,
    watcher: JoinHandle<()>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub name: String,
    pub simulation_mode: bool,
    pub config_version: u64,
    pub zones: usize,
    pub active_zone: Option<u32>,
    pub last_run: Option<DateTime<Local>>,
    pub latest_health: Option<HealthSnapshot>,
}

/// The relay side of the app. Only sessions that may water own one.
struct Irrigation {
    controller: Arc<IrrigationController>,
    cycle: Arc<WateringCycle>,
}

/// Owns every long-lived component and the shutdown sequence
pub struct App {
    store: Arc<ConfigStore>,
    db: Database,
    evaluator: Arc<ZoneEvaluator>,
    monitor: Arc<HealthMonitor>,
    irrigation: Option<Irrigation>,
    running: Option<Running>,
}

impl App {
    /// Open the database and watering log under `data_dir` and take
    /// ownership of the relays.
    pub fn new(store: Arc<ConfigStore>, data_dir: &Path) -> Result<Self> {
        let db = Database::open(&Config::db_path(data_dir))?;
        let log = Arc::new(JsonLinesLog::new(Config::watering_log_path(data_dir)));
        info!(
            database = %db.path().display(),
            watering_log = %log.path().display(),
            "Data directory ready"
        );
        let controller = Arc::new(IrrigationController::new(Arc::clone(&store), log));
        Ok(Self::with_parts(store, db, controller))
    }

    /// Open the database under `data_dir` without touching the relays.
    ///
    /// Evaluation and status work as usual; anything that would water
    /// fails with `GardenError::Hardware`. Safe to run next to a daemon
    /// that owns the pins.
    pub fn read_only(store: Arc<ConfigStore>, data_dir: &Path) -> Result<Self> {
        let db = Database::open(&Config::db_path(data_dir))?;
        info!(database = %db.path().display(), "Data directory ready, relays untouched");
        let simulation = store.snapshot().config.system.simulation_mode;
        Ok(Self::assemble(store, db, None, simulation))
    }

    pub fn with_parts(
        store: Arc<ConfigStore>,
        db: Database,
        controller: Arc<IrrigationController>,
    ) -> Self {
        let simulation = controller.is_simulation();
        Self::assemble(store, db, Some(controller), simulation)
    }

    fn assemble(
        store: Arc<ConfigStore>,
        db: Database,
        controller: Option<Arc<IrrigationController>>,
        simulation: bool,
    ) -> Self {
        let evaluator = Arc::new(ZoneEvaluator::from_config(&store.snapshot().config));
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&store),
            Arc::clone(&evaluator),
            Some(db.clone()),
            simulation,
        ));
        let irrigation = controller.map(|controller| Irrigation {
            cycle: Arc::new(WateringCycle::new(
                Arc::clone(&store),
                db.clone(),
                Arc::clone(&evaluator),
                Arc::clone(&controller),
            )),
            controller,
        });

        Self {
            store,
            db,
            evaluator,
            monitor,
            irrigation,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn irrigation(&self) -> Result<&Irrigation> {
        self.irrigation
            .as_ref()
            .ok_or_else(|| GardenError::Hardware("read-only session has no relay access".into()))
    }

    /// One diagnostic pass over every zone. Failures are logged, never fatal.
    pub async fn run_startup_checks(&self) -> BatchReport {
        let snapshot = self.store.snapshot();
        let weather = self.evaluator.fetch_weather(&snapshot.config).await;
        let report = self.evaluator.evaluate_all(&snapshot, weather.as_ref()).await;

        for result in &report.results {
            info!(
                zone_id = result.zone_id,
                score = result.health_score,
                recommendation = result.recommendation.as_str(),
                duration_minutes = result.ideal_duration_minutes,
                emergency = result.emergency_detected,
                "Startup check"
            );
        }
        for failure in &report.failures {
            warn!(zone_id = failure.zone_id, error = %failure.error, "Startup check failed");
        }
        report
    }

    pub async fn check_connections(&self) -> ConnectionStatus {
        let snapshot = self.store.snapshot();
        let status = self.evaluator.check_connections(&snapshot.config).await;
        info!(sensors = ?status.sensors, weather = ?status.weather, "Connection check");
        status
    }

    /// Spawn the schedule loop, the health monitor and the config watcher
    pub fn start(&mut self) {
        if self.is_running() {
            debug!("Background loops already running");
            return;
        }

        let config = self.store.snapshot().config.clone();
        let (loops_stop, signal) = stop_pair();
        let mut loops = Vec::with_capacity(2);
        match &self.irrigation {
            Some(irrigation) => loops.push(
                irrigation
                    .cycle
                    .spawn(seconds(config.monitor.schedule_check_seconds), signal.clone()),
            ),
            None => warn!("Read-only session, schedule loop not started"),
        }
        loops.push(self.monitor.spawn(seconds(config.monitor.health_interval_seconds), signal));

        let (watcher_stop, watcher_signal) = stop_pair();
        let watcher = self
            .store
            .spawn_watcher(seconds(config.system.config_poll_seconds), watcher_signal);

        info!(
            schedule_check_secs = config.monitor.schedule_check_seconds,
            health_interval_secs = config.monitor.health_interval_seconds,
            config_poll_secs = config.system.config_poll_seconds,
            "Background loops started"
        );
        self.running = Some(Running {
            loops_stop,
            loops,
            watcher_stop,
            watcher,
        });
    }

    /// Run a watering cycle now, regardless of the schedule
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.irrigation()?.cycle.run().await
    }

    pub async fn evaluate_zone(&self, zone_id: u32) -> Result<ZoneEvaluationResult> {
        let snapshot = self.store.snapshot();
        let weather = self.evaluator.fetch_weather(&snapshot.config).await;
        self.evaluator
            .evaluate_zone(&snapshot, zone_id, weather.as_ref())
            .await
    }

    /// Evaluate first and refuse on emergency. `minutes` overrides the
    /// recommended duration but never the safety check.
    pub async fn water_zone(&self, zone_id: u32, minutes: Option<f64>) -> Result<WateringOutcome> {
        let controller = &self.irrigation()?.controller;
        let minutes = self.approve(zone_id, minutes).await?;
        controller.water(zone_id, minutes).await
    }

    /// Like `water_zone`, but the hold runs on its own task so the caller
    /// is not blocked for the watering duration.
    pub async fn request_watering(
        &self,
        zone_id: u32,
        minutes: Option<f64>,
    ) -> Result<JoinHandle<Result<WateringOutcome>>> {
        let controller = Arc::clone(&self.irrigation()?.controller);
        let minutes = self.approve(zone_id, minutes).await?;
        Ok(tokio::spawn(async move {
            controller.water(zone_id, minutes).await
        }))
    }

    async fn approve(&self, zone_id: u32, minutes: Option<f64>) -> Result<f64> {
        let result = self.evaluate_zone(zone_id).await?;
        if result.emergency_detected {
            let reason = result.emergency_reason.unwrap_or_default();
            warn!(zone_id, reason = %reason, "Watering request refused: emergency detected");
            return Err(GardenError::EmergencyDetected { zone_id, reason });
        }
        Ok(minutes.unwrap_or(result.ideal_duration_minutes))
    }

    pub fn latest_health(&self) -> Option<HealthSnapshot> {
        self.monitor.latest()
    }

    /// `active_zone` is only known to the session that owns the relays
    pub fn status(&self) -> Result<StatusReport> {
        let snapshot = self.store.snapshot();
        let latest_health = match self.latest_health() {
            Some(h) => Some(h),
            None => self.db.latest_health_snapshot()?,
        };

        Ok(StatusReport {
            name: snapshot.config.system.name.clone(),
            simulation_mode: match &self.irrigation {
                Some(irrigation) => irrigation.controller.is_simulation(),
                None => snapshot.config.system.simulation_mode,
            },
            config_version: snapshot.version,
            zones: snapshot.config.zones.len(),
            active_zone: self
                .irrigation
                .as_ref()
                .and_then(|irrigation| irrigation.controller.active_zone()),
            last_run: self.db.last_run(DEFAULT_SCHEDULE)?,
            latest_health,
        })
    }

    /// Stop the work producers, release the hardware, then stop the config
    /// watcher. A hold already in progress finishes first.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down");

        let watcher = match self.running.take() {
            Some(running) => {
                running.loops_stop.stop();
                for task in running.loops {
                    if let Err(e) = task.await {
                        warn!(error = %e, "Background loop ended abnormally");
                    }
                }
                Some((running.watcher_stop, running.watcher))
            }
            None => None,
        };

        let result = match &self.irrigation {
            Some(irrigation) => irrigation.controller.shutdown().await,
            None => Ok(()),
        };
        if let Err(e) = &result {
            warn!(error = %e, "Irrigation controller shutdown failed");
        }

        if let Some((stop, task)) = watcher {
            stop.stop();
            if let Err(e) = task.await {
                warn!(error = %e, "Config watcher ended abnormally");
            }
        }

        info!("Shutdown complete");
        result
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}
