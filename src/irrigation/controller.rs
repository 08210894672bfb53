use crate::config::{Config, RelayPolarity};
use crate::config_store::ConfigStore;
use crate::error::{GardenError, Result};
use crate::irrigation::actuator::{Actuator, SimulatedActuator, SysfsActuator};
use crate::irrigation::watering_log::WateringLog;
use crate::models::{WateringEvent, WateringOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

/// Sole owner of the relay hardware.
///
/// Every `water` call takes the controller-wide actuation lock for the whole
/// hold, so at most one relay is ever ON and each start/stop log pair is
/// contiguous.
pub struct IrrigationController {
    store: Arc<ConfigStore>,
    actuator: tokio::sync::Mutex<Box<dyn Actuator>>,
    simulation: bool,
    log: Arc<dyn WateringLog>,
    active_zone: Mutex<Option<u32>>,
    shut_down: AtomicBool,
}

impl IrrigationController {
    /// Pick the actuator from `system.simulation_mode`. Hardware that cannot
    /// be probed downgrades to simulation with a single warning.
    pub fn new(store: Arc<ConfigStore>, log: Arc<dyn WateringLog>) -> Self {
        let snapshot = store.snapshot();
        let config = &snapshot.config;

        let (actuator, simulation): (Box<dyn Actuator>, bool) = if config.system.simulation_mode {
            (Box::new(SimulatedActuator::new()), true)
        } else {
            match SysfsActuator::probe(&config.hardware.gpio_root) {
                Ok(hw) => (Box::new(hw), false),
                Err(e) => {
                    warn!(error = %e, "GPIO hardware unavailable, falling back to simulation mode");
                    (Box::new(SimulatedActuator::new()), true)
                }
            }
        };

        Self::with_actuator(store, actuator, simulation, log)
    }

    /// Build around an explicit actuator. Every configured relay is claimed
    /// and driven OFF up front.
    pub fn with_actuator(
        store: Arc<ConfigStore>,
        mut actuator: Box<dyn Actuator>,
        simulation: bool,
        log: Arc<dyn WateringLog>,
    ) -> Self {
        let snapshot = store.snapshot();
        claim_all(actuator.as_mut(), &snapshot.config);

        info!(
            actuator = actuator.name(),
            simulation,
            relays = actuator.claimed_pins().len(),
            "Irrigation controller ready"
        );

        Self {
            store,
            actuator: tokio::sync::Mutex::new(actuator),
            simulation,
            log,
            active_zone: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn is_simulation(&self) -> bool {
        self.simulation
    }

    /// Zone whose relay is currently ON, if any
    pub fn active_zone(&self) -> Option<u32> {
        *self.active_zone.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one zone for `requested_minutes`, clamped to its runtime limit.
    ///
    /// Waits for any watering already in progress. The relay is OFF again
    /// when this returns, fails, or the future is dropped mid-hold.
    pub async fn water(&self, zone_id: u32, requested_minutes: f64) -> Result<WateringOutcome> {
        let snapshot = self.store.snapshot();
        let config = &snapshot.config;

        let Some(pin) = config.pin_for_zone(zone_id) else {
            warn!(zone_id, "No relay pin configured for zone, skipping");
            return Err(GardenError::ZoneNotConfigured(zone_id));
        };

        let limit = config.runtime_limit(zone_id);
        let minutes = if requested_minutes.is_nan() {
            0.0
        } else {
            requested_minutes.clamp(0.0, limit)
        };
        if minutes < requested_minutes {
            info!(zone_id, requested_minutes, limit, "Watering duration clamped to runtime limit");
        }

        let outcome = WateringOutcome {
            zone_id,
            requested_minutes,
            duration_minutes: minutes,
            simulation: self.simulation,
        };
        if minutes <= 0.0 {
            debug!(zone_id, "Zero watering duration, relay untouched");
            return Ok(outcome);
        }

        let hold = self.hold_duration(config, minutes)?;
        self.ensure_running()?;

        let actuator = self.actuator.lock().await;
        // shutdown may have released the pins while this call was queued
        self.ensure_running()?;
        let mut relay = RelayGuard {
            actuator,
            pin,
            polarity: config.hardware.relay.polarity,
            zone_id,
            minutes,
            log: self.log.as_ref(),
            active_zone: &self.active_zone,
            armed: true,
            started: false,
        };

        relay.engage()?;
        tokio::time::sleep(hold).await;
        relay.disengage()?;

        Ok(outcome)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(GardenError::Hardware("irrigation controller is shut down".into()));
        }
        Ok(())
    }

    fn hold_duration(&self, config: &Config, minutes: f64) -> Result<Duration> {
        let full = Duration::try_from_secs_f64(minutes * 60.0).map_err(|e| {
            GardenError::Config(format!("watering duration of {} minutes is out of range: {}", minutes, e))
        })?;
        if self.simulation {
            Ok(Duration::from_millis(config.system.simulated_hold_ms).min(full))
        } else {
            Ok(full)
        }
    }

    /// Drive every relay OFF and hand the pins back. Runs once; later calls
    /// are no-ops. Waits for a watering in progress to finish first.
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let polarity = self.store.snapshot().config.hardware.relay.polarity;
        let mut actuator = self.actuator.lock().await;
        let off = polarity.level(false);
        for pin in actuator.claimed_pins() {
            if let Err(e) = actuator.set_level(pin, off) {
                warn!(pin, error = %e, "Failed to switch relay off during shutdown");
            }
        }
        actuator.release()?;

        info!(actuator = actuator.name(), "Irrigation controller shut down");
        Ok(())
    }
}

fn claim_all(actuator: &mut dyn Actuator, config: &Config) {
    let off = config.hardware.relay.polarity.level(false);
    for (key, pin) in &config.hardware.relay.in_pins {
        if let Err(e) = actuator.claim(*pin, off) {
            warn!(relay = %key, pin, error = %e, "Failed to claim relay pin");
        }
    }
}

/// Holds the actuation lock while a relay may be ON. Dropping it without a
/// successful `disengage` forces the relay OFF before the lock is released.
struct RelayGuard<'a> {
    actuator: MutexGuard<'a, Box<dyn Actuator>>,
    pin: u32,
    polarity: RelayPolarity,
    zone_id: u32,
    minutes: f64,
    log: &'a dyn WateringLog,
    active_zone: &'a Mutex<Option<u32>>,
    armed: bool,
    started: bool,
}

impl RelayGuard<'_> {
    fn engage(&mut self) -> Result<()> {
        // Pins added by a config reload were not claimed at construction
        self.actuator.claim(self.pin, self.polarity.level(false))?;

        self.set_active(Some(self.zone_id));
        self.actuator.set_level(self.pin, self.polarity.level(true))?;
        self.started = true;

        info!(zone_id = self.zone_id, pin = self.pin, minutes = self.minutes, "Watering started");
        self.append(WateringEvent::start(self.zone_id, self.minutes));
        Ok(())
    }

    fn disengage(&mut self) -> Result<()> {
        self.actuator.set_level(self.pin, self.polarity.level(false))?;
        self.armed = false;
        self.finish();
        info!(zone_id = self.zone_id, minutes = self.minutes, "Watering finished");
        Ok(())
    }

    fn finish(&mut self) {
        self.set_active(None);
        if std::mem::take(&mut self.started) {
            self.append(WateringEvent::stop(self.zone_id, self.minutes));
        }
    }

    fn set_active(&self, zone: Option<u32>) {
        *self.active_zone.lock().unwrap_or_else(PoisonError::into_inner) = zone;
    }

    fn append(&self, event: WateringEvent) {
        if let Err(e) = self.log.append(&event) {
            warn!(zone_id = self.zone_id, action = %event.action, error = %e, "Failed to write watering log");
        }
    }
}

impl Drop for RelayGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.actuator.set_level(self.pin, self.polarity.level(false)) {
            warn!(zone_id = self.zone_id, pin = self.pin, error = %e, "Failed to force relay off");
        } else {
            warn!(zone_id = self.zone_id, pin = self.pin, "Watering interrupted, relay forced off");
        }
        self.finish();
    }
}
