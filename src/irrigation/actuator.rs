//! Relay actuators.
//!
//! The controller only ever talks to [`Actuator`]; which implementation it
//! gets is decided once, at construction, from `system.simulation_mode`.
//! Levels here are electrical (true = high). Mapping logical ON/OFF to a
//! level is the controller's job, via `RelayPolarity`.

use crate::error::{GardenError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub trait Actuator: Send {
    fn name(&self) -> &'static str;

    /// Take ownership of `pin` as an output, driven to `initial_high`.
    /// Claiming an already claimed pin is a no-op.
    fn claim(&mut self, pin: u32, initial_high: bool) -> Result<()>;

    fn set_level(&mut self, pin: u32, high: bool) -> Result<()>;

    fn claimed_pins(&self) -> Vec<u32>;

    /// Hand every claimed pin back to the system
    fn release(&mut self) -> Result<()>;
}

/// In-memory relay board shared between a [`SimulatedActuator`] and whoever
/// wants to observe it (status output, tests).
#[derive(Debug, Clone, Default)]
pub struct RelayBoard {
    inner: Arc<Mutex<BoardState>>,
}

#[derive(Debug, Default)]
struct BoardState {
    levels: BTreeMap<u32, bool>,
    writes: Vec<(u32, bool)>,
    released: bool,
}

impl RelayBoard {
    pub fn level(&self, pin: u32) -> Option<bool> {
        self.lock().levels.get(&pin).copied()
    }

    /// Every level written, in order
    pub fn writes(&self) -> Vec<(u32, bool)> {
        self.lock().writes.clone()
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
pub struct SimulatedActuator {
    board: RelayBoard,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(&self) -> RelayBoard {
        self.board.clone()
    }
}

impl Actuator for SimulatedActuator {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn claim(&mut self, pin: u32, initial_high: bool) -> Result<()> {
        let mut state = self.board.lock();
        if !state.levels.contains_key(&pin) {
            state.levels.insert(pin, initial_high);
            state.writes.push((pin, initial_high));
        }
        state.released = false;
        Ok(())
    }

    fn set_level(&mut self, pin: u32, high: bool) -> Result<()> {
        let mut state = self.board.lock();
        state.levels.insert(pin, high);
        state.writes.push((pin, high));
        tracing::debug!(pin, high, "[SIM] relay level");
        Ok(())
    }

    fn claimed_pins(&self) -> Vec<u32> {
        self.board.lock().levels.keys().copied().collect()
    }

    fn release(&mut self) -> Result<()> {
        self.board.lock().released = true;
        Ok(())
    }
}

/// Linux GPIO through the sysfs interface (`/sys/class/gpio`)
#[derive(Debug)]
pub struct SysfsActuator {
    root: PathBuf,
    claimed: Vec<u32>,
}

impl SysfsActuator {
    /// Check the GPIO interface is present and writable before using it
    pub fn probe(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let export = root.join("export");

        let meta = std::fs::metadata(&export).map_err(|e| {
            GardenError::HardwareUnavailable(format!("{}: {}", export.display(), e))
        })?;
        if meta.permissions().readonly() {
            return Err(GardenError::HardwareUnavailable(format!(
                "{} is not writable",
                export.display()
            )));
        }

        Ok(Self {
            root,
            claimed: Vec::new(),
        })
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn write(&self, path: PathBuf, value: &str) -> Result<()> {
        std::fs::write(&path, value)
            .map_err(|e| GardenError::Hardware(format!("write {}: {}", path.display(), e)))
    }
}

impl Actuator for SysfsActuator {
    fn name(&self) -> &'static str {
        "sysfs-gpio"
    }

    fn claim(&mut self, pin: u32, initial_high: bool) -> Result<()> {
        if self.claimed.contains(&pin) {
            return Ok(());
        }

        if !self.pin_dir(pin).exists() {
            self.write(self.root.join("export"), &pin.to_string())?;
        }
        // "high"/"low" set direction and initial level in one write, so the
        // line never glitches through the wrong state
        let direction = if initial_high { "high" } else { "low" };
        self.write(self.pin_dir(pin).join("direction"), direction)?;

        self.claimed.push(pin);
        tracing::debug!(pin, initial_high, "GPIO claimed");
        Ok(())
    }

    fn set_level(&mut self, pin: u32, high: bool) -> Result<()> {
        self.write(self.pin_dir(pin).join("value"), if high { "1" } else { "0" })
    }

    fn claimed_pins(&self) -> Vec<u32> {
        self.claimed.clone()
    }

    fn release(&mut self) -> Result<()> {
        let mut first_error = None;
        for pin in std::mem::take(&mut self.claimed) {
            if let Err(e) = self.write(self.root.join("unexport"), &pin.to_string()) {
                tracing::warn!(pin, error = %e, "Failed to unexport GPIO");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
