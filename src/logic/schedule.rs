//! Schedule trigger: is a watering cycle due right now?
//!
//! Stateless. The caller supplies the last run time and records a new one
//! after the cycle fires.

use crate::config::ScheduleConfig;
use crate::error::{GardenError, Result};
use chrono::{DateTime, Local, NaiveTime, Timelike};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleFrequency {
    /// Due on every check
    Daily,
    /// Due once at least this many calendar days have passed since the last run
    EveryXDays(u32),
    /// Unrecognised frequency string; never due
    Unknown(String),
}

impl ScheduleFrequency {
    pub fn parse(frequency: &str, every_x_days: u32) -> Self {
        match frequency.trim().to_lowercase().as_str() {
            "daily" => ScheduleFrequency::Daily,
            "every_x_days" => ScheduleFrequency::EveryXDays(every_x_days.max(1)),
            _ => ScheduleFrequency::Unknown(frequency.to_string()),
        }
    }
}

impl std::fmt::Display for ScheduleFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleFrequency::Daily => write!(f, "daily"),
            ScheduleFrequency::EveryXDays(n) => write!(f, "every {} days", n),
            ScheduleFrequency::Unknown(s) => write!(f, "unknown ({})", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Due,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub enabled: bool,
    pub frequency: ScheduleFrequency,
    /// When set, the schedule only fires during this minute of the day
    pub start_time: Option<NaiveTime>,
    /// Zones a cycle waters; empty means every configured zone
    pub zones: Vec<u32>,
    pub last_run: Option<DateTime<Local>>,
}

impl Schedule {
    pub fn from_config(config: &ScheduleConfig, last_run: Option<DateTime<Local>>) -> Result<Self> {
        let start_time = config
            .start_time
            .as_deref()
            .map(parse_start_time)
            .transpose()?;

        Ok(Self {
            enabled: config.enabled,
            frequency: ScheduleFrequency::parse(&config.frequency, config.every_x_days),
            start_time,
            zones: config.zones.clone(),
            last_run,
        })
    }

    /// The zones a cycle should cover, in configured order
    pub fn zones_for(&self, configured: &[u32]) -> Vec<u32> {
        if self.zones.is_empty() {
            configured.to_vec()
        } else {
            configured
                .iter()
                .copied()
                .filter(|id| self.zones.contains(id))
                .collect()
        }
    }
}

fn parse_start_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| GardenError::Config(format!("schedule.start_time {:?} is not HH:MM: {}", s, e)))
}

fn same_minute(a: &DateTime<Local>, b: &DateTime<Local>) -> bool {
    a.date_naive() == b.date_naive() && a.hour() == b.hour() && a.minute() == b.minute()
}

pub fn evaluate(now: DateTime<Local>, schedule: &Schedule) -> TriggerState {
    if !schedule.enabled {
        return TriggerState::Idle;
    }

    if let Some(start) = schedule.start_time {
        if now.hour() != start.hour() || now.minute() != start.minute() {
            return TriggerState::Idle;
        }
        // One firing per start-time window
        if schedule.last_run.is_some_and(|last| same_minute(&last, &now)) {
            return TriggerState::Idle;
        }
    }

    let due = match &schedule.frequency {
        ScheduleFrequency::Daily => true,
        ScheduleFrequency::EveryXDays(days) => match schedule.last_run {
            None => true,
            Some(last) => {
                let elapsed = (now.date_naive() - last.date_naive()).num_days();
                elapsed >= i64::from(*days)
            }
        },
        ScheduleFrequency::Unknown(_) => false,
    };

    if due {
        TriggerState::Due
    } else {
        TriggerState::Idle
    }
}

pub fn is_due(now: DateTime<Local>, schedule: &Schedule) -> bool {
    evaluate(now, schedule) == TriggerState::Due
}
