use crate::error::Result;
use crate::models::WateringEvent;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only sink for watering audit records
pub trait WateringLog: Send + Sync {
    fn append(&self, event: &WateringEvent) -> Result<()>;
}

/// One JSON object per line: `{timestamp, action, zone, duration_minutes}`
pub struct JsonLinesLog {
    path: PathBuf,
}

impl JsonLinesLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WateringLog for JsonLinesLog {
    fn append(&self, event: &WateringEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WateringAction;

    #[test]
    fn appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonLinesLog::new(dir.path().join("watering.log"));

        log.append(&WateringEvent::start(2, 15.0)).unwrap();
        log.append(&WateringEvent::stop(2, 15.0)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let events: Vec<WateringEvent> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, WateringAction::Start);
        assert_eq!(events[1].action, WateringAction::Stop);
        assert_eq!(events[1].zone, 2);
    }

    #[test]
    fn append_fails_when_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonLinesLog::new(dir.path().join("missing").join("watering.log"));
        assert!(log.append(&WateringEvent::start(1, 1.0)).is_err());
    }
}
