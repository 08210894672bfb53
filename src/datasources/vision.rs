//! Vision detections produced by the external inference pipeline.
//!
//! The pipeline writes one JSON array of detections per zone to
//! `<detections_dir>/zone_<id>.json`; this side only reads them.

use crate::error::{GardenError, Result};
use crate::models::VisionDetection;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum VisionFeed {
    Disabled,
    Directory(PathBuf),
}

impl VisionFeed {
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        match dir {
            Some(dir) => VisionFeed::Directory(dir),
            None => VisionFeed::Disabled,
        }
    }

    /// Latest detections for a zone; none when the zone has no file yet
    pub fn detections(&self, zone_id: u32) -> Result<Vec<VisionDetection>> {
        let VisionFeed::Directory(dir) = self else {
            return Ok(Vec::new());
        };

        let path = dir.join(format!("zone_{}.json", zone_id));
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GardenError::Vision(format!("{}: {}", path.display(), e)));
            }
        };

        serde_json::from_str(&content)
            .map_err(|e| GardenError::Vision(format!("{}: {}", path.display(), e)))
    }
}
