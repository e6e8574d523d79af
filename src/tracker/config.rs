use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Configuration for the BYTETracker.
///
/// Missing fields take their defaults when deserialized, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections scoring above this are high confidence.
    pub track_thresh: f32,
    /// Unmatched high-confidence detections above this start new tracks.
    pub high_thresh: f32,
    /// Cost limit for the high-confidence and unconfirmed associations.
    pub match_thresh: f32,
    /// Cost limit for the low-confidence association.
    pub low_match_thresh: f32,
    /// Detections at or below this score are discarded.
    pub low_score_thresh: f32,
    /// Tracked/lost pairs closer than this IoU distance are duplicates.
    pub duplicate_thresh: f32,
    /// Frames a lost track is kept, at 30 fps.
    pub track_buffer: u32,
    pub frame_rate: f32,
    /// Weight high-confidence IoU costs by detection score.
    pub fuse_score: bool,
    /// Consecutive frames with solver failures before `update` reports an
    /// error. 0 never reports.
    pub max_solver_failures: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            high_thresh: 0.6,
            match_thresh: 0.8,
            low_match_thresh: 0.5,
            low_score_thresh: 0.1,
            duplicate_thresh: 0.15,
            track_buffer: 30,
            frame_rate: 10.0,
            fuse_score: false,
            max_solver_failures: 3,
        }
    }
}

impl TrackerConfig {
    /// Frames a track may stay lost before it is removed.
    pub fn max_time_lost(&self) -> u32 {
        (self.frame_rate / 30.0 * self.track_buffer as f32) as u32
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        let unit = [
            ("track_thresh", self.track_thresh),
            ("high_thresh", self.high_thresh),
            ("match_thresh", self.match_thresh),
            ("low_match_thresh", self.low_match_thresh),
            ("low_score_thresh", self.low_score_thresh),
            ("duplicate_thresh", self.duplicate_thresh),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.high_thresh < self.track_thresh {
            return Err(TrackerError::InvalidConfig(format!(
                "high_thresh ({}) is below track_thresh ({})",
                self.high_thresh, self.track_thresh
            )));
        }
        if self.low_score_thresh > self.track_thresh {
            return Err(TrackerError::InvalidConfig(format!(
                "low_score_thresh ({}) is above track_thresh ({})",
                self.low_score_thresh, self.track_thresh
            )));
        }
        if !(self.frame_rate > 0.0 && self.frame_rate.is_finite()) {
            return Err(TrackerError::InvalidConfig(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }

        Ok(())
    }
}
