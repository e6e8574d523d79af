use serde::{Deserialize, Serialize};

use crate::tracker::STrack;

/// Flat per-track record for downstream consumers.
///
/// `x` and `y` are the box center, matching the detection input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackOutput {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub score: f32,
    pub label: i32,
    pub track_id: u64,
}

impl From<&STrack> for TrackOutput {
    fn from(track: &STrack) -> Self {
        let [x, y, w, h] = track.xywh();
        Self {
            x,
            y,
            w,
            h,
            score: track.score,
            label: track.label,
            track_id: track.track_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{KalmanFilter, Rect, TrackIdCounter};
    use approx::assert_relative_eq;

    #[test]
    fn test_from_strack_uses_center_form() {
        let mut track = STrack::new(Rect::new(10.0, 20.0, 40.0, 60.0), 0.7, 5);
        track.activate(&KalmanFilter::default(), 1, &TrackIdCounter::new());

        let out = TrackOutput::from(&track);
        assert_relative_eq!(out.x, 30.0, epsilon = 1e-4);
        assert_relative_eq!(out.y, 50.0, epsilon = 1e-4);
        assert_relative_eq!(out.w, 40.0, epsilon = 1e-4);
        assert_relative_eq!(out.h, 60.0, epsilon = 1e-4);
        assert_eq!(out.label, 5);
        assert_eq!(out.track_id, 1);

        let json = serde_json::to_value(out).unwrap();
        assert_eq!(json["track_id"], 1);
        assert_eq!(json["label"], 5);
    }
}
