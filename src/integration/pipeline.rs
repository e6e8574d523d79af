//! TrackerPipeline for combining detection with tracking.

use thiserror::Error;

use crate::error::TrackerError;
use crate::tracker::{BYTETracker, STrack, TrackIdCounter, TrackerConfig};

use super::DetectionSource;

#[derive(Debug, Error)]
pub enum PipelineError<E> {
    #[error("detection source failed: {0}")]
    Source(E),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// A detection source bundled with the tracker for its stream.
pub struct TrackerPipeline<D: DetectionSource> {
    detector: D,
    tracker: BYTETracker,
}

impl<D: DetectionSource> TrackerPipeline<D> {
    /// Create a pipeline, validating the tracker configuration.
    pub fn new(detector: D, config: TrackerConfig) -> Result<Self, TrackerError> {
        Ok(Self {
            detector,
            tracker: BYTETracker::try_new(config)?,
        })
    }

    pub fn with_default_config(detector: D) -> Self {
        Self {
            detector,
            tracker: BYTETracker::new(TrackerConfig::default()),
        }
    }

    /// Like [`TrackerPipeline::new`], drawing ids from a counter shared with
    /// other streams.
    pub fn with_id_counter(
        detector: D,
        config: TrackerConfig,
        track_ids: TrackIdCounter,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self {
            detector,
            tracker: BYTETracker::with_id_counter(config, track_ids),
        })
    }

    /// Pull the next frame from the source and update the tracker with it.
    ///
    /// Returns `Ok(None)` once the source has no more frames.
    pub fn process_frame(&mut self) -> Result<Option<Vec<STrack>>, PipelineError<D::Error>> {
        let Some(detections) = self.detector.next_frame().map_err(PipelineError::Source)? else {
            return Ok(None);
        };
        Ok(Some(self.tracker.update(detections)?))
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn tracker(&self) -> &BYTETracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut BYTETracker {
        &mut self.tracker
    }

    pub fn into_parts(self) -> (D, BYTETracker) {
        (self.detector, self.tracker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Detection;

    struct MockDetector {
        frames: std::vec::IntoIter<Vec<Detection>>,
    }

    impl MockDetector {
        fn new(frames: Vec<Vec<Detection>>) -> Self {
            Self {
                frames: frames.into_iter(),
            }
        }
    }

    impl DetectionSource for MockDetector {
        type Error = std::convert::Infallible;

        fn next_frame(&mut self) -> Result<Option<Vec<Detection>>, Self::Error> {
            Ok(self.frames.next())
        }
    }

    struct FailingDetector;

    impl DetectionSource for FailingDetector {
        type Error = String;

        fn next_frame(&mut self) -> Result<Option<Vec<Detection>>, Self::Error> {
            Err("camera unplugged".to_string())
        }
    }

    #[test]
    fn test_tracker_pipeline() {
        let det = Detection::new(30.0, 50.0, 40.0, 60.0, 1, 0.9);
        let detector = MockDetector::new(vec![vec![det.clone()], vec![det]]);

        let mut pipeline = TrackerPipeline::with_default_config(detector);
        let first = pipeline.process_frame().unwrap().unwrap();
        let second = pipeline.process_frame().unwrap().unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].track_id, second[0].track_id);
        assert!(pipeline.process_frame().unwrap().is_none());
        assert_eq!(pipeline.tracker().frame_id(), 2);
    }

    #[test]
    fn test_source_error_is_wrapped() {
        let mut pipeline = TrackerPipeline::with_default_config(FailingDetector);
        let err = pipeline.process_frame().unwrap_err();

        assert!(matches!(err, PipelineError::Source(ref msg) if msg == "camera unplugged"));
        assert_eq!(err.to_string(), "detection source failed: camera unplugged");
        assert_eq!(pipeline.tracker().frame_id(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TrackerConfig {
            frame_rate: -1.0,
            ..Default::default()
        };
        assert!(TrackerPipeline::new(MockDetector::new(vec![]), config).is_err());
    }
}
