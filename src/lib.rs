//! ByteTrack multi-object tracking for on-device detection pipelines.
//!
//! The tracker consumes one list of [`Detection`]s per frame and returns the
//! tracks it currently considers confirmed, each carrying a stable id.
//!
//! ```
//! use bytetrack_embedded::{BYTETracker, Detection, TrackerConfig};
//!
//! let mut tracker = BYTETracker::new(TrackerConfig::default());
//! let tracks = tracker
//!     .update(vec![Detection::new(50.0, 50.0, 20.0, 20.0, 0, 0.9)])
//!     .unwrap();
//! assert_eq!(tracks.len(), 1);
//! ```

pub mod error;
pub mod integration;
pub mod tracker;

pub use error::TrackerError;
pub use integration::{
    DetectionBuilder, DetectionSource, IntoDetections, PipelineError, TrackOutput, TrackerPipeline,
};
pub use tracker::{BYTETracker, Detection, STrack, TrackIdCounter, TrackState, TrackerConfig};
