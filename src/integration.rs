//! Glue between a detection source and the tracker.
//!
//! A [`DetectionSource`] yields one frame's detections at a time, a
//! [`TrackerPipeline`] feeds them to a [`BYTETracker`](crate::BYTETracker),
//! and [`TrackOutput`] is the flat record handed to whatever consumes the
//! tracks.

mod builder;
mod detector;
mod output;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, IntoDetections};
pub use output::TrackOutput;
pub use pipeline::{PipelineError, TrackerPipeline};
