//! Upstream side of the pipeline.

use crate::tracker::Detection;

/// Anything that produces detections frame by frame.
///
/// On a device this wraps the inference engine; in tests it is usually a
/// scripted list of frames.
///
/// # Example
///
/// ```
/// use bytetrack_embedded::{Detection, DetectionSource};
///
/// struct Replay(std::vec::IntoIter<Vec<Detection>>);
///
/// impl DetectionSource for Replay {
///     type Error = std::convert::Infallible;
///
///     fn next_frame(&mut self) -> Result<Option<Vec<Detection>>, Self::Error> {
///         Ok(self.0.next())
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error;

    /// Detections of the next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Vec<Detection>>, Self::Error>;
}

/// Conversion from model-specific outputs into tracker input.
pub trait IntoDetections {
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}

/// Raw inference rows: `[cx, cy, w, h, label, score]`.
impl IntoDetections for &[[f32; 6]] {
    fn into_detections(self) -> Vec<Detection> {
        self.iter()
            .map(|&[cx, cy, w, h, label, score]| Detection::new(cx, cy, w, h, label as i32, score))
            .collect()
    }
}
