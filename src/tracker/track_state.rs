use serde::{Deserialize, Serialize};

/// Lifecycle of a track.
///
/// `New` only exists before the first activation. Afterwards a track is in
/// exactly one of `Tracked`, `Lost` or `Removed`, and `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackState {
    /// Built from a detection, never activated
    #[default]
    New,
    /// Matched in the current frame or just born
    Tracked,
    /// Unmatched for at least one frame, still eligible for re-association
    Lost,
    /// Exceeded the loss budget or failed confirmation
    Removed,
}
