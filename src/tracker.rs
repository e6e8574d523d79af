mod byte_tracker;
mod config;
mod kalman_filter;
mod lap;
mod matching;
mod rect;
mod strack;
mod track_state;

pub use byte_tracker::{BYTETracker, joint_stracks, remove_duplicate_stracks, sub_stracks};
pub use config::TrackerConfig;
pub use kalman_filter::{CHI2INV95, KalmanFilter};
pub use lap::{LapjvSolution, lapjv};
pub use matching::{AssignmentResult, Detection, fuse_score, iou_distance, ious, linear_assignment};
pub use rect::{Rect, tlbr_iou};
pub use strack::{STrack, TrackIdCounter};
pub use track_state::TrackState;
