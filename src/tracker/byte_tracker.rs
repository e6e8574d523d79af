//! Main BYTETracker algorithm implementation.

use std::collections::HashSet;
use std::mem;

use ndarray::Array2;

use crate::error::TrackerError;
use crate::tracker::config::TrackerConfig;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::strack::{STrack, TrackIdCounter};
use crate::tracker::track_state::TrackState;

/// ByteTrack multi-object tracker for a single video stream.
///
/// Call [`BYTETracker::update`] once per frame, in frame order.
pub struct BYTETracker {
    tracked_stracks: Vec<STrack>,
    lost_stracks: Vec<STrack>,
    removed_stracks: Vec<STrack>,
    frame_id: u32,
    config: TrackerConfig,
    max_time_lost: u32,
    kalman_filter: KalmanFilter,
    track_ids: TrackIdCounter,
    solver_failures: u32,
}

impl BYTETracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_id_counter(config, TrackIdCounter::new())
    }

    /// Like [`BYTETracker::new`], rejecting an invalid configuration.
    pub fn try_new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Build a tracker that draws ids from `track_ids`, which may be shared
    /// with trackers of other streams.
    pub fn with_id_counter(config: TrackerConfig, track_ids: TrackIdCounter) -> Self {
        let max_time_lost = config.max_time_lost();
        Self {
            tracked_stracks: Vec::new(),
            lost_stracks: Vec::new(),
            removed_stracks: Vec::new(),
            frame_id: 0,
            config,
            max_time_lost,
            kalman_filter: KalmanFilter::default(),
            track_ids,
            solver_failures: 0,
        }
    }

    /// Process one frame of detections and return the confirmed tracks.
    ///
    /// An assignment failure leaves the affected stage unmatched and the
    /// frame is still processed. Once failures have occurred in
    /// `max_solver_failures` consecutive frames the call returns
    /// [`TrackerError::PersistentSolverFailure`]; the tracker state remains
    /// usable.
    pub fn update(&mut self, detections: Vec<Detection>) -> Result<Vec<STrack>, TrackerError> {
        self.frame_id += 1;
        self.removed_stracks.clear();
        let frame_id = self.frame_id;
        let mut failed_stages = 0;

        let mut activated_stracks = Vec::new();
        let mut refind_stracks = Vec::new();
        let mut lost_stracks = Vec::new();
        let mut removed_stracks = Vec::new();

        // Step 1: Split detections into high-score and low-score
        let mut detections_high = Vec::new();
        let mut detections_low = Vec::new();
        for det in &detections {
            if det.score > self.config.track_thresh {
                detections_high.push(STrack::from(det));
            } else if det.score > self.config.low_score_thresh {
                detections_low.push(STrack::from(det));
            }
        }
        let (num_high, num_low) = (detections_high.len(), detections_low.len());

        // Create track pool
        let (unconfirmed, tracked_stracks): (Vec<_>, Vec<_>) =
            mem::take(&mut self.tracked_stracks)
                .into_iter()
                .partition(|t| !t.is_activated);

        let mut strack_pool = joint_stracks(tracked_stracks, mem::take(&mut self.lost_stracks));

        // Step 2: First association, with high score detections
        STrack::multi_predict(&mut strack_pool, &self.kalman_filter);

        let mut dists = matching::iou_distance(&strack_pool, &detections_high);
        if self.config.fuse_score {
            matching::fuse_score(&mut dists, &detections_high);
        }
        let first = associate(&dists, self.config.match_thresh, &mut failed_stages);

        let mut pool = into_slots(strack_pool);
        for (itracked, idet) in first.matches {
            let Some(mut track) = take_slot(&mut pool, itracked) else {
                continue;
            };
            let det = &detections_high[idet];
            if track.state == TrackState::Tracked {
                track.update(det, &self.kalman_filter, frame_id);
                activated_stracks.push(track);
            } else {
                track.re_activate(det, &self.kalman_filter, frame_id, false, &self.track_ids);
                log::trace!("frame {frame_id}: re-found track {}", track.track_id);
                refind_stracks.push(track);
            }
        }

        // Step 3: Second association, with low score detection boxes
        let mut r_tracked_stracks = Vec::new();
        let mut still_lost = Vec::new();
        for idx in first.unmatched_tracks {
            if let Some(track) = take_slot(&mut pool, idx) {
                if track.state == TrackState::Tracked {
                    r_tracked_stracks.push(track);
                } else {
                    still_lost.push(track);
                }
            }
        }

        let dists = matching::iou_distance(&r_tracked_stracks, &detections_low);
        let second = associate(&dists, self.config.low_match_thresh, &mut failed_stages);

        let mut r_tracked = into_slots(r_tracked_stracks);
        for (itracked, idet) in second.matches {
            if let Some(mut track) = take_slot(&mut r_tracked, itracked) {
                track.update(&detections_low[idet], &self.kalman_filter, frame_id);
                activated_stracks.push(track);
            }
        }
        for idx in second.unmatched_tracks {
            if let Some(mut track) = take_slot(&mut r_tracked, idx) {
                track.mark_lost();
                log::trace!("frame {frame_id}: lost track {}", track.track_id);
                lost_stracks.push(track);
            }
        }

        // Deal with unconfirmed tracks, usually tracks with only one beginning frame
        let mut high = into_slots(detections_high);
        let detections_rem: Vec<STrack> = first
            .unmatched_detections
            .iter()
            .filter_map(|&idx| take_slot(&mut high, idx))
            .collect();

        let mut dists = matching::iou_distance(&unconfirmed, &detections_rem);
        if self.config.fuse_score {
            matching::fuse_score(&mut dists, &detections_rem);
        }
        let third = associate(&dists, self.config.match_thresh, &mut failed_stages);

        let mut unconfirmed = into_slots(unconfirmed);
        for (itracked, idet) in third.matches {
            if let Some(mut track) = take_slot(&mut unconfirmed, itracked) {
                track.update(&detections_rem[idet], &self.kalman_filter, frame_id);
                activated_stracks.push(track);
            }
        }
        for idx in third.unmatched_tracks {
            if let Some(mut track) = take_slot(&mut unconfirmed, idx) {
                track.mark_removed();
                removed_stracks.push(track);
            }
        }

        // Step 4: Init new stracks
        let mut remaining = into_slots(detections_rem);
        for idx in third.unmatched_detections {
            let Some(mut track) = take_slot(&mut remaining, idx) else {
                continue;
            };
            if track.score <= self.config.high_thresh {
                continue;
            }
            track.activate(&self.kalman_filter, frame_id, &self.track_ids);
            log::trace!("frame {frame_id}: new track {}", track.track_id);
            activated_stracks.push(track);
        }

        // Step 5: Update state
        let mut lost_survivors = Vec::new();
        for mut track in still_lost {
            if frame_id.saturating_sub(track.end_frame()) > self.max_time_lost {
                track.mark_removed();
                log::trace!("frame {frame_id}: removed track {}", track.track_id);
                removed_stracks.push(track);
            } else {
                lost_survivors.push(track);
            }
        }

        let tracked: Vec<STrack> = joint_stracks(activated_stracks, refind_stracks)
            .into_iter()
            .filter(|t| t.state == TrackState::Tracked)
            .collect();

        let mut lost = sub_stracks(lost_survivors, &tracked);
        lost.extend(lost_stracks);
        let lost = sub_stracks(lost, &removed_stracks);

        let (tracked, lost) =
            remove_duplicate_stracks(tracked, lost, self.config.duplicate_thresh);
        self.tracked_stracks = tracked;
        self.lost_stracks = lost;
        self.removed_stracks = removed_stracks;

        log::debug!(
            "frame {frame_id}: {num_high} high / {num_low} low detections, \
             {} tracked, {} lost, {} removed",
            self.tracked_stracks.len(),
            self.lost_stracks.len(),
            self.removed_stracks.len()
        );

        self.record_solver_failures(failed_stages)?;

        Ok(self
            .tracked_stracks
            .iter()
            .filter(|t| t.is_activated)
            .cloned()
            .collect())
    }

    fn record_solver_failures(&mut self, failed_stages: u32) -> Result<(), TrackerError> {
        if failed_stages == 0 {
            self.solver_failures = 0;
            return Ok(());
        }

        self.solver_failures += 1;
        let limit = self.config.max_solver_failures;
        if limit > 0 && self.solver_failures >= limit {
            return Err(TrackerError::PersistentSolverFailure {
                frames: self.solver_failures,
            });
        }
        Ok(())
    }

    /// Drop all tracks and restart frame numbering.
    ///
    /// The id counter is reset too unless it is shared with another tracker.
    pub fn reset(&mut self) {
        self.tracked_stracks.clear();
        self.lost_stracks.clear();
        self.removed_stracks.clear();
        self.frame_id = 0;
        self.solver_failures = 0;
        if self.track_ids.is_exclusive() {
            self.track_ids.reset();
        }
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    pub fn max_time_lost(&self) -> u32 {
        self.max_time_lost
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn track_id_counter(&self) -> &TrackIdCounter {
        &self.track_ids
    }

    /// All tracks in the `Tracked` state, confirmed or not.
    pub fn tracked_stracks(&self) -> &[STrack] {
        &self.tracked_stracks
    }

    pub fn lost_stracks(&self) -> &[STrack] {
        &self.lost_stracks
    }

    /// Tracks removed during the last `update`.
    pub fn removed_stracks(&self) -> &[STrack] {
        &self.removed_stracks
    }

    pub fn take_removed(&mut self) -> Vec<STrack> {
        mem::take(&mut self.removed_stracks)
    }
}

/// Run one association stage; a solver failure leaves everything unmatched.
fn associate(cost_matrix: &Array2<f32>, thresh: f32, failures: &mut u32) -> AssignmentResult {
    match matching::linear_assignment(cost_matrix, thresh) {
        Ok(result) => result,
        Err(e) => {
            log::warn!("association skipped: {e}");
            *failures += 1;
            let (rows, cols) = cost_matrix.dim();
            AssignmentResult::unmatched(rows, cols)
        }
    }
}

fn into_slots(tracks: Vec<STrack>) -> Vec<Option<STrack>> {
    tracks.into_iter().map(Some).collect()
}

fn take_slot(slots: &mut [Option<STrack>], idx: usize) -> Option<STrack> {
    slots.get_mut(idx).and_then(Option::take)
}

/// Concatenate two track lists, skipping ids of `tlistb` already in `tlista`.
pub fn joint_stracks(tlista: Vec<STrack>, tlistb: Vec<STrack>) -> Vec<STrack> {
    let mut exists: HashSet<u64> = tlista.iter().map(|t| t.track_id).collect();
    let mut res = tlista;
    for t in tlistb {
        if exists.insert(t.track_id) {
            res.push(t);
        }
    }
    res
}

/// Tracks of `tlista` whose id does not appear in `tlistb`.
pub fn sub_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let b_ids: HashSet<u64> = tlistb.iter().map(|t| t.track_id).collect();
    tlista
        .into_iter()
        .filter(|t| !b_ids.contains(&t.track_id))
        .collect()
}

/// Resolve tracked/lost pairs that overlap almost completely.
///
/// For each pair with IoU distance below `thresh`, the track that has been
/// alive for fewer frames is dropped from its list.
pub fn remove_duplicate_stracks(
    stracksa: Vec<STrack>,
    stracksb: Vec<STrack>,
    thresh: f32,
) -> (Vec<STrack>, Vec<STrack>) {
    if stracksa.is_empty() || stracksb.is_empty() {
        return (stracksa, stracksb);
    }

    let pdist = matching::iou_distance(&stracksa, &stracksb);

    let mut dupa = vec![false; stracksa.len()];
    let mut dupb = vec![false; stracksb.len()];
    for ((i, j), &dist) in pdist.indexed_iter() {
        if dist < thresh {
            let timep = stracksa[i].frame_id.saturating_sub(stracksa[i].start_frame);
            let timeq = stracksb[j].frame_id.saturating_sub(stracksb[j].start_frame);
            if timep > timeq {
                dupb[j] = true;
            } else {
                dupa[i] = true;
            }
        }
    }

    let keep = |tracks: Vec<STrack>, dup: &[bool]| -> Vec<STrack> {
        tracks
            .into_iter()
            .zip(dup)
            .filter(|(_, d)| !**d)
            .map(|(t, _)| t)
            .collect()
    };

    (keep(stracksa, &dupa), keep(stracksb, &dupb))
}
