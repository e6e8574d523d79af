//! Single object track (STrack) for multi-object tracking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array1, Array2, s};

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Source of track ids.
///
/// Every tracker owns a counter of its own. Clones share the underlying
/// atomic, so handing the same counter to several trackers keeps ids unique
/// across all of them.
#[derive(Debug, Clone, Default)]
pub struct TrackIdCounter(Arc<AtomicU64>);

impl TrackIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id, starting at 1. Ids are never handed out twice until `reset`.
    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last id handed out, 0 if none.
    pub fn last_id(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }

    /// Whether this handle is the only owner of the counter.
    pub(crate) fn is_exclusive(&self) -> bool {
        Arc::strong_count(&self.0) == 1
    }
}

/// Single object track.
#[derive(Debug, Clone)]
pub struct STrack {
    /// Unique track identifier, 0 until first activation
    pub track_id: u64,
    /// Class or identity tag supplied by the detector
    pub label: i32,
    /// Current track state
    pub state: TrackState,
    /// Whether the track has been confirmed
    pub is_activated: bool,
    /// Confidence of the last associated detection
    pub score: f32,
    /// Last frame this track was updated in
    pub frame_id: u32,
    /// Frame of first activation
    pub start_frame: u32,
    /// Consecutive successful updates since (re-)activation
    pub tracklet_len: u32,
    mean: Option<Array1<f64>>,
    covariance: Option<Array2<f64>>,
    det_tlwh: Rect,
}

impl STrack {
    /// Create an unactivated track from a detection box in TLWH format.
    pub fn new(tlwh: Rect, score: f32, label: i32) -> Self {
        Self {
            track_id: 0,
            label,
            state: TrackState::New,
            is_activated: false,
            score,
            frame_id: 0,
            start_frame: 0,
            tracklet_len: 0,
            mean: None,
            covariance: None,
            det_tlwh: tlwh,
        }
    }

    /// Current box in TLWH format: the Kalman estimate once activated,
    /// otherwise the detection box.
    pub fn tlwh(&self) -> Rect {
        match &self.mean {
            Some(mean) => {
                let [x, y, w, h] = Self::xyah_to_tlwh([
                    mean[0] as f32,
                    mean[1] as f32,
                    mean[2] as f32,
                    mean[3] as f32,
                ]);
                Rect::new(x, y, w, h)
            }
            None => self.det_tlwh,
        }
    }

    /// Current box as `[x1, y1, x2, y2]`.
    pub fn tlbr(&self) -> [f32; 4] {
        self.tlwh().to_tlbr()
    }

    /// Current box as `[cx, cy, w, h]`, the detector's convention.
    pub fn xywh(&self) -> [f32; 4] {
        self.tlwh().to_xywh()
    }

    /// The detection box this track was built from or last matched with.
    pub fn detection_tlwh(&self) -> Rect {
        self.det_tlwh
    }

    /// Kalman mean `[cx, cy, a, h, vcx, vcy, va, vh]`, if activated.
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    /// Kalman covariance (8x8), if activated.
    pub fn covariance(&self) -> Option<&Array2<f64>> {
        self.covariance.as_ref()
    }

    pub fn end_frame(&self) -> u32 {
        self.frame_id
    }

    pub fn tlwh_to_xyah(tlwh: [f32; 4]) -> [f32; 4] {
        Rect::new(tlwh[0], tlwh[1], tlwh[2], tlwh[3]).to_xyah()
    }

    pub fn xyah_to_tlwh(xyah: [f32; 4]) -> [f32; 4] {
        Rect::from_xyah(xyah[0], xyah[1], xyah[2], xyah[3]).to_tlwh()
    }

    pub fn tlbr_to_tlwh(tlbr: [f32; 4]) -> [f32; 4] {
        Rect::from_tlbr(tlbr[0], tlbr[1], tlbr[2], tlbr[3]).to_tlwh()
    }

    pub fn tlwh_to_tlbr(tlwh: [f32; 4]) -> [f32; 4] {
        Rect::new(tlwh[0], tlwh[1], tlwh[2], tlwh[3]).to_tlbr()
    }

    fn measurement(tlwh: Rect) -> [f64; 4] {
        tlwh.to_xyah().map(f64::from)
    }

    /// Start tracking: initialise the Kalman state and take an id.
    ///
    /// A track that already carries an id keeps it. Only tracks born in the
    /// first frame are confirmed right away.
    pub fn activate(&mut self, kalman_filter: &KalmanFilter, frame_id: u32, ids: &TrackIdCounter) {
        if self.track_id == 0 {
            self.track_id = ids.next_id();
        }

        let (mean, covariance) = kalman_filter.initiate(Self::measurement(self.det_tlwh));
        self.mean = Some(mean);
        self.covariance = Some(covariance);

        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        self.is_activated = frame_id == 1;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    /// Bring a lost track back with a new detection.
    pub fn re_activate(
        &mut self,
        new_track: &STrack,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
        new_id: bool,
        ids: &TrackIdCounter,
    ) {
        self.correct(new_track, kalman_filter);

        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
        self.score = new_track.score;

        if new_id {
            self.track_id = ids.next_id();
        }
    }

    /// Continue a tracked track with a matched detection.
    ///
    /// The prediction for this frame has already been applied by
    /// [`STrack::multi_predict`].
    pub fn update(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.frame_id = frame_id;
        self.tracklet_len += 1;

        self.correct(new_track, kalman_filter);

        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.score = new_track.score;
    }

    fn correct(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter) {
        let measurement = Self::measurement(new_track.det_tlwh);
        let (mean, covariance) = match (&self.mean, &self.covariance) {
            (Some(mean), Some(cov)) => kalman_filter.update(mean, cov, measurement),
            _ => kalman_filter.initiate(measurement),
        };
        self.mean = Some(mean);
        self.covariance = Some(covariance);
        self.det_tlwh = new_track.det_tlwh;
    }

    /// Advance the Kalman state by one frame.
    ///
    /// Tracks that are not `Tracked` have their velocities frozen to zero
    /// first, so a lost track waits where it was last seen.
    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        let state = self.state;
        if let (Some(mean), Some(cov)) = (&mut self.mean, &mut self.covariance) {
            if state != TrackState::Tracked {
                mean.slice_mut(s![4..]).fill(0.0);
            }
            kalman_filter.predict(mean, cov);
        }
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    pub fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    pub fn multi_predict(stracks: &mut [STrack], kalman_filter: &KalmanFilter) {
        for strack in stracks.iter_mut() {
            strack.predict(kalman_filter);
        }
    }
}

impl From<&Detection> for STrack {
    fn from(det: &Detection) -> Self {
        Self::new(det.bbox, det.score, det.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn track(x: f32, y: f32) -> STrack {
        STrack::new(Rect::new(x, y, 20.0, 40.0), 0.9, 3)
    }

    #[test]
    fn test_id_counter_shared_between_clones() {
        let a = TrackIdCounter::new();
        let b = a.clone();
        assert_eq!(a.next_id(), 1);
        assert_eq!(b.next_id(), 2);
        assert_eq!(a.last_id(), 2);
        assert!(!a.is_exclusive());

        a.reset();
        assert_eq!(b.next_id(), 1);
    }

    #[test]
    fn test_activate_first_frame() {
        let kf = KalmanFilter::new();
        let ids = TrackIdCounter::new();
        let mut t = track(10.0, 10.0);
        t.activate(&kf, 1, &ids);

        assert_eq!(t.track_id, 1);
        assert_eq!(t.state, TrackState::Tracked);
        assert!(t.is_activated);
        assert_eq!(t.start_frame, 1);
        assert_eq!(t.tracklet_len, 0);
        assert_relative_eq!(t.tlwh().x, 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_activate_later_frame_is_unconfirmed() {
        let kf = KalmanFilter::new();
        let ids = TrackIdCounter::new();
        let mut t = track(10.0, 10.0);
        t.activate(&kf, 4, &ids);
        assert!(!t.is_activated);
        assert_eq!(t.start_frame, 4);
    }

    #[test]
    fn test_activate_preserves_existing_id() {
        let kf = KalmanFilter::new();
        let ids = TrackIdCounter::new();
        let mut t = track(10.0, 10.0);
        t.track_id = 42;
        t.activate(&kf, 1, &ids);
        assert_eq!(t.track_id, 42);
        assert_eq!(ids.last_id(), 0);
    }

    #[test]
    fn test_update_keeps_id_and_label() {
        let kf = KalmanFilter::new();
        let ids = TrackIdCounter::new();
        let mut t = track(10.0, 10.0);
        t.activate(&kf, 1, &ids);
        let id = t.track_id;

        for frame in 2..5 {
            STrack::multi_predict(std::slice::from_mut(&mut t), &kf);
            let mut det = track(11.0, 10.0);
            det.label = 9;
            det.score = 0.7;
            t.update(&det, &kf, frame);
        }

        assert_eq!(t.track_id, id);
        assert_eq!(t.label, 3);
        assert_eq!(t.tracklet_len, 3);
        assert_eq!(t.frame_id, 4);
        assert_eq!(t.score, 0.7);
    }

    #[test]
    fn test_re_activate() {
        let kf = KalmanFilter::new();
        let ids = TrackIdCounter::new();
        let mut t = track(10.0, 10.0);
        t.activate(&kf, 1, &ids);
        t.mark_lost();

        t.re_activate(&track(12.0, 10.0), &kf, 5, false, &ids);
        assert_eq!(t.track_id, 1);
        assert_eq!(t.state, TrackState::Tracked);
        assert!(t.is_activated);
        assert_eq!(t.frame_id, 5);

        t.mark_lost();
        t.re_activate(&track(12.0, 10.0), &kf, 6, true, &ids);
        assert_eq!(t.track_id, 2);
    }

    #[test]
    fn test_predict_freezes_lost_velocity() {
        let kf = KalmanFilter::new();
        let ids = TrackIdCounter::new();
        let mut t = track(10.0, 10.0);
        t.activate(&kf, 1, &ids);
        for (frame, x) in (2..6).zip([14.0, 18.0, 22.0, 26.0]) {
            t.predict(&kf);
            t.update(&track(x, 10.0), &kf, frame);
        }
        assert!(t.mean().unwrap()[4] > 0.0);

        t.mark_lost();
        let before = t.tlwh();
        t.predict(&kf);
        let after = t.tlwh();

        assert_relative_eq!(before.x, after.x, epsilon = 1e-4);
        assert!(t.mean().unwrap().slice(s![4..]).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_geometry_round_trip() {
        let tlwh = [15.5, 30.25, 48.0, 96.0];
        let back = STrack::xyah_to_tlwh(STrack::tlwh_to_xyah(tlwh));
        for (a, b) in tlwh.iter().zip(back.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-4);
        }

        let tlbr = STrack::tlwh_to_tlbr(tlwh);
        assert_eq!(STrack::tlbr_to_tlwh(tlbr), tlwh);
    }

    #[test]
    fn test_unactivated_geometry_is_detection_box() {
        let t = track(10.0, 10.0);
        assert_eq!(t.tlbr(), [10.0, 10.0, 30.0, 50.0]);
        assert_eq!(t.xywh(), [20.0, 30.0, 20.0, 40.0]);
        assert!(t.mean().is_none());
    }
}
