//! Nearest-neighbour identity tracker.
//!
//! Detections are matched to live identities by the Euclidean distance
//! between top-left corners in normalized coordinates. Identities that go
//! unmatched are kept (un-aged) for a bounded number of calls so a brief
//! detector miss does not relabel a face.

use crate::shared::constants::{DEFAULT_MATCH_THRESHOLD, DEFAULT_MAX_SILENT_FRAMES};

use super::detected_face::DetectedFace;

/// A detection carrying a stable identity across frames.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedFace {
    pub face: DetectedFace,
    pub track_id: u32,
    /// Frames this identity has been matched, starting at 1.
    pub age: u32,
}

#[derive(Clone, Debug)]
struct Identity {
    tracked: TrackedFace,
    missed: u32,
    last_seen_ms: f64,
}

pub struct IdentityTracker {
    identities: Vec<Identity>,
    next_id: u32,
    match_threshold: f64,
    max_silent_frames: u32,
}

impl IdentityTracker {
    pub fn new(match_threshold: f64, max_silent_frames: u32) -> Self {
        Self {
            identities: Vec::new(),
            next_id: 1,
            match_threshold,
            max_silent_frames,
        }
    }

    /// Reconciles a fresh detection set with the live identities.
    ///
    /// Returns one `TrackedFace` per detection, in detection order: either
    /// a continued identity or a newly spawned one.
    pub fn reconcile(&mut self, detections: &[DetectedFace], now_ms: f64) -> Vec<TrackedFace> {
        let existing = self.identities.len();
        let mut claimed = vec![false; existing];
        let mut output = Vec::with_capacity(detections.len());

        for detection in detections {
            let tracked = match self.nearest_unclaimed(detection, &claimed) {
                Some(idx) => {
                    claimed[idx] = true;
                    self.continue_identity(idx, detection, now_ms)
                }
                None => self.spawn_identity(detection, now_ms),
            };
            output.push(tracked);
        }

        self.age_unclaimed(&claimed);
        output
    }

    pub fn live_count(&self) -> usize {
        self.identities.len()
    }

    /// Timestamp of the last match for `track_id`, if it is still live.
    pub fn last_seen_ms(&self, track_id: u32) -> Option<f64> {
        self.identities
            .iter()
            .find(|i| i.tracked.track_id == track_id)
            .map(|i| i.last_seen_ms)
    }

    pub fn clear(&mut self) {
        self.identities.clear();
    }

    /// Index of the closest unclaimed identity strictly within the match
    /// threshold. Equal distances keep the earlier identity.
    fn nearest_unclaimed(&self, detection: &DetectedFace, claimed: &[bool]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, identity) in self.identities.iter().enumerate().take(claimed.len()) {
            if claimed[idx] {
                continue;
            }
            let distance = identity
                .tracked
                .face
                .bounding_box
                .corner_distance(&detection.bounding_box);
            if distance >= self.match_threshold {
                continue;
            }
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn continue_identity(
        &mut self,
        idx: usize,
        detection: &DetectedFace,
        now_ms: f64,
    ) -> TrackedFace {
        let identity = &mut self.identities[idx];
        identity.tracked.face = detection.clone();
        identity.tracked.age = identity.tracked.age.saturating_add(1);
        identity.missed = 0;
        identity.last_seen_ms = now_ms;
        identity.tracked.clone()
    }

    fn spawn_identity(&mut self, detection: &DetectedFace, now_ms: f64) -> TrackedFace {
        let tracked = TrackedFace {
            face: detection.clone(),
            track_id: self.next_id,
            age: 1,
        };
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.identities.push(Identity {
            tracked: tracked.clone(),
            missed: 0,
            last_seen_ms: now_ms,
        });
        tracked
    }

    /// Identities that existed before this call and were not claimed count
    /// a miss; those silent for longer than `max_silent_frames` are removed.
    fn age_unclaimed(&mut self, claimed: &[bool]) {
        for (identity, &was_claimed) in self.identities.iter_mut().zip(claimed) {
            if !was_claimed {
                identity.missed += 1;
            }
        }
        let max_silent = self.max_silent_frames;
        self.identities.retain(|i| i.missed <= max_silent);
    }
}

impl Default for IdentityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD, DEFAULT_MAX_SILENT_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detected_face::BoundingBox;
    use std::collections::HashSet;

    fn det(x: f64, y: f64, w: f64, h: f64) -> DetectedFace {
        DetectedFace::new(BoundingBox::new(x, y, w, h), 0.9)
    }

    #[test]
    fn test_new_detections_get_unique_ids() {
        let mut tracker = IdentityTracker::default();
        let tracks = tracker.reconcile(&[det(0.0, 0.0, 0.1, 0.1), det(0.6, 0.6, 0.1, 0.1)], 0.0);
        assert_eq!(tracks.len(), 2);
        assert_ne!(tracks[0].track_id, tracks[1].track_id);
        assert!(tracks.iter().all(|t| t.age == 1));
    }

    #[test]
    fn test_consistent_id_across_frames() {
        let mut tracker = IdentityTracker::new(0.3, 30);
        let t1 = tracker.reconcile(&[det(0.20, 0.20, 0.15, 0.20)], 0.0);
        let t2 = tracker.reconcile(&[det(0.21, 0.19, 0.15, 0.20)], 33.0);

        assert_eq!(t2.len(), 1);
        assert_eq!(t2[0].track_id, t1[0].track_id);
        assert_eq!(t2[0].age, 2);
        assert_eq!(t2[0].face.bounding_box, BoundingBox::new(0.21, 0.19, 0.15, 0.20));
        assert_eq!(tracker.last_seen_ms(t2[0].track_id), Some(33.0));
    }

    #[test]
    fn test_distance_at_threshold_does_not_match() {
        let mut tracker = IdentityTracker::new(0.5, 30);
        let t1 = tracker.reconcile(&[det(0.0, 0.0, 0.1, 0.1)], 0.0);
        // distance exactly 0.5 is not strictly below the threshold
        let t2 = tracker.reconcile(&[det(0.5, 0.0, 0.1, 0.1)], 1.0);
        assert_ne!(t1[0].track_id, t2[0].track_id);
        assert_eq!(t2[0].age, 1);
    }

    #[test]
    fn test_nearest_identity_wins() {
        let mut tracker = IdentityTracker::new(0.3, 30);
        let t1 = tracker.reconcile(&[det(0.10, 0.10, 0.1, 0.1), det(0.30, 0.10, 0.1, 0.1)], 0.0);
        let t2 = tracker.reconcile(&[det(0.27, 0.10, 0.1, 0.1)], 1.0);
        assert_eq!(t2[0].track_id, t1[1].track_id);
    }

    #[test]
    fn test_equal_distance_prefers_first_identity() {
        let mut tracker = IdentityTracker::new(0.3, 30);
        let t1 = tracker.reconcile(&[det(0.25, 0.5, 0.1, 0.1), det(0.75, 0.5, 0.1, 0.1)], 0.0);
        let t2 = tracker.reconcile(&[det(0.5, 0.5, 0.1, 0.1)], 1.0);
        assert_eq!(t2[0].track_id, t1[0].track_id);
    }

    #[test]
    fn test_identity_claimed_at_most_once() {
        let mut tracker = IdentityTracker::new(0.3, 30);
        let t1 = tracker.reconcile(&[det(0.20, 0.20, 0.1, 0.1)], 0.0);
        let t2 = tracker.reconcile(&[det(0.21, 0.20, 0.1, 0.1), det(0.22, 0.20, 0.1, 0.1)], 1.0);

        assert_eq!(t2.len(), 2);
        assert_eq!(t2[0].track_id, t1[0].track_id);
        assert_ne!(t2[1].track_id, t1[0].track_id);
        assert_eq!(t2[1].age, 1);
    }

    #[test]
    fn test_more_detections_than_identities_spawn_new() {
        let mut tracker = IdentityTracker::default();
        tracker.reconcile(&[det(0.1, 0.1, 0.1, 0.1)], 0.0);
        let t2 = tracker.reconcile(
            &[det(0.1, 0.1, 0.1, 0.1), det(0.7, 0.7, 0.1, 0.1), det(0.7, 0.1, 0.1, 0.1)],
            1.0,
        );
        let ids: HashSet<u32> = t2.iter().map(|t| t.track_id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(tracker.live_count(), 3);
    }

    #[test]
    fn test_zero_detections_emit_nothing_but_keep_identities() {
        let mut tracker = IdentityTracker::new(0.3, 30);
        tracker.reconcile(&[det(0.1, 0.1, 0.1, 0.1)], 0.0);
        assert!(tracker.reconcile(&[], 1.0).is_empty());
        assert_eq!(tracker.live_count(), 1);
    }

    #[test]
    fn test_identity_survives_max_silent_frames() {
        let mut tracker = IdentityTracker::new(0.3, 3);
        let t1 = tracker.reconcile(&[det(0.1, 0.1, 0.1, 0.1)], 0.0);
        for i in 0..3 {
            tracker.reconcile(&[], i as f64);
        }
        let t2 = tracker.reconcile(&[det(0.11, 0.1, 0.1, 0.1)], 10.0);
        assert_eq!(t2[0].track_id, t1[0].track_id);
        // silent calls do not age the identity
        assert_eq!(t2[0].age, 2);
    }

    #[test]
    fn test_identity_expires_after_max_silent_plus_one() {
        let mut tracker = IdentityTracker::new(0.3, 3);
        let t1 = tracker.reconcile(&[det(0.1, 0.1, 0.1, 0.1)], 0.0);
        for i in 0..4 {
            tracker.reconcile(&[], i as f64);
        }
        assert_eq!(tracker.live_count(), 0);

        let t2 = tracker.reconcile(&[det(0.1, 0.1, 0.1, 0.1)], 10.0);
        assert!(t2.iter().all(|t| t.track_id != t1[0].track_id));
        assert_eq!(t2[0].age, 1);
    }

    #[test]
    fn test_default_thirty_silent_frames() {
        let mut tracker = IdentityTracker::default();
        tracker.reconcile(&[det(0.5, 0.5, 0.1, 0.1)], 0.0);
        for i in 0..30 {
            tracker.reconcile(&[], i as f64);
        }
        assert_eq!(tracker.live_count(), 1);
        tracker.reconcile(&[], 31.0);
        assert_eq!(tracker.live_count(), 0);
    }

    #[test]
    fn test_zero_max_silent_drops_on_first_miss() {
        let mut tracker = IdentityTracker::new(0.3, 0);
        tracker.reconcile(&[det(0.5, 0.5, 0.1, 0.1)], 0.0);
        tracker.reconcile(&[], 1.0);
        assert_eq!(tracker.live_count(), 0);
    }

    #[test]
    fn test_new_identity_not_matched_within_same_call() {
        let mut tracker = IdentityTracker::default();
        let tracks = tracker.reconcile(&[det(0.1, 0.1, 0.1, 0.1), det(0.11, 0.1, 0.1, 0.1)], 0.0);
        assert_ne!(tracks[0].track_id, tracks[1].track_id);
    }

    #[test]
    fn test_clear_forgets_identities() {
        let mut tracker = IdentityTracker::default();
        tracker.reconcile(&[det(0.1, 0.1, 0.1, 0.1)], 0.0);
        tracker.clear();
        assert_eq!(tracker.live_count(), 0);
    }
}
