//! Two-round greedy IoU association of detections to tracks.
//!
//! Each frame every track is advanced with its motion estimator, then:
//! 1. tracks are matched against high-confidence detections,
//! 2. tracks still unmatched are matched against low-confidence detections.
//!
//! Matching repeatedly takes the single best-IoU pair among the remaining
//! tracks and detections and stops when the best pair falls below the match
//! threshold. Only unmatched high-confidence detections start new tracks.

use tracing::{debug, trace};

use crowd_models::{BoundingBox, Detection, Point};

use crate::config::TrackerConfig;
use crate::motion::MotionEstimator;

/// An identity-bearing track owned by one associator.
#[derive(Debug, Clone)]
pub struct Track {
    id: u64,
    motion: MotionEstimator,
    bbox: BoundingBox,
    score: f32,
    age: u32,
    missed: u32,
}

impl Track {
    fn new(id: u64, detection: &Detection) -> Self {
        Self {
            id,
            motion: MotionEstimator::initiate(&detection.bbox),
            bbox: detection.bbox,
            score: detection.score,
            age: 1,
            missed: 0,
        }
    }

    fn apply_match(&mut self, detection: &Detection) {
        self.motion.update(&detection.bbox);
        self.bbox = detection.bbox;
        self.score = detection.score;
        self.age += 1;
        self.missed = 0;
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Last observed box.
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Box predicted by the motion estimator.
    pub fn predicted_bbox(&self) -> BoundingBox {
        self.motion.bbox()
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    /// Frames since creation, counting every match.
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Consecutive frames without a matching detection.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn motion(&self) -> &MotionEstimator {
        &self.motion
    }

    pub fn is_visible(&self) -> bool {
        self.missed == 0
    }

    fn visible(&self) -> VisibleTrack {
        VisibleTrack {
            id: self.id,
            bbox: self.bbox,
            centroid: self.bbox.centroid(),
            score: self.score,
        }
    }
}

/// A track matched in the current frame, as reported to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleTrack {
    pub id: u64,
    pub bbox: BoundingBox,
    pub centroid: Point,
    pub score: f32,
}

/// Result of one greedy matching pass, as indices into its inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matching {
    /// `(track index, detection index)` in acceptance order
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Greedy IoU matching.
///
/// Repeatedly accepts the highest-IoU pair among unmatched entries while it
/// reaches `threshold`. Ties keep the first pair found scanning tracks then
/// detections in order. Pairs with zero overlap never match.
pub fn greedy_iou_match(tracks: &[BoundingBox], detections: &[BoundingBox], threshold: f64) -> Matching {
    let mut track_used = vec![false; tracks.len()];
    let mut det_used = vec![false; detections.len()];
    let mut matches = Vec::new();

    loop {
        let mut best: Option<(f64, usize, usize)> = None;
        for (ti, track) in tracks.iter().enumerate() {
            if track_used[ti] {
                continue;
            }
            for (di, det) in detections.iter().enumerate() {
                if det_used[di] {
                    continue;
                }
                let iou = track.iou(det);
                if iou > best.map_or(0.0, |(b, _, _)| b) {
                    best = Some((iou, ti, di));
                }
            }
        }

        match best {
            Some((iou, ti, di)) if iou >= threshold => {
                track_used[ti] = true;
                det_used[di] = true;
                matches.push((ti, di));
            }
            _ => break,
        }
    }

    Matching {
        matches,
        unmatched_tracks: (0..tracks.len()).filter(|&i| !track_used[i]).collect(),
        unmatched_detections: (0..detections.len()).filter(|&i| !det_used[i]).collect(),
    }
}

/// What changed in one association step.
#[derive(Debug, Clone, Default)]
pub struct AssociationOutcome {
    /// Tracks matched this frame, in track-set order
    pub visible: Vec<VisibleTrack>,
    /// Ids of tracks created this frame
    pub created: Vec<u64>,
    /// Ids of tracks dropped after exceeding the buffer
    pub removed: Vec<u64>,
}

/// Track set plus the id counter of one area.
#[derive(Debug, Clone)]
pub struct Associator {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl Associator {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Every retained track, visible or not, in creation order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Id the next new track will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Run one frame of association.
    pub fn update(&mut self, detections: &[Detection]) -> AssociationOutcome {
        for track in &mut self.tracks {
            track.motion.predict();
        }

        let (high, low): (Vec<&Detection>, Vec<&Detection>) = detections
            .iter()
            .partition(|d| d.score >= self.config.track_thresh);

        let predicted: Vec<BoundingBox> = self.tracks.iter().map(Track::predicted_bbox).collect();

        // Round 1: every track against high-confidence detections
        let high_boxes: Vec<BoundingBox> = high.iter().map(|d| d.bbox).collect();
        let first = greedy_iou_match(&predicted, &high_boxes, self.config.match_thresh);
        for &(ti, di) in &first.matches {
            self.tracks[ti].apply_match(high[di]);
        }

        // Round 2: leftovers against low-confidence detections
        let remaining_boxes: Vec<BoundingBox> =
            first.unmatched_tracks.iter().map(|&ti| predicted[ti]).collect();
        let low_boxes: Vec<BoundingBox> = low.iter().map(|d| d.bbox).collect();
        let second = greedy_iou_match(&remaining_boxes, &low_boxes, self.config.match_thresh);
        for &(ri, di) in &second.matches {
            self.tracks[first.unmatched_tracks[ri]].apply_match(low[di]);
        }
        for &ri in &second.unmatched_tracks {
            self.tracks[first.unmatched_tracks[ri]].missed += 1;
        }

        trace!(
            high = high.len(),
            low = low.len(),
            first_round = first.matches.len(),
            second_round = second.matches.len(),
            "Associated detections"
        );

        let mut created = Vec::with_capacity(first.unmatched_detections.len());
        for &di in &first.unmatched_detections {
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.push(Track::new(id, high[di]));
            created.push(id);
        }

        let buffer = self.config.track_buffer;
        let mut removed = Vec::new();
        self.tracks.retain(|t| {
            if t.missed >= buffer {
                removed.push(t.id);
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            debug!(removed = ?removed, "Dropped lost tracks");
        }

        AssociationOutcome {
            visible: self
                .tracks
                .iter()
                .filter(|t| t.is_visible())
                .map(Track::visible)
                .collect(),
            created,
            removed,
        }
    }
}
