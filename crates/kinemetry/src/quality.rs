//! Aggregate measurement quality for one analyzed frame.

use serde::{Deserialize, Serialize};

use crate::compensation::{CompensationPattern, Severity};
use crate::math::Vec3;
use crate::pose::PoseFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBucket {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityBucket {
    fn demote(self) -> QualityBucket {
        match self {
            QualityBucket::Excellent => QualityBucket::Good,
            QualityBucket::Good => QualityBucket::Fair,
            QualityBucket::Fair | QualityBucket::Poor => QualityBucket::Poor,
        }
    }
}

/// Quality metrics attached to every frame analysis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeasurementQuality {
    /// 0 for 2D schemas; mean visibility otherwise.
    pub depth_reliability: f64,
    /// Mean landmark visibility in [0,1].
    pub landmark_visibility: f64,
    /// 1 minus normalized inter-frame landmark displacement; 1 on the
    /// first frame of a session.
    pub frame_stability: f64,
    pub bucket: QualityBucket,
}

/// Stateful scorer; remembers the previous frame's landmark positions
/// for the stability term.
#[derive(Debug, Default)]
pub struct QualityScorer {
    prev_positions: Option<Vec<Vec3>>,
}

/// Displacement per frame (in trunk-length-normalized units) that
/// drives stability to zero.
const STABILITY_FULL_SCALE: f64 = 0.25;

impl QualityScorer {
    pub fn new() -> Self {
        QualityScorer::default()
    }

    pub fn score(
        &mut self,
        frame: &PoseFrame,
        compensations: &[CompensationPattern],
    ) -> MeasurementQuality {
        let landmark_visibility = frame.mean_visibility();
        let depth_reliability = if frame.has_depth {
            landmark_visibility
        } else {
            0.0
        };
        let frame_stability = self.stability(frame);

        let composite =
            0.5 * landmark_visibility + 0.3 * frame_stability + 0.2 * depth_reliability;
        let mut bucket = if composite >= 0.85 {
            QualityBucket::Excellent
        } else if composite >= 0.65 {
            QualityBucket::Good
        } else if composite >= 0.45 {
            QualityBucket::Fair
        } else {
            QualityBucket::Poor
        };

        for c in compensations {
            match c.severity {
                Severity::Severe => bucket = bucket.demote().demote(),
                Severity::Moderate => bucket = bucket.demote(),
                _ => {}
            }
        }

        MeasurementQuality {
            depth_reliability,
            landmark_visibility,
            frame_stability,
            bucket,
        }
    }

    fn stability(&mut self, frame: &PoseFrame) -> f64 {
        let positions: Vec<Vec3> = frame.landmarks.iter().map(|l| l.position).collect();
        let stability = match &self.prev_positions {
            Some(prev) if prev.len() == positions.len() && !positions.is_empty() => {
                let scale = body_scale(frame).max(1e-9);
                let mean_disp = positions
                    .iter()
                    .zip(prev.iter())
                    .map(|(a, b)| a.sub(b).magnitude())
                    .sum::<f64>()
                    / positions.len() as f64;
                (1.0 - (mean_disp / scale) / STABILITY_FULL_SCALE).clamp(0.0, 1.0)
            }
            _ => 1.0,
        };
        self.prev_positions = Some(positions);
        stability
    }

    pub fn reset(&mut self) {
        self.prev_positions = None;
    }
}

/// Trunk length when the trunk landmarks are present, otherwise the
/// bounding-box diagonal.
fn body_scale(frame: &PoseFrame) -> f64 {
    let get = |name: &str| frame.landmark(name).map(|l| l.position);
    if let (Some(lsh), Some(rsh), Some(lhip), Some(rhip)) = (
        get("left_shoulder"),
        get("right_shoulder"),
        get("left_hip"),
        get("right_hip"),
    ) {
        let len = lsh.midpoint(&rsh).sub(&lhip.midpoint(&rhip)).magnitude();
        if len > 1e-9 {
            return len;
        }
    }
    let xs: Vec<f64> = frame.landmarks.iter().map(|l| l.position.x).collect();
    let ys: Vec<f64> = frame.landmarks.iter().map(|l| l.position.y).collect();
    let span = |v: &[f64]| {
        v.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            - v.iter().cloned().fold(f64::INFINITY, f64::min)
    };
    (span(&xs).powi(2) + span(&ys).powi(2)).sqrt().max(1e-9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compensation::CompensationType;
    use crate::test_utils::standing_frame;

    fn pattern(severity: Severity) -> CompensationPattern {
        CompensationPattern {
            kind: CompensationType::TrunkLean,
            severity,
            magnitude: 15.0,
            affected_joint: None,
            note: None,
        }
    }

    #[test]
    fn clean_steady_frame_scores_excellent() {
        let mut scorer = QualityScorer::new();
        scorer.score(&standing_frame(0.0), &[]);
        let q = scorer.score(&standing_frame(0.033), &[]);
        assert_eq!(q.bucket, QualityBucket::Excellent);
        assert!((q.frame_stability - 1.0).abs() < 1e-9);
    }

    #[test]
    fn depth_reliability_zero_without_depth() {
        let mut scorer = QualityScorer::new();
        let mut frame = standing_frame(0.0);
        frame.has_depth = false;
        let q = scorer.score(&frame, &[]);
        assert_eq!(q.depth_reliability, 0.0);
    }

    #[test]
    fn jitter_lowers_stability() {
        let mut scorer = QualityScorer::new();
        scorer.score(&standing_frame(0.0), &[]);
        let mut jittery = standing_frame(0.033);
        for (i, lm) in jittery.landmarks.iter_mut().enumerate() {
            lm.position.x += if i % 2 == 0 { 0.05 } else { -0.05 };
        }
        let q = scorer.score(&jittery, &[]);
        assert!(q.frame_stability < 0.7, "stability {}", q.frame_stability);
    }

    #[test]
    fn moderate_compensation_demotes_one_bucket() {
        let mut scorer = QualityScorer::new();
        scorer.score(&standing_frame(0.0), &[]);
        let q = scorer.score(&standing_frame(0.033), &[pattern(Severity::Moderate)]);
        assert_eq!(q.bucket, QualityBucket::Good);
    }

    #[test]
    fn severe_compensation_demotes_two_buckets() {
        let mut scorer = QualityScorer::new();
        scorer.score(&standing_frame(0.0), &[]);
        let q = scorer.score(&standing_frame(0.033), &[pattern(Severity::Severe)]);
        assert_eq!(q.bucket, QualityBucket::Fair);
    }

    #[test]
    fn minimal_compensation_does_not_demote() {
        let mut scorer = QualityScorer::new();
        scorer.score(&standing_frame(0.0), &[]);
        let q = scorer.score(&standing_frame(0.033), &[pattern(Severity::Minimal)]);
        assert_eq!(q.bucket, QualityBucket::Excellent);
    }

    #[test]
    fn reset_forgets_previous_positions() {
        let mut scorer = QualityScorer::new();
        scorer.score(&standing_frame(0.0), &[]);
        scorer.reset();
        let mut moved = standing_frame(1.0);
        for lm in &mut moved.landmarks {
            lm.position.x += 0.3;
        }
        let q = scorer.score(&moved, &[]);
        assert_eq!(q.frame_stability, 1.0);
    }
}
