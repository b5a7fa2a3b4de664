//! Movement comparison between two recorded pose sequences.
//!
//! A comparison runs as a pipeline: the subject's skeleton is rescaled
//! to the reference anthropometry, both sequences are reduced to
//! per-frame joint-angle feature vectors, DTW pairs up corresponding
//! movement phases, and the paired frames are scored per joint and
//! rigidly aligned. The caller gets one report with an overall
//! similarity plus the per-joint and per-frame breakdown that produced
//! it.

pub mod dtw;
pub mod procrustes;
pub mod scale;

pub use dtw::DtwResult;
pub use procrustes::ProcrustesResult;
pub use scale::normalize_to;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::goniometer::{Goniometer, GoniometerConfig, Joint};
use crate::math::Vec3;
use crate::pose::PoseFrame;
use crate::schema::PoseSchema;

// ── Errors ──────────────────────────────────────────────────────────

/// Why a comparison could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareError {
    /// The inputs cannot support a meaningful comparison.
    InsufficientData { reason: String },
    /// The caller's cancellation hook fired mid-pipeline.
    Cancelled,
}

impl fmt::Display for CompareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareError::InsufficientData { reason } => {
                write!(f, "insufficient data: {reason}")
            }
            CompareError::Cancelled => write!(f, "comparison cancelled"),
        }
    }
}

impl std::error::Error for CompareError {}

// ── Configuration ───────────────────────────────────────────────────

/// Comparison tuning.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    /// Hard cap on either sequence length before DTW; the cost matrix
    /// is quadratic.
    pub dtw_max_len: usize,
    /// Angle difference that maps to zero similarity for a joint.
    pub max_angle_diff_deg: f64,
    /// Frames whose similarity falls below this are flagged.
    pub flag_threshold: f64,
    /// Let the rigid alignment absorb a residual uniform scale.
    pub with_scale: bool,
    /// Normalized DTW cost (degrees) at which temporal similarity
    /// halves.
    pub temporal_cost_scale_deg: f64,
    /// Weight of the joint-angle term in the overall score; the
    /// remainder goes to the temporal term.
    pub joint_weight: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        ComparisonConfig {
            dtw_max_len: 2000,
            max_angle_diff_deg: 45.0,
            flag_threshold: 0.6,
            with_scale: true,
            temporal_cost_scale_deg: 30.0,
            joint_weight: 0.7,
        }
    }
}

// ── Report ──────────────────────────────────────────────────────────

/// Per-joint score over the whole aligned comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointComparison {
    pub joint: String,
    pub mean_abs_diff_deg: f64,
    pub similarity: f64,
}

/// Score for one aligned frame pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameComparison {
    pub reference_index: usize,
    pub subject_index: usize,
    pub similarity: f64,
    pub worst_joint: String,
    pub worst_diff_deg: f64,
}

/// Rigid-alignment residuals averaged over the aligned pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentSummary {
    pub mean_disparity: f64,
    pub mean_scale: f64,
    pub mean_rotation_deg: f64,
}

/// Everything the pipeline produced for one reference/subject pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Weighted blend of joint and temporal similarity, in [0,1].
    pub overall_similarity: f64,
    pub temporal_similarity: f64,
    pub dtw_normalized_cost: f64,
    pub per_joint: Vec<JointComparison>,
    pub per_frame: Vec<FrameComparison>,
    /// Subject frame indices where the movement deviates enough to
    /// show a clinician.
    pub flagged_frames: Vec<usize>,
    pub alignment: AlignmentSummary,
}

// ── Comparator ──────────────────────────────────────────────────────

/// Compares two recordings of the same movement on one schema.
///
/// Holds its own angle engine with smoothing disabled, so comparisons
/// see raw per-frame angles and never mutate a live session's filter
/// state.
#[derive(Debug)]
pub struct MovementComparator {
    goniometer: Goniometer,
    config: ComparisonConfig,
}

impl MovementComparator {
    pub fn new(schema: Arc<PoseSchema>) -> Self {
        MovementComparator::with_config(schema, ComparisonConfig::default())
    }

    pub fn with_config(schema: Arc<PoseSchema>, config: ComparisonConfig) -> Self {
        let mut gonio_config = GoniometerConfig::for_schema(&schema);
        gonio_config.smoothing_enabled = false;
        MovementComparator {
            goniometer: Goniometer::with_config(schema, gonio_config),
            config,
        }
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ComparisonConfig {
        &mut self.config
    }

    /// Compare `subject` against `reference`.
    ///
    /// `should_cancel` is polled between frames and once per DTW row;
    /// when it returns true the pipeline stops with
    /// [`CompareError::Cancelled`].
    pub fn compare(
        &mut self,
        reference: &[PoseFrame],
        subject: &[PoseFrame],
        should_cancel: &dyn Fn() -> bool,
    ) -> Result<ComparisonReport, CompareError> {
        if reference.len() < 3 || subject.len() < 3 {
            return Err(CompareError::InsufficientData {
                reason: format!(
                    "recordings of {} and {} frames, need at least 3 each",
                    reference.len(),
                    subject.len()
                ),
            });
        }
        let schema_id = &self.goniometer.schema().id;
        for frame in reference.iter().chain(subject.iter()) {
            if frame.schema_id != *schema_id {
                return Err(CompareError::InsufficientData {
                    reason: format!(
                        "frame uses schema {} but the comparator is built for {schema_id}",
                        frame.schema_id
                    ),
                });
            }
        }

        let joints = self.goniometer.measurable_joints();
        if joints.is_empty() {
            return Err(CompareError::InsufficientData {
                reason: format!("schema {schema_id} cannot express any supported joint"),
            });
        }

        info!(
            reference_frames = reference.len(),
            subject_frames = subject.len(),
            joints = joints.len(),
            "comparing recordings"
        );

        let mut normalized = Vec::with_capacity(subject.len());
        for frame in subject {
            if should_cancel() {
                return Err(CompareError::Cancelled);
            }
            normalized.push(scale::normalize_to(&reference[0], frame)?);
        }

        let ref_features = self.angle_features(reference, &joints, should_cancel)?;
        let subj_features = self.angle_features(&normalized, &joints, should_cancel)?;

        let warp = dtw::align(
            &ref_features,
            &subj_features,
            self.config.dtw_max_len,
            should_cancel,
        )?;
        let temporal_similarity =
            1.0 / (1.0 + warp.normalized_cost / self.config.temporal_cost_scale_deg);

        let max_diff = self.config.max_angle_diff_deg;
        let per_joint: Vec<JointComparison> = joints
            .iter()
            .enumerate()
            .map(|(k, joint)| {
                let mean_abs_diff_deg = warp
                    .path
                    .iter()
                    .map(|&(i, j)| (ref_features[i][k] - subj_features[j][k]).abs())
                    .sum::<f64>()
                    / warp.path.len() as f64;
                JointComparison {
                    joint: joint.name().to_string(),
                    similarity: (1.0 - mean_abs_diff_deg / max_diff).clamp(0.0, 1.0),
                    mean_abs_diff_deg,
                }
            })
            .collect();

        let mut per_frame = Vec::with_capacity(warp.path.len());
        let mut flagged_frames = Vec::new();
        for &(i, j) in &warp.path {
            let mut sim_sum = 0.0;
            let mut worst_k = 0;
            let mut worst_diff = 0.0;
            for k in 0..joints.len() {
                let diff = (ref_features[i][k] - subj_features[j][k]).abs();
                sim_sum += (1.0 - diff / max_diff).clamp(0.0, 1.0);
                if diff > worst_diff {
                    worst_diff = diff;
                    worst_k = k;
                }
            }
            let similarity = sim_sum / joints.len() as f64;
            let deviates = similarity < self.config.flag_threshold || worst_diff > max_diff;
            if deviates && flagged_frames.last() != Some(&j) {
                flagged_frames.push(j);
            }
            per_frame.push(FrameComparison {
                reference_index: i,
                subject_index: j,
                similarity,
                worst_joint: joints[worst_k].name().to_string(),
                worst_diff_deg: worst_diff,
            });
        }

        let alignment = self.rigid_alignment(reference, &normalized, &warp.path, should_cancel)?;

        let joint_similarity =
            per_joint.iter().map(|j| j.similarity).sum::<f64>() / per_joint.len() as f64;
        let w = self.config.joint_weight.clamp(0.0, 1.0);
        let overall_similarity = w * joint_similarity + (1.0 - w) * temporal_similarity;

        info!(
            overall = format!("{overall_similarity:.3}"),
            temporal = format!("{temporal_similarity:.3}"),
            flagged = flagged_frames.len(),
            "comparison complete"
        );

        Ok(ComparisonReport {
            overall_similarity,
            temporal_similarity,
            dtw_normalized_cost: warp.normalized_cost,
            per_joint,
            per_frame,
            flagged_frames,
            alignment,
        })
    }

    /// Per-frame angle vector over `joints`, fixed dimension.
    ///
    /// A joint that fails on one frame keeps its previous value (zero
    /// before the first success) so the feature dimension never
    /// changes mid-sequence.
    fn angle_features(
        &mut self,
        frames: &[PoseFrame],
        joints: &[Joint],
        should_cancel: &dyn Fn() -> bool,
    ) -> Result<Vec<Vec<f64>>, CompareError> {
        let mut features = Vec::with_capacity(frames.len());
        let mut last = vec![0.0; joints.len()];
        for frame in frames {
            if should_cancel() {
                return Err(CompareError::Cancelled);
            }
            for (k, joint) in joints.iter().enumerate() {
                match self.goniometer.joint_angle(frame, *joint) {
                    Ok(m) if m.valid => last[k] = m.angle_deg,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(joint = joint.name(), error = %e, "carrying previous angle");
                    }
                }
            }
            features.push(last.clone());
        }
        Ok(features)
    }

    fn rigid_alignment(
        &self,
        reference: &[PoseFrame],
        normalized: &[PoseFrame],
        path: &[(usize, usize)],
        should_cancel: &dyn Fn() -> bool,
    ) -> Result<AlignmentSummary, CompareError> {
        let positions = |frame: &PoseFrame| -> Vec<Vec3> {
            frame.landmarks.iter().map(|l| l.position).collect()
        };
        let mut disparity = 0.0;
        let mut scale = 0.0;
        let mut rotation = 0.0;
        let mut count = 0usize;
        for &(i, j) in path {
            if should_cancel() {
                return Err(CompareError::Cancelled);
            }
            let src = positions(&normalized[j]);
            let tgt = positions(&reference[i]);
            match procrustes::align(&src, &tgt, self.config.with_scale) {
                Ok(r) => {
                    disparity += r.disparity;
                    scale += r.scale;
                    rotation += r.rotation_angle_deg();
                    count += 1;
                }
                Err(e) => {
                    debug!(reference_index = i, subject_index = j, error = %e, "skipping pair in rigid alignment");
                }
            }
        }
        if count == 0 {
            return Err(CompareError::InsufficientData {
                reason: "rigid alignment failed on every aligned pair".to_string(),
            });
        }
        let n = count as f64;
        Ok(AlignmentSummary {
            mean_disparity: disparity / n,
            mean_scale: scale / n,
            mean_rotation_deg: rotation / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Side;
    use crate::schema::{mediapipe_33, movenet_17};
    use crate::test_utils::{arm_raise_sequence, scaled, standing_frame_movenet};

    fn never() -> impl Fn() -> bool {
        || false
    }

    fn comparator() -> MovementComparator {
        MovementComparator::new(Arc::new(mediapipe_33()))
    }

    #[test]
    fn self_comparison_is_near_perfect() {
        let seq = arm_raise_sequence(Side::Left, 20, 30.0, 90.0);
        let mut c = comparator();
        let report = c.compare(&seq, &seq, &never()).unwrap();
        assert!(
            report.overall_similarity > 0.99,
            "overall {}",
            report.overall_similarity
        );
        assert!(report.temporal_similarity > 0.99);
        assert!(report.flagged_frames.is_empty());
        assert!(report.per_frame.iter().all(|f| f.similarity > 0.99));
        assert!(
            report.alignment.mean_disparity < 0.01,
            "disparity {}",
            report.alignment.mean_disparity
        );
    }

    #[test]
    fn zoomed_subject_scores_like_the_reference() {
        let reference = arm_raise_sequence(Side::Left, 20, 30.0, 90.0);
        let subject: Vec<_> = reference.iter().map(|f| scaled(f, 1.6)).collect();
        let mut c = comparator();
        let report = c.compare(&reference, &subject, &never()).unwrap();
        assert!(
            report.overall_similarity > 0.95,
            "overall {}",
            report.overall_similarity
        );
        // scale was removed before alignment, so none should remain
        assert!(
            (report.alignment.mean_scale - 1.0).abs() < 0.05,
            "residual scale {}",
            report.alignment.mean_scale
        );
    }

    #[test]
    fn tempo_difference_still_matches_phases() {
        let reference = arm_raise_sequence(Side::Left, 20, 30.0, 120.0);
        let subject = arm_raise_sequence(Side::Left, 40, 30.0, 120.0);
        let mut c = comparator();
        let report = c.compare(&reference, &subject, &never()).unwrap();
        assert!(
            report.overall_similarity > 0.9,
            "overall {}",
            report.overall_similarity
        );
    }

    #[test]
    fn reduced_range_of_motion_is_flagged() {
        let reference = arm_raise_sequence(Side::Left, 20, 30.0, 150.0);
        let subject = arm_raise_sequence(Side::Left, 20, 30.0, 60.0);
        let mut c = comparator();
        let full = c
            .compare(&reference, &reference, &never())
            .unwrap()
            .overall_similarity;
        let report = c.compare(&reference, &subject, &never()).unwrap();
        assert!(report.overall_similarity < full);
        assert!(
            !report.flagged_frames.is_empty(),
            "no frames flagged despite a 90 degree deficit"
        );
        let abduction = report
            .per_joint
            .iter()
            .find(|j| j.joint == "left_shoulder_abduction")
            .unwrap();
        assert!(
            abduction.mean_abs_diff_deg > 10.0,
            "mean diff {}",
            abduction.mean_abs_diff_deg
        );
        assert!(abduction.similarity < 0.9);
    }

    #[test]
    fn short_recording_is_an_error() {
        let reference = arm_raise_sequence(Side::Left, 20, 30.0, 90.0);
        let subject = arm_raise_sequence(Side::Left, 2, 30.0, 90.0);
        let mut c = comparator();
        assert!(matches!(
            c.compare(&reference, &subject, &never()),
            Err(CompareError::InsufficientData { .. })
        ));
    }

    #[test]
    fn schema_mismatch_is_an_error() {
        let reference = arm_raise_sequence(Side::Left, 5, 30.0, 90.0);
        let subject = vec![
            standing_frame_movenet(0.0),
            standing_frame_movenet(0.033),
            standing_frame_movenet(0.066),
        ];
        let mut c = comparator();
        assert!(matches!(
            c.compare(&reference, &subject, &never()),
            Err(CompareError::InsufficientData { .. })
        ));
    }

    #[test]
    fn cancellation_stops_the_pipeline() {
        let seq = arm_raise_sequence(Side::Left, 20, 30.0, 90.0);
        let mut c = comparator();
        assert!(matches!(
            c.compare(&seq, &seq, &|| true),
            Err(CompareError::Cancelled)
        ));
    }

    #[test]
    fn report_round_trips_through_json() {
        let seq = arm_raise_sequence(Side::Left, 10, 30.0, 90.0);
        let mut c = comparator();
        let report = c.compare(&seq, &seq, &never()).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let back: ComparisonReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.per_frame.len(), report.per_frame.len());
        assert!((back.overall_similarity - report.overall_similarity).abs() < 1e-12);
    }

    #[test]
    fn movenet_comparator_uses_its_own_joint_set() {
        let mut c = MovementComparator::new(Arc::new(movenet_17()));
        let seq = vec![
            standing_frame_movenet(0.0),
            standing_frame_movenet(0.033),
            standing_frame_movenet(0.066),
            standing_frame_movenet(0.1),
        ];
        let report = c.compare(&seq, &seq, &never()).unwrap();
        assert_eq!(report.per_joint.len(), Joint::ALL.len());
        assert!(report.overall_similarity > 0.99);
    }
}
