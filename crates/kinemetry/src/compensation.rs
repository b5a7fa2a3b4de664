//! Compensation pattern detection.
//!
//! Patients recruit neighboring segments when a movement is hard:
//! leaning the trunk to gain apparent shoulder range, hiking the
//! shoulder girdle, bending the elbow during a raise. Each detector
//! here watches one such pattern. Thresholds are degrees or fractions
//! of trunk length, never pixels, so they survive camera zoom.
//!
//! Detectors run independently; a landmark the schema cannot resolve
//! silently disables only the detectors that need it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::math::Vec3;
use crate::pose::{PoseFrame, Side};
use crate::schema::PoseSchema;

// ── Pattern vocabulary ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationType {
    TrunkLean,
    TrunkRotation,
    ShoulderHiking,
    ElbowFlexion,
    HipHike,
    ContralateralLean,
}

/// Graded by how far past the detection threshold the magnitude is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minimal,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Bucket a magnitude:threshold ratio. Callers only grade
    /// magnitudes at or past the threshold, so the ratio is >= 1.
    pub fn from_ratio(ratio: f64) -> Severity {
        if ratio < 1.2 {
            Severity::Minimal
        } else if ratio < 1.5 {
            Severity::Mild
        } else if ratio < 2.0 {
            Severity::Moderate
        } else {
            Severity::Severe
        }
    }
}

/// One detected compensation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationPattern {
    pub kind: CompensationType,
    pub severity: Severity,
    /// Degrees, or a trunk-length fraction for shoulder hiking.
    pub magnitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_joint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The movement being performed, which decides which detectors are
/// relevant (elbow flexion is a compensation during a lateral raise,
/// the whole point during a curl).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    ShoulderElevation,
    ElbowFlexion,
    HipAbduction,
    Squat,
    General,
}

// ── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct CompensationConfig {
    pub trunk_lean_threshold_deg: f64,
    pub trunk_rotation_threshold_deg: f64,
    /// Fraction of trunk length.
    pub shoulder_hiking_threshold: f64,
    /// An elbow straighter than this is not a compensation.
    pub elbow_straight_deg: f64,
    /// Degrees of elbow bend past straight that count as one
    /// threshold unit.
    pub elbow_band_deg: f64,
    pub hip_hike_threshold_deg: f64,
    pub contralateral_lean_threshold_deg: f64,
}

impl Default for CompensationConfig {
    fn default() -> Self {
        CompensationConfig {
            trunk_lean_threshold_deg: 10.0,
            trunk_rotation_threshold_deg: 15.0,
            shoulder_hiking_threshold: 0.05,
            elbow_straight_deg: 160.0,
            elbow_band_deg: 20.0,
            hip_hike_threshold_deg: 8.0,
            contralateral_lean_threshold_deg: 10.0,
        }
    }
}

// ── Detector ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CompensationDetector {
    schema: Arc<PoseSchema>,
    config: CompensationConfig,
}

const VERTICAL: Vec3 = Vec3 {
    x: 0.0,
    y: 1.0,
    z: 0.0,
};

impl CompensationDetector {
    pub fn new(schema: Arc<PoseSchema>) -> Self {
        Self::with_config(schema, CompensationConfig::default())
    }

    pub fn with_config(schema: Arc<PoseSchema>, config: CompensationConfig) -> Self {
        CompensationDetector { schema, config }
    }

    pub fn config(&self) -> &CompensationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CompensationConfig {
        &mut self.config
    }

    /// Run every detector relevant to `movement` against one frame.
    ///
    /// `secondary_angles` carries already-measured joint angles by
    /// name (the elbow detector reads the measured-side elbow from
    /// it). `previous` enables the temporal trunk-rotation detector.
    pub fn detect(
        &self,
        frame: &PoseFrame,
        side: Side,
        movement: MovementKind,
        secondary_angles: &HashMap<String, f64>,
        previous: Option<&PoseFrame>,
    ) -> Vec<CompensationPattern> {
        let mut patterns = Vec::new();

        if let Some(p) = self.trunk_lean(frame) {
            patterns.push(p);
        }
        if let Some(prev) = previous {
            if let Some(p) = self.trunk_rotation(frame, prev) {
                patterns.push(p);
            }
        }
        if movement == MovementKind::ShoulderElevation {
            if let Some(p) = self.shoulder_hiking(frame, side) {
                patterns.push(p);
            }
            if let Some(p) = self.elbow_flexion(side, secondary_angles) {
                patterns.push(p);
            }
        }
        if matches!(movement, MovementKind::HipAbduction | MovementKind::Squat) {
            if let Some(p) = self.hip_hike(frame) {
                patterns.push(p);
            }
        }
        if movement == MovementKind::HipAbduction {
            if let Some(p) = self.contralateral_lean(frame, side) {
                patterns.push(p);
            }
        }
        patterns
    }

    // ── individual detectors ────────────────────────────────────

    fn trunk_axis(&self, frame: &PoseFrame) -> Option<Vec3> {
        let lsh = self.pos(frame, "left_shoulder")?;
        let rsh = self.pos(frame, "right_shoulder")?;
        let lhip = self.pos(frame, "left_hip")?;
        let rhip = self.pos(frame, "right_hip")?;
        let axis = lsh.midpoint(&rsh).sub(&lhip.midpoint(&rhip));
        (axis.magnitude() > 1e-9).then_some(axis)
    }

    fn trunk_lean(&self, frame: &PoseFrame) -> Option<CompensationPattern> {
        let axis = self.trunk_axis(frame)?;
        let lean = axis.angle_between_deg(&VERTICAL);
        let threshold = self.config.trunk_lean_threshold_deg;
        if lean < threshold {
            return None;
        }
        Some(CompensationPattern {
            kind: CompensationType::TrunkLean,
            severity: Severity::from_ratio(lean / threshold),
            magnitude: lean,
            affected_joint: None,
            note: Some("trunk tilted from vertical".to_string()),
        })
    }

    fn trunk_rotation(
        &self,
        frame: &PoseFrame,
        previous: &PoseFrame,
    ) -> Option<CompensationPattern> {
        let cur = self.shoulder_line(frame)?.project_onto_plane(&VERTICAL);
        let prev = self.shoulder_line(previous)?.project_onto_plane(&VERTICAL);
        if cur.magnitude() == 0.0 || prev.magnitude() == 0.0 {
            return None;
        }
        let delta = cur.angle_between_deg(&prev);
        let threshold = self.config.trunk_rotation_threshold_deg;
        if delta < threshold {
            return None;
        }
        Some(CompensationPattern {
            kind: CompensationType::TrunkRotation,
            severity: Severity::from_ratio(delta / threshold),
            magnitude: delta,
            affected_joint: None,
            note: Some("shoulder line rotated between frames".to_string()),
        })
    }

    fn shoulder_hiking(&self, frame: &PoseFrame, side: Side) -> Option<CompensationPattern> {
        let prefix = side.prefix();
        let shoulder = self.pos(frame, &format!("{prefix}_shoulder"))?;
        let contra = self.pos(frame, &format!("{}_shoulder", side.opposite().prefix()))?;
        let trunk_len = self.trunk_axis(frame)?.magnitude();
        if trunk_len < 1e-9 {
            return None;
        }
        let rise = (shoulder.y - contra.y) / trunk_len;
        let threshold = self.config.shoulder_hiking_threshold;
        if rise < threshold {
            return None;
        }
        Some(CompensationPattern {
            kind: CompensationType::ShoulderHiking,
            severity: Severity::from_ratio(rise / threshold),
            magnitude: rise,
            affected_joint: Some(format!("{prefix}_shoulder_abduction")),
            note: Some("shoulder girdle elevated toward the ear".to_string()),
        })
    }

    fn elbow_flexion(
        &self,
        side: Side,
        secondary_angles: &HashMap<String, f64>,
    ) -> Option<CompensationPattern> {
        let joint = format!("{}_elbow_flexion", side.prefix());
        let angle = *secondary_angles.get(&joint)?;
        let straight = self.config.elbow_straight_deg;
        if angle >= straight {
            return None;
        }
        let bend = straight - angle;
        Some(CompensationPattern {
            kind: CompensationType::ElbowFlexion,
            severity: Severity::from_ratio(bend / self.config.elbow_band_deg),
            magnitude: bend,
            affected_joint: Some(joint),
            note: Some("elbow bent during a straight-arm movement".to_string()),
        })
    }

    fn hip_hike(&self, frame: &PoseFrame) -> Option<CompensationPattern> {
        let lhip = self.pos(frame, "left_hip")?;
        let rhip = self.pos(frame, "right_hip")?;
        let line = rhip.sub(&lhip);
        if line.magnitude() < 1e-9 {
            return None;
        }
        // tilt of the inter-hip line out of the horizontal plane
        let tilt = 90.0 - line.angle_between_deg(&VERTICAL);
        let tilt = tilt.abs();
        let threshold = self.config.hip_hike_threshold_deg;
        if tilt < threshold {
            return None;
        }
        Some(CompensationPattern {
            kind: CompensationType::HipHike,
            severity: Severity::from_ratio(tilt / threshold),
            magnitude: tilt,
            affected_joint: None,
            note: Some("pelvis tilted out of horizontal".to_string()),
        })
    }

    fn contralateral_lean(&self, frame: &PoseFrame, side: Side) -> Option<CompensationPattern> {
        let axis = self.trunk_axis(frame)?;
        let lean = axis.angle_between_deg(&VERTICAL);
        let threshold = self.config.contralateral_lean_threshold_deg;
        if lean < threshold {
            return None;
        }
        let hip = self.pos(frame, &format!("{}_hip", side.prefix()))?;
        let contra_hip = self.pos(frame, &format!("{}_hip", side.opposite().prefix()))?;
        let toward_contra = contra_hip.sub(&hip);
        // only a lean away from the working side is the compensation
        if axis.dot(&toward_contra) <= 0.0 {
            return None;
        }
        Some(CompensationPattern {
            kind: CompensationType::ContralateralLean,
            severity: Severity::from_ratio(lean / threshold),
            magnitude: lean,
            affected_joint: Some(format!("{}_hip_abduction", side.prefix())),
            note: Some("trunk leaned away from the working side".to_string()),
        })
    }

    fn shoulder_line(&self, frame: &PoseFrame) -> Option<Vec3> {
        let lsh = self.pos(frame, "left_shoulder")?;
        let rsh = self.pos(frame, "right_shoulder")?;
        let line = rsh.sub(&lsh);
        (line.magnitude() > 1e-9).then_some(line)
    }

    fn pos(&self, frame: &PoseFrame, name: &str) -> Option<Vec3> {
        match self.schema.landmark_index(name) {
            Ok(idx) => frame.landmarks.get(idx).map(|l| l.position),
            Err(_) => {
                debug!(landmark = name, schema = %self.schema.id, "landmark unavailable, detector disabled");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::mediapipe_33;
    use crate::test_utils::{leaning_frame, standing_frame};

    fn detector() -> CompensationDetector {
        CompensationDetector::new(Arc::new(mediapipe_33()))
    }

    fn find(
        patterns: &[CompensationPattern],
        kind: CompensationType,
    ) -> Option<&CompensationPattern> {
        patterns.iter().find(|p| p.kind == kind)
    }

    #[test]
    fn neutral_pose_is_clean() {
        let d = detector();
        let patterns = d.detect(
            &standing_frame(0.0),
            Side::Left,
            MovementKind::ShoulderElevation,
            &HashMap::new(),
            None,
        );
        assert!(patterns.is_empty(), "unexpected: {patterns:?}");
    }

    #[test]
    fn trunk_lean_is_flagged_with_magnitude() {
        let d = detector();
        let patterns = d.detect(
            &leaning_frame(0.0, 15.0),
            Side::Left,
            MovementKind::General,
            &HashMap::new(),
            None,
        );
        let p = find(&patterns, CompensationType::TrunkLean).expect("trunk lean");
        assert!((p.magnitude - 15.0).abs() < 1.0);
        assert_eq!(p.severity, Severity::Mild);
    }

    #[test]
    fn severity_is_monotonic_in_magnitude() {
        let d = detector();
        let mut last = Severity::Minimal;
        for lean in [11.0, 13.0, 17.0, 25.0] {
            let patterns = d.detect(
                &leaning_frame(0.0, lean),
                Side::Left,
                MovementKind::General,
                &HashMap::new(),
                None,
            );
            let p = find(&patterns, CompensationType::TrunkLean).expect("trunk lean");
            assert!(p.severity >= last, "severity regressed at {lean}");
            last = p.severity;
        }
        assert_eq!(last, Severity::Severe);
    }

    #[test]
    fn shoulder_hiking_detected_on_raised_shoulder() {
        let d = detector();
        let mut frame = standing_frame(0.0);
        for lm in &mut frame.landmarks {
            if lm.name == "left_shoulder" {
                lm.position.y += 0.08;
            }
        }
        let patterns = d.detect(
            &frame,
            Side::Left,
            MovementKind::ShoulderElevation,
            &HashMap::new(),
            None,
        );
        let p = find(&patterns, CompensationType::ShoulderHiking).expect("hiking");
        assert_eq!(p.severity, Severity::Severe);
        assert_eq!(
            p.affected_joint.as_deref(),
            Some("left_shoulder_abduction")
        );
    }

    #[test]
    fn hiking_ignores_contralateral_shoulder() {
        let d = detector();
        let mut frame = standing_frame(0.0);
        for lm in &mut frame.landmarks {
            if lm.name == "right_shoulder" {
                lm.position.y += 0.08;
            }
        }
        let patterns = d.detect(
            &frame,
            Side::Left,
            MovementKind::ShoulderElevation,
            &HashMap::new(),
            None,
        );
        assert!(find(&patterns, CompensationType::ShoulderHiking).is_none());
    }

    #[test]
    fn bent_elbow_during_raise_is_flagged() {
        let d = detector();
        let mut angles = HashMap::new();
        angles.insert("left_elbow_flexion".to_string(), 120.0);
        let patterns = d.detect(
            &standing_frame(0.0),
            Side::Left,
            MovementKind::ShoulderElevation,
            &angles,
            None,
        );
        let p = find(&patterns, CompensationType::ElbowFlexion).expect("elbow");
        assert!((p.magnitude - 40.0).abs() < 1e-9);
        assert_eq!(p.severity, Severity::Severe);
    }

    #[test]
    fn elbow_detector_only_runs_for_shoulder_movements() {
        let d = detector();
        let mut angles = HashMap::new();
        angles.insert("left_elbow_flexion".to_string(), 120.0);
        let patterns = d.detect(
            &standing_frame(0.0),
            Side::Left,
            MovementKind::ElbowFlexion,
            &angles,
            None,
        );
        assert!(find(&patterns, CompensationType::ElbowFlexion).is_none());
    }

    #[test]
    fn trunk_rotation_needs_previous_frame() {
        let d = detector();
        let mut rotated = standing_frame(0.033);
        let a = 20f64.to_radians();
        for lm in &mut rotated.landmarks {
            if lm.name.ends_with("_shoulder") {
                let (x, z) = (lm.position.x, lm.position.z);
                lm.position.x = x * a.cos() - z * a.sin();
                lm.position.z = x * a.sin() + z * a.cos();
            }
        }
        let previous = standing_frame(0.0);

        let without = d.detect(
            &rotated,
            Side::Left,
            MovementKind::General,
            &HashMap::new(),
            None,
        );
        assert!(find(&without, CompensationType::TrunkRotation).is_none());

        let with = d.detect(
            &rotated,
            Side::Left,
            MovementKind::General,
            &HashMap::new(),
            Some(&previous),
        );
        let p = find(&with, CompensationType::TrunkRotation).expect("rotation");
        assert!((p.magnitude - 20.0).abs() < 1.0);
    }

    #[test]
    fn hip_hike_on_tilted_pelvis() {
        let d = detector();
        let mut frame = standing_frame(0.0);
        for lm in &mut frame.landmarks {
            if lm.name == "left_hip" {
                lm.position.y += 0.04;
            }
        }
        let patterns = d.detect(
            &frame,
            Side::Left,
            MovementKind::HipAbduction,
            &HashMap::new(),
            None,
        );
        assert!(find(&patterns, CompensationType::HipHike).is_some());
    }

    #[test]
    fn contralateral_lean_is_side_aware() {
        let d = detector();
        // fixture leans toward the subject's right
        let frame = leaning_frame(0.0, 15.0);
        let left = d.detect(
            &frame,
            Side::Left,
            MovementKind::HipAbduction,
            &HashMap::new(),
            None,
        );
        assert!(find(&left, CompensationType::ContralateralLean).is_some());

        let right = d.detect(
            &frame,
            Side::Right,
            MovementKind::HipAbduction,
            &HashMap::new(),
            None,
        );
        assert!(find(&right, CompensationType::ContralateralLean).is_none());
    }

    #[test]
    fn thresholds_are_scale_free() {
        let d = detector();
        let frame = crate::test_utils::scaled(&leaning_frame(0.0, 15.0), 3.0);
        let patterns = d.detect(
            &frame,
            Side::Left,
            MovementKind::General,
            &HashMap::new(),
            None,
        );
        let p = find(&patterns, CompensationType::TrunkLean).expect("trunk lean");
        assert!((p.magnitude - 15.0).abs() < 1.0);
    }
}
