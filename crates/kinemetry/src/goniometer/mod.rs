//! The angle engine.
//!
//! Measurement runs in stages per joint:
//! 1. resolve the joint's landmarks through the schema and gate on
//!    visibility,
//! 2. build (or fetch from cache) the anatomical frames the joint's
//!    plane needs,
//! 3. project both measurement vectors onto the plane,
//! 4. take the included angle and attach a confidence.
//!
//! Raw measurements are side-effect free; the `_smoothed` variants
//! additionally push the reading through a rolling mean and a One-Euro
//! filter keyed by joint name.

mod config;
mod euler;
mod joints;

pub use config::GoniometerConfig;
pub use euler::{decompose_shoulder, scapulohumeral_rhythm, RhythmEstimate, ShoulderEuler};
pub use joints::Joint;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::FrameCache;
use crate::filter::AngleSmoother;
use crate::frames::{
    build_frame, coronal_plane, sagittal_plane, scapular_plane, transverse_plane,
    AnatomicalPlane, FrameError, FrameType, PlaneKind, ReferenceFrame,
};
use crate::math::Vec3;
use crate::pose::{PoseFrame, Side, ViewOrientation};
use crate::schema::{PoseSchema, SchemaError};

use joints::Measurement;

// ── Errors ──────────────────────────────────────────────────────────

/// Why a joint angle could not be measured.
#[derive(Debug, Clone, PartialEq)]
pub enum AngleError {
    /// The joint name is not in the supported joint table.
    UnsupportedJoint { joint: String },
    /// Schema lookup failed for a landmark the joint needs.
    Schema(SchemaError),
    /// A required landmark is below the visibility gate.
    LowConfidence {
        joint: String,
        landmark: String,
        visibility: f64,
        required: f64,
    },
    /// A required anatomical frame could not be built.
    FrameNotAvailable { frame_type: FrameType },
}

impl fmt::Display for AngleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AngleError::UnsupportedJoint { joint } => {
                write!(f, "unsupported joint: {joint}")
            }
            AngleError::Schema(e) => write!(f, "{e}"),
            AngleError::LowConfidence {
                joint,
                landmark,
                visibility,
                required,
            } => write!(
                f,
                "{joint}: landmark {landmark} visibility {visibility:.2} below required {required:.2}"
            ),
            AngleError::FrameNotAvailable { frame_type } => {
                write!(f, "required {frame_type} frame not available")
            }
        }
    }
}

impl std::error::Error for AngleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AngleError::Schema(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchemaError> for AngleError {
    fn from(e: SchemaError) -> Self {
        AngleError::Schema(e)
    }
}

impl From<FrameError> for AngleError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Schema(s) => AngleError::Schema(s),
            FrameError::DegenerateGeometry { frame_type } => {
                AngleError::FrameNotAvailable { frame_type }
            }
        }
    }
}

// ── Measurement result ──────────────────────────────────────────────

/// One measured joint angle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointAngleMeasurement {
    pub joint: String,
    pub angle_deg: f64,
    pub plane: PlaneKind,
    /// Combined landmark/frame confidence in [0,1], after any
    /// view-orientation demotion.
    pub confidence: f64,
    /// False when a measurement vector collapsed under projection;
    /// `angle_deg` is 0 in that case.
    pub valid: bool,
    /// The plane-projected unit vectors the angle was taken between.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected: Option<(Vec3, Vec3)>,
}

// ── Engine ──────────────────────────────────────────────────────────

/// Per-session angle engine. Owns the frame cache and the per-joint
/// smoothing state; independent instances never share state.
#[derive(Debug)]
pub struct Goniometer {
    schema: Arc<PoseSchema>,
    config: GoniometerConfig,
    cache: FrameCache,
    history: HashMap<String, VecDeque<f64>>,
    smoother: AngleSmoother,
}

impl Goniometer {
    pub fn new(schema: Arc<PoseSchema>) -> Self {
        let config = GoniometerConfig::for_schema(&schema);
        Self::with_config(schema, config)
    }

    pub fn with_config(schema: Arc<PoseSchema>, config: GoniometerConfig) -> Self {
        Goniometer {
            cache: FrameCache::new(config.cache),
            smoother: AngleSmoother::new(config.angle_filter),
            history: HashMap::new(),
            schema,
            config,
        }
    }

    pub fn schema(&self) -> &PoseSchema {
        &self.schema
    }

    pub fn config(&self) -> &GoniometerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut GoniometerConfig {
        &mut self.config
    }

    /// Measure one joint without touching smoothing state.
    pub fn joint_angle(
        &mut self,
        frame: &PoseFrame,
        joint: Joint,
    ) -> Result<JointAngleMeasurement, AngleError> {
        let min_vis = self.gate_visibility(frame, joint)?;

        let global = self.frame(frame, FrameType::Global)?;
        let plane = self.measurement_plane(frame, joint, &global)?;

        let (v1, v2, frame_conf) = self.measurement_vectors(frame, joint, &global)?;

        let p1 = v1.project_onto_plane(&plane.normal);
        let p2 = v2.project_onto_plane(&plane.normal);
        let valid = p1.magnitude() > 0.0 && p2.magnitude() > 0.0;
        let angle_deg = if valid { p1.angle_between_deg(&p2) } else { 0.0 };

        let confidence = (min_vis.min(frame_conf) * self.view_penalty(frame, plane.kind))
            .clamp(0.0, 1.0);

        Ok(JointAngleMeasurement {
            joint: joint.name().to_string(),
            angle_deg,
            plane: plane.kind,
            confidence,
            valid,
            projected: valid.then_some((p1, p2)),
        })
    }

    /// Measure one joint and run the result through the per-joint
    /// rolling mean and One-Euro filter.
    pub fn joint_angle_smoothed(
        &mut self,
        frame: &PoseFrame,
        joint: Joint,
    ) -> Result<JointAngleMeasurement, AngleError> {
        let mut m = self.joint_angle(frame, joint)?;
        if !m.valid || !self.config.smoothing_enabled {
            return Ok(m);
        }

        let window = self.config.history_window.max(1);
        let history = self.history.entry(m.joint.clone()).or_default();
        history.push_back(m.angle_deg);
        while history.len() > window {
            history.pop_front();
        }
        let mean = history.iter().sum::<f64>() / history.len() as f64;
        m.angle_deg = self.smoother.smooth(&m.joint, mean, frame.timestamp_s);
        Ok(m)
    }

    /// Measure a joint addressed by its snake_case name.
    pub fn joint_angle_by_name(
        &mut self,
        frame: &PoseFrame,
        name: &str,
    ) -> Result<JointAngleMeasurement, AngleError> {
        let joint = Joint::from_name(name).ok_or_else(|| AngleError::UnsupportedJoint {
            joint: name.to_string(),
        })?;
        self.joint_angle(frame, joint)
    }

    /// Measure every joint the active schema can express. Joints the
    /// schema cannot express are skipped; every other failure
    /// propagates.
    pub fn all_joint_angles(
        &mut self,
        frame: &PoseFrame,
    ) -> Result<Vec<JointAngleMeasurement>, AngleError> {
        let mut out = Vec::new();
        for joint in Joint::ALL {
            if !self.schema.supports_all(joint.landmarks()) {
                debug!(joint = joint.name(), schema = %self.schema.id, "schema cannot express joint, skipping");
                continue;
            }
            out.push(self.joint_angle(frame, joint)?);
        }
        Ok(out)
    }

    /// Joints the active schema can express.
    pub fn measurable_joints(&self) -> Vec<Joint> {
        Joint::ALL
            .into_iter()
            .filter(|j| self.schema.supports_all(j.landmarks()))
            .collect()
    }

    /// Humerus-relative-to-thorax orientation for one shoulder.
    pub fn shoulder_euler(
        &mut self,
        frame: &PoseFrame,
        side: Side,
    ) -> Result<ShoulderEuler, AngleError> {
        let thorax = self.frame(frame, FrameType::Thorax)?;
        let humerus = self.frame(frame, FrameType::Humerus(side))?;
        Ok(decompose_shoulder(&thorax, &humerus, side))
    }

    pub fn reset_history(&mut self, joint: &str) {
        self.history.remove(joint);
        self.smoother.reset(joint);
    }

    pub fn reset_all_histories(&mut self) {
        self.history.clear();
        self.smoother.reset_all();
    }

    pub(crate) fn clear_cache(&mut self) {
        self.cache.clear();
    }

    // ── internals ───────────────────────────────────────────────

    fn gate_visibility(&self, frame: &PoseFrame, joint: Joint) -> Result<f64, AngleError> {
        let required = self.config.min_visibility;
        let mut min_vis: f64 = 1.0;
        for name in joint.landmarks() {
            let (_, vis) = self.landmark(frame, name)?;
            if vis < required {
                return Err(AngleError::LowConfidence {
                    joint: joint.name().to_string(),
                    landmark: name.to_string(),
                    visibility: vis,
                    required,
                });
            }
            min_vis = min_vis.min(vis);
        }
        Ok(min_vis)
    }

    fn landmark(&self, frame: &PoseFrame, name: &str) -> Result<(Vec3, f64), AngleError> {
        let idx = self.schema.landmark_index(name)?;
        let lm = frame
            .landmarks
            .get(idx)
            .ok_or_else(|| AngleError::Schema(SchemaError::LandmarkNotInSchema {
                schema_id: self.schema.id.clone(),
                landmark: name.to_string(),
            }))?;
        Ok((lm.position, lm.visibility))
    }

    fn frame(
        &mut self,
        frame: &PoseFrame,
        frame_type: FrameType,
    ) -> Result<ReferenceFrame, AngleError> {
        let positions: Vec<Vec3> = frame.landmarks.iter().map(|l| l.position).collect();
        let schema = Arc::clone(&self.schema);
        let built = self.cache.get_or_compute(
            frame_type,
            &positions,
            frame.timestamp_s,
            || build_frame(frame, &schema, frame_type),
        )?;
        Ok(built)
    }

    fn measurement_plane(
        &mut self,
        frame: &PoseFrame,
        joint: Joint,
        global: &ReferenceFrame,
    ) -> Result<AnatomicalPlane, AngleError> {
        Ok(match joint.plane() {
            PlaneKind::Sagittal => sagittal_plane(global),
            PlaneKind::Coronal => coronal_plane(global),
            PlaneKind::Transverse => transverse_plane(global),
            PlaneKind::Scapular => {
                let thorax = self.frame(frame, FrameType::Thorax)?;
                scapular_plane(&thorax, self.config.scapular_offset_deg)
            }
        })
    }

    /// The two vectors the joint's angle is taken between, plus the
    /// confidence of any frames involved beyond the landmarks.
    fn measurement_vectors(
        &mut self,
        frame: &PoseFrame,
        joint: Joint,
        global: &ReferenceFrame,
    ) -> Result<(Vec3, Vec3, f64), AngleError> {
        match joint.measurement() {
            Measurement::Included { a, vertex, b } => {
                let (pa, _) = self.landmark(frame, a)?;
                let (pv, _) = self.landmark(frame, vertex)?;
                let (pb, _) = self.landmark(frame, b)?;
                Ok((pa.sub(&pv), pb.sub(&pv), global.confidence))
            }
            Measurement::SegmentVsTrunkDown { proximal, distal } => {
                let (pp, _) = self.landmark(frame, proximal)?;
                let (pd, _) = self.landmark(frame, distal)?;
                Ok((pd.sub(&pp), global.y_axis.scale(-1.0), global.confidence))
            }
            Measurement::TrunkVsVertical => {
                let (lsh, _) = self.landmark(frame, "left_shoulder")?;
                let (rsh, _) = self.landmark(frame, "right_shoulder")?;
                let (lhip, _) = self.landmark(frame, "left_hip")?;
                let (rhip, _) = self.landmark(frame, "right_hip")?;
                let trunk = lsh.midpoint(&rsh).sub(&lhip.midpoint(&rhip));
                Ok((trunk, Vec3::new(0.0, 1.0, 0.0), global.confidence))
            }
            Measurement::ForearmVsAnterior { side } => {
                let prefix = side.prefix();
                let (elbow, _) = self.landmark(frame, &format!("{prefix}_elbow"))?;
                let (wrist, _) = self.landmark(frame, &format!("{prefix}_wrist"))?;
                let thorax = self.frame(frame, FrameType::Thorax)?;
                Ok((
                    wrist.sub(&elbow),
                    thorax.x_axis,
                    global.confidence.min(thorax.confidence),
                ))
            }
        }
    }

    fn view_penalty(&self, frame: &PoseFrame, plane: PlaneKind) -> f64 {
        if !self.config.view_gating_enabled {
            return 1.0;
        }
        let mut penalty = 1.0;
        if plane == PlaneKind::Transverse && !frame.has_depth {
            penalty *= self.config.view_demotion_factor;
        }
        if let Some(view) = frame.view_orientation {
            let aligned = match plane {
                PlaneKind::Sagittal => matches!(
                    view,
                    ViewOrientation::SagittalLeft | ViewOrientation::SagittalRight
                ),
                PlaneKind::Coronal | PlaneKind::Scapular => {
                    matches!(view, ViewOrientation::Frontal | ViewOrientation::Posterior)
                }
                PlaneKind::Transverse => true,
            };
            if !aligned {
                penalty *= self.config.view_demotion_factor;
            }
        }
        penalty
    }
}
