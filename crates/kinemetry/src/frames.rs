//! Anatomical reference frames and measurement planes.
//!
//! Frames follow the ISB axis convention: x anterior, y superior,
//! z pointing toward the subject's right. Each builder derives a
//! provisional y and z from landmark pairs, then re-orthogonalizes
//! with two cross products (x = y×z, z = x×y) so the result is
//! orthonormal even when the raw landmark vectors are not quite
//! perpendicular.
//!
//! Low visibility never aborts frame construction. A frame built from
//! shaky landmarks is still returned, with `confidence` set to the
//! mean visibility of the landmarks used; callers gate on it.

use std::fmt;

use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::math::Vec3;
use crate::pose::{PoseFrame, Side};
use crate::schema::{PoseSchema, SchemaError};

// ── Errors ──────────────────────────────────────────────────────────

/// Frame construction failures.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// A landmark the builder needs does not exist in the schema.
    Schema(SchemaError),
    /// The landmarks exist but span no usable basis (coincident hips,
    /// zero-length trunk).
    DegenerateGeometry { frame_type: FrameType },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Schema(e) => write!(f, "{e}"),
            FrameError::DegenerateGeometry { frame_type } => {
                write!(f, "degenerate landmark geometry for {frame_type} frame")
            }
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Schema(e) => Some(e),
            FrameError::DegenerateGeometry { .. } => None,
        }
    }
}

impl From<SchemaError> for FrameError {
    fn from(e: SchemaError) -> Self {
        FrameError::Schema(e)
    }
}

// ── Frame types ─────────────────────────────────────────────────────

/// Which anatomical segment a frame is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    Global,
    Thorax,
    Pelvis,
    Humerus(Side),
    Forearm(Side),
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Global => write!(f, "global"),
            FrameType::Thorax => write!(f, "thorax"),
            FrameType::Pelvis => write!(f, "pelvis"),
            FrameType::Humerus(side) => write!(f, "{}_humerus", side.prefix()),
            FrameType::Forearm(side) => write!(f, "{}_forearm", side.prefix()),
        }
    }
}

/// An orthonormal anatomical coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    pub origin: Vec3,
    /// Anterior.
    pub x_axis: Vec3,
    /// Superior.
    pub y_axis: Vec3,
    /// Toward the subject's right.
    pub z_axis: Vec3,
    pub frame_type: FrameType,
    /// Mean visibility of the landmarks the frame was built from.
    pub confidence: f64,
}

impl ReferenceFrame {
    /// Axes as the columns of a rotation matrix (frame → world).
    pub fn basis(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[
            self.x_axis.into(),
            self.y_axis.into(),
            self.z_axis.into(),
        ])
    }

    pub fn is_orthonormal(&self, tol: f64) -> bool {
        let axes = [self.x_axis, self.y_axis, self.z_axis];
        for a in &axes {
            if (a.magnitude() - 1.0).abs() > tol {
                return false;
            }
        }
        axes[0].dot(&axes[1]).abs() <= tol
            && axes[1].dot(&axes[2]).abs() <= tol
            && axes[0].dot(&axes[2]).abs() <= tol
    }
}

/// Build an orthonormal frame from a superior direction and a lateral
/// seed. y wins: it is kept exactly, z is re-derived.
fn orthonormal_from_y_z(
    origin: Vec3,
    y_raw: &Vec3,
    z_seed: &Vec3,
    frame_type: FrameType,
    confidence: f64,
) -> Result<ReferenceFrame, FrameError> {
    let y = y_raw.normalized();
    let z0 = z_seed.normalized();
    if y.magnitude() == 0.0 || z0.magnitude() == 0.0 {
        return Err(FrameError::DegenerateGeometry { frame_type });
    }
    let x_raw = y.cross(&z0);
    if x_raw.magnitude() < 1e-9 {
        // superior and lateral seeds are parallel
        return Err(FrameError::DegenerateGeometry { frame_type });
    }
    let x = x_raw.normalized();
    let z = x.cross(&y).normalized();
    Ok(ReferenceFrame {
        origin,
        x_axis: x,
        y_axis: y,
        z_axis: z,
        frame_type,
        confidence,
    })
}

// ── Builders ────────────────────────────────────────────────────────

struct Anchor {
    position: Vec3,
    visibility: f64,
}

fn anchor(frame: &PoseFrame, schema: &PoseSchema, name: &str) -> Result<Anchor, FrameError> {
    let idx = schema.landmark_index(name)?;
    let lm = frame
        .landmarks
        .get(idx)
        .ok_or_else(|| FrameError::Schema(SchemaError::LandmarkNotInSchema {
            schema_id: schema.id.clone(),
            landmark: name.to_string(),
        }))?;
    Ok(Anchor {
        position: lm.position,
        visibility: lm.visibility,
    })
}

fn mean_vis(anchors: &[&Anchor]) -> f64 {
    anchors.iter().map(|a| a.visibility).sum::<f64>() / anchors.len() as f64
}

/// Whole-body frame: origin at the hip midpoint, y from hip midpoint
/// toward shoulder midpoint, z seeded right-hip minus left-hip.
pub fn global_frame(frame: &PoseFrame, schema: &PoseSchema) -> Result<ReferenceFrame, FrameError> {
    let l_hip = anchor(frame, schema, "left_hip")?;
    let r_hip = anchor(frame, schema, "right_hip")?;
    let l_sh = anchor(frame, schema, "left_shoulder")?;
    let r_sh = anchor(frame, schema, "right_shoulder")?;

    let hip_mid = l_hip.position.midpoint(&r_hip.position);
    let shoulder_mid = l_sh.position.midpoint(&r_sh.position);
    let y = shoulder_mid.sub(&hip_mid);
    let z = r_hip.position.sub(&l_hip.position);
    orthonormal_from_y_z(
        hip_mid,
        &y,
        &z,
        FrameType::Global,
        mean_vis(&[&l_hip, &r_hip, &l_sh, &r_sh]),
    )
}

/// Thorax frame: same trunk axes anchored at the shoulder midpoint,
/// with z seeded from the inter-shoulder line.
pub fn thorax_frame(frame: &PoseFrame, schema: &PoseSchema) -> Result<ReferenceFrame, FrameError> {
    let l_hip = anchor(frame, schema, "left_hip")?;
    let r_hip = anchor(frame, schema, "right_hip")?;
    let l_sh = anchor(frame, schema, "left_shoulder")?;
    let r_sh = anchor(frame, schema, "right_shoulder")?;

    let hip_mid = l_hip.position.midpoint(&r_hip.position);
    let shoulder_mid = l_sh.position.midpoint(&r_sh.position);
    let y = shoulder_mid.sub(&hip_mid);
    let z = r_sh.position.sub(&l_sh.position);
    orthonormal_from_y_z(
        shoulder_mid,
        &y,
        &z,
        FrameType::Thorax,
        mean_vis(&[&l_hip, &r_hip, &l_sh, &r_sh]),
    )
}

/// Pelvis frame: origin at the hip midpoint, z seeded from the
/// inter-hip line, y along the trunk (the hips alone carry no sagittal
/// tilt information in any supported schema).
pub fn pelvis_frame(frame: &PoseFrame, schema: &PoseSchema) -> Result<ReferenceFrame, FrameError> {
    let l_hip = anchor(frame, schema, "left_hip")?;
    let r_hip = anchor(frame, schema, "right_hip")?;
    let l_sh = anchor(frame, schema, "left_shoulder")?;
    let r_sh = anchor(frame, schema, "right_shoulder")?;

    let hip_mid = l_hip.position.midpoint(&r_hip.position);
    let shoulder_mid = l_sh.position.midpoint(&r_sh.position);
    let y = shoulder_mid.sub(&hip_mid);
    let z = r_hip.position.sub(&l_hip.position);
    orthonormal_from_y_z(
        hip_mid,
        &y,
        &z,
        FrameType::Pelvis,
        mean_vis(&[&l_hip, &r_hip, &l_sh, &r_sh]),
    )
}

/// Humerus frame: origin at the shoulder, y along the humeral shaft
/// pointing proximally (elbow → shoulder), z seeded from the
/// inter-shoulder line so the frame stays defined for a straight arm.
pub fn humerus_frame(
    frame: &PoseFrame,
    schema: &PoseSchema,
    side: Side,
) -> Result<ReferenceFrame, FrameError> {
    let prefix = side.prefix();
    let shoulder = anchor(frame, schema, &format!("{prefix}_shoulder"))?;
    let elbow = anchor(frame, schema, &format!("{prefix}_elbow"))?;
    let l_sh = anchor(frame, schema, "left_shoulder")?;
    let r_sh = anchor(frame, schema, "right_shoulder")?;

    let y = shoulder.position.sub(&elbow.position);
    let z = r_sh.position.sub(&l_sh.position);
    orthonormal_from_y_z(
        shoulder.position,
        &y,
        &z,
        FrameType::Humerus(side),
        mean_vis(&[&shoulder, &elbow, &l_sh, &r_sh]),
    )
}

/// Forearm frame: origin at the elbow, y along the forearm pointing
/// proximally (wrist → elbow).
pub fn forearm_frame(
    frame: &PoseFrame,
    schema: &PoseSchema,
    side: Side,
) -> Result<ReferenceFrame, FrameError> {
    let prefix = side.prefix();
    let elbow = anchor(frame, schema, &format!("{prefix}_elbow"))?;
    let wrist = anchor(frame, schema, &format!("{prefix}_wrist"))?;
    let l_sh = anchor(frame, schema, "left_shoulder")?;
    let r_sh = anchor(frame, schema, "right_shoulder")?;

    let y = elbow.position.sub(&wrist.position);
    let z = r_sh.position.sub(&l_sh.position);
    orthonormal_from_y_z(
        elbow.position,
        &y,
        &z,
        FrameType::Forearm(side),
        mean_vis(&[&elbow, &wrist, &l_sh, &r_sh]),
    )
}

/// Build the frame named by `frame_type`.
pub fn build_frame(
    frame: &PoseFrame,
    schema: &PoseSchema,
    frame_type: FrameType,
) -> Result<ReferenceFrame, FrameError> {
    match frame_type {
        FrameType::Global => global_frame(frame, schema),
        FrameType::Thorax => thorax_frame(frame, schema),
        FrameType::Pelvis => pelvis_frame(frame, schema),
        FrameType::Humerus(side) => humerus_frame(frame, schema, side),
        FrameType::Forearm(side) => forearm_frame(frame, schema, side),
    }
}

// ── Planes ──────────────────────────────────────────────────────────

/// The three cardinal anatomical planes plus the scapular plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneKind {
    Sagittal,
    Coronal,
    Transverse,
    Scapular,
}

impl fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaneKind::Sagittal => write!(f, "sagittal"),
            PlaneKind::Coronal => write!(f, "coronal"),
            PlaneKind::Transverse => write!(f, "transverse"),
            PlaneKind::Scapular => write!(f, "scapular"),
        }
    }
}

/// A measurement plane: a unit normal and a point on the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnatomicalPlane {
    pub kind: PlaneKind,
    pub normal: Vec3,
    pub point: Vec3,
}

/// Sagittal plane of `frame`: divides left from right, normal along z.
pub fn sagittal_plane(frame: &ReferenceFrame) -> AnatomicalPlane {
    AnatomicalPlane {
        kind: PlaneKind::Sagittal,
        normal: frame.z_axis,
        point: frame.origin,
    }
}

/// Coronal plane of `frame`: divides front from back, normal along x.
pub fn coronal_plane(frame: &ReferenceFrame) -> AnatomicalPlane {
    AnatomicalPlane {
        kind: PlaneKind::Coronal,
        normal: frame.x_axis,
        point: frame.origin,
    }
}

/// Transverse plane of `frame`: divides top from bottom, normal along y.
pub fn transverse_plane(frame: &ReferenceFrame) -> AnatomicalPlane {
    AnatomicalPlane {
        kind: PlaneKind::Transverse,
        normal: frame.y_axis,
        point: frame.origin,
    }
}

/// Scapular plane: the coronal plane rotated `rotation_deg` anteriorly
/// about the superior axis. 30-40° matches scapular resting posture;
/// 35° is the conventional default.
pub fn scapular_plane(thorax: &ReferenceFrame, rotation_deg: f64) -> AnatomicalPlane {
    let axis = Unit::new_normalize(Vector3::from(thorax.y_axis));
    let rot = Rotation3::from_axis_angle(&axis, rotation_deg.to_radians());
    let normal: Vec3 = (rot * Vector3::from(thorax.x_axis)).into();
    AnatomicalPlane {
        kind: PlaneKind::Scapular,
        normal,
        point: thorax.origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::mediapipe_33;
    use crate::test_utils::{leaning_frame, set_visibility, standing_frame};

    const TOL: f64 = 1e-9;

    #[test]
    fn all_builders_produce_orthonormal_frames() {
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        for ft in [
            FrameType::Global,
            FrameType::Thorax,
            FrameType::Pelvis,
            FrameType::Humerus(Side::Left),
            FrameType::Humerus(Side::Right),
            FrameType::Forearm(Side::Left),
            FrameType::Forearm(Side::Right),
        ] {
            let rf = build_frame(&frame, &schema, ft).unwrap();
            assert!(rf.is_orthonormal(1e-9), "{ft} frame not orthonormal");
        }
    }

    #[test]
    fn global_frame_axes_match_upright_subject() {
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        let g = global_frame(&frame, &schema).unwrap();
        // y superior, z toward subject's right (-x world), x anterior (+z world)
        assert!((g.y_axis.y - 1.0).abs() < 1e-6);
        assert!((g.z_axis.x + 1.0).abs() < 1e-6);
        assert!((g.x_axis.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn leaning_subject_tilts_global_y() {
        let frame = leaning_frame(0.0, 20.0);
        let schema = mediapipe_33();
        let g = global_frame(&frame, &schema).unwrap();
        let up = Vec3::new(0.0, 1.0, 0.0);
        let tilt = g.y_axis.angle_between_deg(&up);
        assert!((tilt - 20.0).abs() < 0.5, "tilt {tilt}");
    }

    #[test]
    fn frame_confidence_is_mean_of_anchor_visibility() {
        let mut frame = standing_frame(0.0);
        set_visibility(&mut frame, "left_hip", 0.2);
        set_visibility(&mut frame, "right_hip", 0.4);
        set_visibility(&mut frame, "left_shoulder", 0.6);
        set_visibility(&mut frame, "right_shoulder", 0.8);
        let schema = mediapipe_33();
        let g = global_frame(&frame, &schema).unwrap();
        assert!((g.confidence - 0.5).abs() < TOL);
    }

    #[test]
    fn low_visibility_still_builds_a_frame() {
        let mut frame = standing_frame(0.0);
        for lm in &mut frame.landmarks {
            lm.visibility = 0.05;
        }
        let schema = mediapipe_33();
        let g = global_frame(&frame, &schema).unwrap();
        assert!(g.is_orthonormal(1e-9));
        assert!(g.confidence < 0.1);
    }

    #[test]
    fn coincident_hips_are_degenerate() {
        let mut frame = standing_frame(0.0);
        let left = frame.landmark("left_hip").unwrap().position;
        for lm in &mut frame.landmarks {
            if lm.name == "right_hip" {
                lm.position = left;
            }
        }
        let schema = mediapipe_33();
        let err = global_frame(&frame, &schema).unwrap_err();
        assert_eq!(
            err,
            FrameError::DegenerateGeometry {
                frame_type: FrameType::Global
            }
        );
    }

    #[test]
    fn scapular_plane_rotates_coronal_normal() {
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        let thorax = thorax_frame(&frame, &schema).unwrap();
        let scap = scapular_plane(&thorax, 35.0);
        let angle = scap.normal.angle_between_deg(&thorax.x_axis);
        assert!((angle - 35.0).abs() < 1e-6);
        // still perpendicular to the superior axis
        assert!(scap.normal.dot(&thorax.y_axis).abs() < 1e-9);
    }

    #[test]
    fn scapular_plane_zero_rotation_is_coronal_normal() {
        let frame = standing_frame(0.0);
        let schema = mediapipe_33();
        let thorax = thorax_frame(&frame, &schema).unwrap();
        let scap = scapular_plane(&thorax, 0.0);
        assert!(scap.normal.sub(&thorax.x_axis).magnitude() < 1e-9);
    }

    #[test]
    fn missing_landmark_surfaces_schema_error() {
        let frame = standing_frame(0.0);
        let mut schema = mediapipe_33();
        schema.landmarks.retain(|d| d.name != "left_hip");
        let err = global_frame(&frame, &schema).unwrap_err();
        assert!(matches!(err, FrameError::Schema(_)));
    }
}
