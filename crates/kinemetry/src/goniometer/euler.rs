//! Shoulder orientation as Y-X'-Y'' Euler angles.
//!
//! The humerus orientation relative to the thorax is decomposed in the
//! ISB-recommended sequence: rotation about the thorax superior axis
//! (plane of elevation), rotation about the rotated anterior-posterior
//! axis (elevation), rotation about the humeral shaft (axial
//! rotation). Plane of elevation 0° is coronal-plane abduction;
//! ±90° is sagittal-plane flexion/extension.
//!
//! With a two-landmark humerus model the shaft-perpendicular axes are
//! seeded from the inter-shoulder line, so axial rotation is an
//! estimate rather than a true humeral reading.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::frames::ReferenceFrame;
use crate::pose::Side;

/// Shoulder orientation decomposition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShoulderEuler {
    pub side: Side,
    /// Rotation about the thorax superior axis, degrees in (-180, 180].
    pub plane_of_elevation_deg: f64,
    /// Elevation away from the thorax superior axis, degrees in [0, 180].
    pub elevation_deg: f64,
    /// Rotation about the humeral shaft, degrees in (-180, 180].
    pub axial_rotation_deg: f64,
    /// `min` of the two anchoring frame confidences.
    pub confidence: f64,
}

/// Estimated split of total shoulder elevation between the
/// glenohumeral joint and scapulothoracic motion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RhythmEstimate {
    pub glenohumeral_deg: f64,
    pub scapulothoracic_deg: f64,
    /// Always true: no supported schema carries scapular landmarks, so
    /// the split is a population-average approximation.
    pub estimated: bool,
    pub confidence: f64,
}

const GIMBAL_EPS: f64 = 1e-7;

/// Decompose the humerus frame relative to the thorax frame.
pub fn decompose_shoulder(
    thorax: &ReferenceFrame,
    humerus: &ReferenceFrame,
    side: Side,
) -> ShoulderEuler {
    let rel: Matrix3<f64> = thorax.basis().transpose() * humerus.basis();

    let cos_b = rel[(1, 1)].clamp(-1.0, 1.0);
    let elevation = cos_b.acos();
    let sin_b = elevation.sin();

    let (plane, axial) = if sin_b.abs() < GIMBAL_EPS {
        // Arm along the thorax axis: plane of elevation is undefined,
        // fold the whole y rotation into the axial term.
        (0.0, rel[(0, 2)].atan2(rel[(0, 0)]))
    } else {
        (
            rel[(0, 1)].atan2(rel[(2, 1)]),
            rel[(1, 0)].atan2(-rel[(1, 2)]),
        )
    };

    ShoulderEuler {
        side,
        plane_of_elevation_deg: plane.to_degrees(),
        elevation_deg: elevation.to_degrees(),
        axial_rotation_deg: axial.to_degrees(),
        confidence: thorax.confidence.min(humerus.confidence),
    }
}

/// Apply the fixed 75/25 glenohumeral:scapulothoracic split to a total
/// elevation reading. Confidence is capped at 0.5 because the split is
/// not measured.
pub fn scapulohumeral_rhythm(euler: &ShoulderEuler) -> RhythmEstimate {
    RhythmEstimate {
        glenohumeral_deg: euler.elevation_deg * 0.75,
        scapulothoracic_deg: euler.elevation_deg * 0.25,
        estimated: true,
        confidence: euler.confidence.min(0.5),
    }
}
