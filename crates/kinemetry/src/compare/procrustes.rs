//! Kabsch rigid alignment between two landmark sets.

use nalgebra::{Matrix3, Vector3};

use crate::math::Vec3;

use super::CompareError;

/// Result of aligning a source point set onto a target.
#[derive(Debug, Clone)]
pub struct ProcrustesResult {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    pub scale: f64,
    /// Root-mean-square distance between the transformed source and
    /// the target.
    pub disparity: f64,
}

impl ProcrustesResult {
    pub fn apply(&self, p: &Vec3) -> Vec3 {
        let v: Vector3<f64> = (*p).into();
        (self.rotation * v * self.scale + self.translation).into()
    }

    /// Rotation magnitude in degrees.
    pub fn rotation_angle_deg(&self) -> f64 {
        let cos = ((self.rotation.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
        cos.acos().to_degrees()
    }
}

/// Find the similarity transform (rotation, optional uniform scale,
/// translation) mapping `source` onto `target` with least squared
/// error.
///
/// The rotation comes from the SVD of the centered cross-covariance;
/// a negative determinant (reflection) is repaired by flipping the
/// smallest singular direction, so the result is always a proper
/// rotation.
pub fn align(
    source: &[Vec3],
    target: &[Vec3],
    with_scale: bool,
) -> Result<ProcrustesResult, CompareError> {
    if source.len() != target.len() {
        return Err(CompareError::InsufficientData {
            reason: format!(
                "point count mismatch: {} vs {}",
                source.len(),
                target.len()
            ),
        });
    }
    if source.len() < 3 {
        return Err(CompareError::InsufficientData {
            reason: format!("{} points, need at least 3", source.len()),
        });
    }

    let n = source.len() as f64;
    let src_centroid = centroid(source);
    let tgt_centroid = centroid(target);

    let mut h = Matrix3::<f64>::zeros();
    let mut src_var = 0.0;
    for (s, t) in source.iter().zip(target.iter()) {
        let sc = Vector3::from(*s) - src_centroid;
        let tc = Vector3::from(*t) - tgt_centroid;
        h += sc * tc.transpose();
        src_var += sc.norm_squared();
    }
    if src_var < 1e-12 {
        return Err(CompareError::InsufficientData {
            reason: "source points are coincident".to_string(),
        });
    }

    let svd = h.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return Err(CompareError::InsufficientData {
                reason: "cross-covariance SVD did not converge".to_string(),
            })
        }
    };
    let v = v_t.transpose();

    let mut d = Vector3::new(1.0, 1.0, 1.0);
    if (v * u.transpose()).determinant() < 0.0 {
        d.z = -1.0;
    }
    let rotation = v * Matrix3::from_diagonal(&d) * u.transpose();

    let trace = svd.singular_values.dot(&d);
    let scale = if with_scale { trace / src_var } else { 1.0 };
    let translation = tgt_centroid - rotation * src_centroid * scale;

    let mut sq_err = 0.0;
    for (s, t) in source.iter().zip(target.iter()) {
        let mapped = rotation * Vector3::from(*s) * scale + translation;
        sq_err += (mapped - Vector3::from(*t)).norm_squared();
    }
    let disparity = (sq_err / n).sqrt();

    Ok(ProcrustesResult {
        rotation,
        translation,
        scale,
        disparity,
    })
}

fn centroid(points: &[Vec3]) -> Vector3<f64> {
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + Vector3::from(*p));
    sum / points.len() as f64
}
