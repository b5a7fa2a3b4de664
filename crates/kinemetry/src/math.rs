//! Small 3D vector primitives shared by every stage of the pipeline.
//!
//! All quantities are `f64`. Angles are reported in degrees because the
//! downstream consumers (goniometry reports, compensation thresholds)
//! are specified clinically in degrees.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A 3D point or direction in the pose coordinate space.
///
/// For 2D pose schemas `z` is always 0, which keeps every operation
/// below well defined (cross products stay in-plane, projections onto
/// the image plane are the identity).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn midpoint(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            (self.x + other.x) * 0.5,
            (self.y + other.y) * 0.5,
            (self.z + other.z) * 0.5,
        )
    }

    pub fn scale(&self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction. A zero vector is returned
    /// unchanged so callers can gate on magnitude instead of NaN.
    pub fn normalized(&self) -> Vec3 {
        let mag = self.magnitude();
        if mag == 0.0 {
            return *self;
        }
        self.scale(1.0 / mag)
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unsigned angle between two vectors in degrees, in [0, 180].
    ///
    /// The cosine is clamped before `acos` so near-parallel vectors
    /// whose dot product drifts past ±1 by rounding never produce NaN.
    /// Either vector being zero-length yields 0.
    pub fn angle_between_deg(&self, other: &Vec3) -> f64 {
        let denom = self.magnitude() * other.magnitude();
        if denom < 1e-12 {
            return 0.0;
        }
        let cos = (self.dot(other) / denom).clamp(-1.0, 1.0);
        cos.acos().to_degrees()
    }

    /// Projection onto the plane with the given normal, normalized.
    ///
    /// Removes the component along `normal`. When the vector is
    /// (numerically) parallel to the normal the projection collapses;
    /// the zero vector is returned and callers treat the measurement
    /// as degenerate.
    pub fn project_onto_plane(&self, normal: &Vec3) -> Vec3 {
        let n = normal.normalized();
        if n.magnitude() == 0.0 {
            return *self;
        }
        let along = n.scale(self.dot(&n));
        let in_plane = self.sub(&along);
        if in_plane.magnitude() < 1e-9 {
            return Vec3::ZERO;
        }
        in_plane.normalized()
    }
}

impl From<Vec3> for Vector3<f64> {
    fn from(v: Vec3) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

impl From<Vector3<f64>> for Vec3 {
    fn from(v: Vector3<f64>) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}
