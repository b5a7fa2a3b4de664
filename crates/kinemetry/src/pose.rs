//! Input contract for upstream pose estimators.
//!
//! A [`PoseFrame`] is the unit of work: one timestamped set of
//! landmarks produced by a detector running a known schema. Frames are
//! immutable once constructed; smoothing produces new frames.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;
use crate::schema::PoseSchema;

/// Body side, used for side-specific joints and frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn prefix(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Camera viewpoint relative to the subject, when the capture layer
/// knows it. Used to demote confidence of measurements taken in a
/// plane the viewpoint foreshortens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewOrientation {
    Frontal,
    SagittalLeft,
    SagittalRight,
    Posterior,
}

/// One detected landmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub index: usize,
    pub position: Vec3,
    /// Detector confidence that the landmark is where it says, in [0,1].
    pub visibility: f64,
}

/// One timestamped pose detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseFrame {
    pub schema_id: String,
    /// Stream time in seconds. Monotonically increasing within a
    /// session; used for filter dt and cache expiry.
    pub timestamp_s: f64,
    /// Whole-pose detection confidence in [0,1].
    pub detection_confidence: f64,
    pub landmarks: Vec<Landmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_orientation: Option<ViewOrientation>,
    #[serde(default)]
    pub has_depth: bool,
}

impl PoseFrame {
    /// Look up a landmark by the name the detector stored.
    pub fn landmark(&self, name: &str) -> Option<&Landmark> {
        self.landmarks.iter().find(|l| l.name == name)
    }

    /// Look up a landmark through a schema, so aliases resolve too.
    pub fn landmark_in(&self, schema: &PoseSchema, name: &str) -> Option<&Landmark> {
        let idx = schema.landmark_index(name).ok()?;
        self.landmarks.get(idx)
    }

    /// Mean visibility over all landmarks; 0 for an empty frame.
    pub fn mean_visibility(&self) -> f64 {
        if self.landmarks.is_empty() {
            return 0.0;
        }
        self.landmarks.iter().map(|l| l.visibility).sum::<f64>() / self.landmarks.len() as f64
    }
}
