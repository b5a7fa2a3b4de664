//! The joint table: which landmarks and which plane measure each
//! supported joint.

use serde::{Deserialize, Serialize};

use crate::frames::PlaneKind;
use crate::pose::Side;

/// A measurable joint motion.
///
/// Joints are addressed externally by snake_case name
/// (`"left_elbow_flexion"`); [`Joint::from_name`] is the only way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    ElbowFlexion(Side),
    KneeFlexion(Side),
    HipFlexion(Side),
    HipAbduction(Side),
    ShoulderFlexion(Side),
    ShoulderAbduction(Side),
    ShoulderRotation(Side),
    TrunkLean,
    TrunkFlexion,
}

/// How a joint's two measurement vectors are derived.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Measurement {
    /// Included angle at `vertex` between vertex→`a` and vertex→`b`.
    Included {
        a: &'static str,
        vertex: &'static str,
        b: &'static str,
    },
    /// Segment proximal→distal against the trunk's inferior axis.
    SegmentVsTrunkDown {
        proximal: &'static str,
        distal: &'static str,
    },
    /// Trunk axis against the world vertical.
    TrunkVsVertical,
    /// Forearm direction against the thorax anterior axis.
    ForearmVsAnterior { side: Side },
}

impl Joint {
    pub const ALL: [Joint; 16] = [
        Joint::ElbowFlexion(Side::Left),
        Joint::ElbowFlexion(Side::Right),
        Joint::KneeFlexion(Side::Left),
        Joint::KneeFlexion(Side::Right),
        Joint::HipFlexion(Side::Left),
        Joint::HipFlexion(Side::Right),
        Joint::HipAbduction(Side::Left),
        Joint::HipAbduction(Side::Right),
        Joint::ShoulderFlexion(Side::Left),
        Joint::ShoulderFlexion(Side::Right),
        Joint::ShoulderAbduction(Side::Left),
        Joint::ShoulderAbduction(Side::Right),
        Joint::ShoulderRotation(Side::Left),
        Joint::ShoulderRotation(Side::Right),
        Joint::TrunkLean,
        Joint::TrunkFlexion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Joint::ElbowFlexion(Side::Left) => "left_elbow_flexion",
            Joint::ElbowFlexion(Side::Right) => "right_elbow_flexion",
            Joint::KneeFlexion(Side::Left) => "left_knee_flexion",
            Joint::KneeFlexion(Side::Right) => "right_knee_flexion",
            Joint::HipFlexion(Side::Left) => "left_hip_flexion",
            Joint::HipFlexion(Side::Right) => "right_hip_flexion",
            Joint::HipAbduction(Side::Left) => "left_hip_abduction",
            Joint::HipAbduction(Side::Right) => "right_hip_abduction",
            Joint::ShoulderFlexion(Side::Left) => "left_shoulder_flexion",
            Joint::ShoulderFlexion(Side::Right) => "right_shoulder_flexion",
            Joint::ShoulderAbduction(Side::Left) => "left_shoulder_abduction",
            Joint::ShoulderAbduction(Side::Right) => "right_shoulder_abduction",
            Joint::ShoulderRotation(Side::Left) => "left_shoulder_rotation",
            Joint::ShoulderRotation(Side::Right) => "right_shoulder_rotation",
            Joint::TrunkLean => "trunk_lean",
            Joint::TrunkFlexion => "trunk_flexion",
        }
    }

    pub fn from_name(name: &str) -> Option<Joint> {
        Joint::ALL.into_iter().find(|j| j.name() == name)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Joint::ElbowFlexion(s)
            | Joint::KneeFlexion(s)
            | Joint::HipFlexion(s)
            | Joint::HipAbduction(s)
            | Joint::ShoulderFlexion(s)
            | Joint::ShoulderAbduction(s)
            | Joint::ShoulderRotation(s) => Some(*s),
            Joint::TrunkLean | Joint::TrunkFlexion => None,
        }
    }

    /// The plane the joint is measured in. Fixed per joint.
    pub fn plane(&self) -> PlaneKind {
        match self {
            Joint::ElbowFlexion(_)
            | Joint::KneeFlexion(_)
            | Joint::HipFlexion(_)
            | Joint::ShoulderFlexion(_)
            | Joint::TrunkFlexion => PlaneKind::Sagittal,
            Joint::HipAbduction(_) | Joint::TrunkLean => PlaneKind::Coronal,
            Joint::ShoulderAbduction(_) => PlaneKind::Scapular,
            Joint::ShoulderRotation(_) => PlaneKind::Transverse,
        }
    }

    /// Landmarks whose visibility gates the measurement.
    pub fn landmarks(&self) -> &'static [&'static str] {
        match self {
            Joint::ElbowFlexion(Side::Left) => &["left_shoulder", "left_elbow", "left_wrist"],
            Joint::ElbowFlexion(Side::Right) => {
                &["right_shoulder", "right_elbow", "right_wrist"]
            }
            Joint::KneeFlexion(Side::Left) => &["left_hip", "left_knee", "left_ankle"],
            Joint::KneeFlexion(Side::Right) => &["right_hip", "right_knee", "right_ankle"],
            Joint::HipFlexion(Side::Left) | Joint::HipAbduction(Side::Left) => {
                &["left_hip", "left_knee"]
            }
            Joint::HipFlexion(Side::Right) | Joint::HipAbduction(Side::Right) => {
                &["right_hip", "right_knee"]
            }
            Joint::ShoulderFlexion(Side::Left) | Joint::ShoulderAbduction(Side::Left) => {
                &["left_shoulder", "left_elbow"]
            }
            Joint::ShoulderFlexion(Side::Right) | Joint::ShoulderAbduction(Side::Right) => {
                &["right_shoulder", "right_elbow"]
            }
            Joint::ShoulderRotation(Side::Left) => &["left_elbow", "left_wrist"],
            Joint::ShoulderRotation(Side::Right) => &["right_elbow", "right_wrist"],
            Joint::TrunkLean | Joint::TrunkFlexion => {
                &["left_shoulder", "right_shoulder", "left_hip", "right_hip"]
            }
        }
    }

    pub(crate) fn measurement(&self) -> Measurement {
        match self {
            Joint::ElbowFlexion(Side::Left) => Measurement::Included {
                a: "left_shoulder",
                vertex: "left_elbow",
                b: "left_wrist",
            },
            Joint::ElbowFlexion(Side::Right) => Measurement::Included {
                a: "right_shoulder",
                vertex: "right_elbow",
                b: "right_wrist",
            },
            Joint::KneeFlexion(Side::Left) => Measurement::Included {
                a: "left_hip",
                vertex: "left_knee",
                b: "left_ankle",
            },
            Joint::KneeFlexion(Side::Right) => Measurement::Included {
                a: "right_hip",
                vertex: "right_knee",
                b: "right_ankle",
            },
            Joint::HipFlexion(Side::Left) | Joint::HipAbduction(Side::Left) => {
                Measurement::SegmentVsTrunkDown {
                    proximal: "left_hip",
                    distal: "left_knee",
                }
            }
            Joint::HipFlexion(Side::Right) | Joint::HipAbduction(Side::Right) => {
                Measurement::SegmentVsTrunkDown {
                    proximal: "right_hip",
                    distal: "right_knee",
                }
            }
            Joint::ShoulderFlexion(Side::Left) | Joint::ShoulderAbduction(Side::Left) => {
                Measurement::SegmentVsTrunkDown {
                    proximal: "left_shoulder",
                    distal: "left_elbow",
                }
            }
            Joint::ShoulderFlexion(Side::Right) | Joint::ShoulderAbduction(Side::Right) => {
                Measurement::SegmentVsTrunkDown {
                    proximal: "right_shoulder",
                    distal: "right_elbow",
                }
            }
            Joint::ShoulderRotation(side) => Measurement::ForearmVsAnterior { side: *side },
            Joint::TrunkLean | Joint::TrunkFlexion => Measurement::TrunkVsVertical,
        }
    }
}
