//! Pose schema registry.
//!
//! Every upstream pose estimator ships its own landmark layout. A
//! [`PoseSchema`] describes one layout once (indices, canonical names,
//! aliases, body groups, depth capability) and everything downstream
//! resolves landmarks by semantic name only, so the measurement code
//! never hard-codes a model's index order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ── Errors ──────────────────────────────────────────────────────────

/// Schema lookup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No schema registered under the requested id.
    UnknownSchema { schema_id: String },
    /// The schema exists but cannot express the requested landmark,
    /// neither as a canonical name nor as an alias.
    LandmarkNotInSchema { schema_id: String, landmark: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownSchema { schema_id } => {
                write!(f, "unknown pose schema: {schema_id}")
            }
            SchemaError::LandmarkNotInSchema { schema_id, landmark } => {
                write!(f, "landmark {landmark} not present in schema {schema_id}")
            }
        }
    }
}

impl std::error::Error for SchemaError {}

// ── Schema types ────────────────────────────────────────────────────

/// Coarse anatomical grouping used for visibility gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyGroup {
    Head,
    Torso,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

/// One landmark slot in a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkDef {
    pub index: usize,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub group: BodyGroup,
}

/// Minimum number of visible landmarks a group needs before
/// measurements anchored on it are considered trustworthy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRequirement {
    pub group: BodyGroup,
    pub min_visible: usize,
}

/// Immutable description of one pose model's landmark layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseSchema {
    pub id: String,
    pub model: String,
    pub landmarks: Vec<LandmarkDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupRequirement>,
    pub has_depth: bool,
    pub default_visibility_threshold: f64,
}

impl PoseSchema {
    /// Resolve a semantic landmark name (canonical or alias) to its
    /// index in this schema's landmark array.
    pub fn landmark_index(&self, name: &str) -> Result<usize, SchemaError> {
        for def in &self.landmarks {
            if def.name == name || def.aliases.iter().any(|a| a == name) {
                return Ok(def.index);
            }
        }
        Err(SchemaError::LandmarkNotInSchema {
            schema_id: self.id.clone(),
            landmark: name.to_string(),
        })
    }

    /// Whether the schema can express every one of the given names.
    pub fn supports_all(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.landmark_index(n).is_ok())
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Registry of available pose schemas.
///
/// Starts pre-populated with the built-in `movenet-17` and
/// `mediapipe-33` layouts. Registration is an idempotent upsert by id;
/// schemas are handed out behind `Arc` and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<PoseSchema>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let mut reg = SchemaRegistry {
            schemas: HashMap::new(),
        };
        reg.register(movenet_17());
        reg.register(mediapipe_33());
        reg
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the schema under its own id.
    pub fn register(&mut self, schema: PoseSchema) {
        self.schemas.insert(schema.id.clone(), Arc::new(schema));
    }

    pub fn get(&self, schema_id: &str) -> Result<Arc<PoseSchema>, SchemaError> {
        self.schemas
            .get(schema_id)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownSchema {
                schema_id: schema_id.to_string(),
            })
    }

    pub fn resolve_landmark_index(
        &self,
        schema_id: &str,
        landmark: &str,
    ) -> Result<usize, SchemaError> {
        self.get(schema_id)?.landmark_index(landmark)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

// ── Built-in schemas ────────────────────────────────────────────────

fn def(index: usize, name: &str, group: BodyGroup) -> LandmarkDef {
    LandmarkDef {
        index,
        name: name.to_string(),
        aliases: Vec::new(),
        group,
    }
}

fn def_alias(index: usize, name: &str, aliases: &[&str], group: BodyGroup) -> LandmarkDef {
    LandmarkDef {
        index,
        name: name.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        group,
    }
}

/// MoveNet / COCO 17-keypoint layout. 2D only.
pub fn movenet_17() -> PoseSchema {
    use BodyGroup::*;
    PoseSchema {
        id: "movenet-17".to_string(),
        model: "MoveNet".to_string(),
        landmarks: vec![
            def(0, "nose", Head),
            def(1, "left_eye", Head),
            def(2, "right_eye", Head),
            def(3, "left_ear", Head),
            def(4, "right_ear", Head),
            def(5, "left_shoulder", Torso),
            def(6, "right_shoulder", Torso),
            def(7, "left_elbow", LeftArm),
            def(8, "right_elbow", RightArm),
            def(9, "left_wrist", LeftArm),
            def(10, "right_wrist", RightArm),
            def(11, "left_hip", Torso),
            def(12, "right_hip", Torso),
            def(13, "left_knee", LeftLeg),
            def(14, "right_knee", RightLeg),
            def(15, "left_ankle", LeftLeg),
            def(16, "right_ankle", RightLeg),
        ],
        groups: vec![
            GroupRequirement {
                group: Torso,
                min_visible: 3,
            },
            GroupRequirement {
                group: LeftArm,
                min_visible: 2,
            },
            GroupRequirement {
                group: RightArm,
                min_visible: 2,
            },
        ],
        has_depth: false,
        default_visibility_threshold: 0.5,
    }
}

/// MediaPipe BlazePose 33-landmark layout, with depth.
pub fn mediapipe_33() -> PoseSchema {
    use BodyGroup::*;
    PoseSchema {
        id: "mediapipe-33".to_string(),
        model: "MediaPipe BlazePose".to_string(),
        landmarks: vec![
            def(0, "nose", Head),
            def(1, "left_eye_inner", Head),
            def(2, "left_eye", Head),
            def(3, "left_eye_outer", Head),
            def(4, "right_eye_inner", Head),
            def(5, "right_eye", Head),
            def(6, "right_eye_outer", Head),
            def(7, "left_ear", Head),
            def(8, "right_ear", Head),
            def(9, "mouth_left", Head),
            def(10, "mouth_right", Head),
            def(11, "left_shoulder", Torso),
            def(12, "right_shoulder", Torso),
            def(13, "left_elbow", LeftArm),
            def(14, "right_elbow", RightArm),
            def(15, "left_wrist", LeftArm),
            def(16, "right_wrist", RightArm),
            def_alias(17, "left_pinky", &["left_pinky_1"], LeftArm),
            def_alias(18, "right_pinky", &["right_pinky_1"], RightArm),
            def_alias(19, "left_index", &["left_index_1"], LeftArm),
            def_alias(20, "right_index", &["right_index_1"], RightArm),
            def_alias(21, "left_thumb", &["left_thumb_2"], LeftArm),
            def_alias(22, "right_thumb", &["right_thumb_2"], RightArm),
            def(23, "left_hip", Torso),
            def(24, "right_hip", Torso),
            def(25, "left_knee", LeftLeg),
            def(26, "right_knee", RightLeg),
            def(27, "left_ankle", LeftLeg),
            def(28, "right_ankle", RightLeg),
            def(29, "left_heel", LeftLeg),
            def(30, "right_heel", RightLeg),
            def_alias(31, "left_foot_index", &["left_toe"], LeftLeg),
            def_alias(32, "right_foot_index", &["right_toe"], RightLeg),
        ],
        groups: vec![
            GroupRequirement {
                group: Torso,
                min_visible: 3,
            },
            GroupRequirement {
                group: LeftArm,
                min_visible: 2,
            },
            GroupRequirement {
                group: RightArm,
                min_visible: 2,
            },
            GroupRequirement {
                group: LeftLeg,
                min_visible: 2,
            },
            GroupRequirement {
                group: RightLeg,
                min_visible: 2,
            },
        ],
        has_depth: true,
        default_visibility_threshold: 0.5,
    }
}
