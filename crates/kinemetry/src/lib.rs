//! kinemetry — markerless joint-angle measurement from pose landmarks.
//!
//! Takes per-frame 2D/3D landmark detections (MediaPipe, MoveNet, or
//! any registered schema) and turns them into clinically meaningful
//! measurements. The per-frame pipeline stages are:
//!
//! 1. **Schema** – resolve landmark names and aliases against the
//!    detector's landmark layout.
//! 2. **Filter** – One-Euro smoothing of landmark coordinates, speed
//!    adaptive so resting jitter is damped without lagging fast motion.
//! 3. **Frames** – ISB-style anatomical reference frames (global,
//!    thorax, pelvis, humerus, forearm) with an LRU cache per frame.
//! 4. **Goniometer** – plane-projected joint angles for the supported
//!    joint table, plus the shoulder Y-X'-Y'' Euler decomposition.
//! 5. **Compensation** – trunk lean, trunk rotation, shoulder hiking,
//!    elbow recruitment, hip hike, contralateral lean.
//! 6. **Quality** – visibility, stability, and depth blended into one
//!    per-frame grade.
//!
//! Whole recordings are compared in [`compare`]: anthropometric scale
//! normalization, DTW phase alignment, per-joint scoring, and rigid
//! (Kabsch) alignment residuals.
//!
//! # Public API
//! - [`MeasurementSession`] for live streams, one frame in, one
//!   [`FrameAnalysis`] out
//! - [`Goniometer`] for direct angle queries
//! - [`MovementComparator`] for reference/subject recording comparison
//! - [`SchemaRegistry`] to register custom landmark layouts

mod cache;
pub mod compare;
mod compensation;
mod filter;
mod frames;
mod goniometer;
mod math;
mod pose;
mod quality;
mod schema;
mod session;
#[cfg(test)]
mod test_utils;

pub use cache::{CacheConfig, FrameCache};
pub use compare::{
    AlignmentSummary, CompareError, ComparisonConfig, ComparisonReport, FrameComparison,
    JointComparison, MovementComparator,
};
pub use compensation::{
    CompensationConfig, CompensationDetector, CompensationPattern, CompensationType,
    MovementKind, Severity,
};
pub use filter::{AngleSmoother, FilterParams, LandmarkSmoother, OneEuroFilter};
pub use frames::{
    build_frame, AnatomicalPlane, FrameError, FrameType, PlaneKind, ReferenceFrame,
};
pub use goniometer::{
    decompose_shoulder, scapulohumeral_rhythm, AngleError, Goniometer, GoniometerConfig, Joint,
    JointAngleMeasurement, RhythmEstimate, ShoulderEuler,
};
pub use math::Vec3;
pub use pose::{Landmark, PoseFrame, Side, ViewOrientation};
pub use quality::{MeasurementQuality, QualityBucket, QualityScorer};
pub use schema::{
    mediapipe_33, movenet_17, BodyGroup, GroupRequirement, LandmarkDef, PoseSchema, SchemaError,
    SchemaRegistry,
};
pub use session::{
    FrameAnalysis, MeasurementSession, RomSpan, RomTracker, SessionConfig, SessionError,
};
