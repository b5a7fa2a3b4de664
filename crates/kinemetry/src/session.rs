//! Streaming measurement session.
//!
//! One [`MeasurementSession`] per patient per camera stream. Each
//! incoming pose frame flows through landmark smoothing, joint-angle
//! measurement, compensation detection, and quality scoring, and comes
//! back as a single [`FrameAnalysis`]. Per-joint measurement failures
//! are logged and skipped so one occluded wrist never blanks a whole
//! frame.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::compensation::{
    CompensationConfig, CompensationDetector, CompensationPattern, MovementKind,
};
use crate::filter::{FilterParams, LandmarkSmoother};
use crate::goniometer::{
    scapulohumeral_rhythm, AngleError, Goniometer, GoniometerConfig, JointAngleMeasurement,
    RhythmEstimate, ShoulderEuler,
};
use crate::pose::{PoseFrame, Side};
use crate::quality::{MeasurementQuality, QualityScorer};
use crate::schema::PoseSchema;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The frame was produced under a different landmark schema than
    /// the session was built for.
    SchemaMismatch { expected: String, got: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::SchemaMismatch { expected, got } => {
                write!(f, "frame schema {got} does not match session schema {expected}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

// ── Range-of-motion tracking ────────────────────────────────────────

/// Observed angle extremes for one joint over a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RomSpan {
    pub min_deg: f64,
    pub max_deg: f64,
    pub last_deg: f64,
    pub samples: u64,
}

/// Running per-joint range-of-motion bookkeeping.
#[derive(Debug, Default)]
pub struct RomTracker {
    spans: HashMap<String, RomSpan>,
}

impl RomTracker {
    pub fn new() -> Self {
        RomTracker::default()
    }

    pub fn update(&mut self, joint: &str, angle_deg: f64) {
        self.spans
            .entry(joint.to_string())
            .and_modify(|s| {
                s.min_deg = s.min_deg.min(angle_deg);
                s.max_deg = s.max_deg.max(angle_deg);
                s.last_deg = angle_deg;
                s.samples += 1;
            })
            .or_insert(RomSpan {
                min_deg: angle_deg,
                max_deg: angle_deg,
                last_deg: angle_deg,
                samples: 1,
            });
    }

    pub fn span(&self, joint: &str) -> Option<RomSpan> {
        self.spans.get(joint).copied()
    }

    /// Covered range (max minus min) for one joint.
    pub fn rom_deg(&self, joint: &str) -> Option<f64> {
        self.span(joint).map(|s| s.max_deg - s.min_deg)
    }

    pub fn all(&self) -> &HashMap<String, RomSpan> {
        &self.spans
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Session-level knobs. The nested configs tune the individual stages.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// What the patient is asked to perform; decides which
    /// compensation detectors are armed.
    pub movement: MovementKind,
    /// The side being measured.
    pub side: Side,
    /// Compute the shoulder Euler decomposition each frame.
    pub track_euler: bool,
    /// Run landmark positions through One-Euro smoothing before any
    /// measurement.
    pub smooth_landmarks: bool,
    /// Landmarks below this visibility bypass the smoother and reset
    /// their filter state.
    pub landmark_visibility_floor: f64,
    pub landmark_filter: FilterParams,
    pub goniometer: GoniometerConfig,
    pub compensation: CompensationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            movement: MovementKind::General,
            side: Side::Left,
            track_euler: true,
            smooth_landmarks: true,
            landmark_visibility_floor: 0.3,
            landmark_filter: FilterParams::landmark(),
            goniometer: GoniometerConfig::default(),
            compensation: CompensationConfig::default(),
        }
    }
}

// ── Frame analysis ──────────────────────────────────────────────────

/// Everything measured from one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub timestamp_s: f64,
    /// Smoothed measurements for every joint that could be measured
    /// this frame.
    pub angles: Vec<JointAngleMeasurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub euler: Option<ShoulderEuler>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rhythm: Option<RhythmEstimate>,
    pub compensations: Vec<CompensationPattern>,
    pub quality: MeasurementQuality,
}

// ── Session ─────────────────────────────────────────────────────────

/// Stateful per-stream analysis pipeline.
#[derive(Debug)]
pub struct MeasurementSession {
    schema: Arc<PoseSchema>,
    config: SessionConfig,
    goniometer: Goniometer,
    detector: CompensationDetector,
    scorer: QualityScorer,
    landmark_smoother: LandmarkSmoother,
    rom: RomTracker,
    prev_frame: Option<PoseFrame>,
    frames_processed: u64,
}

impl MeasurementSession {
    pub fn new(schema: Arc<PoseSchema>) -> Self {
        let config = SessionConfig {
            goniometer: GoniometerConfig::for_schema(&schema),
            ..SessionConfig::default()
        };
        MeasurementSession::with_config(schema, config)
    }

    pub fn with_config(schema: Arc<PoseSchema>, config: SessionConfig) -> Self {
        info!(
            schema = %schema.id,
            movement = ?config.movement,
            side = ?config.side,
            "starting measurement session"
        );
        MeasurementSession {
            goniometer: Goniometer::with_config(Arc::clone(&schema), config.goniometer.clone()),
            detector: CompensationDetector::with_config(Arc::clone(&schema), config.compensation),
            scorer: QualityScorer::new(),
            landmark_smoother: LandmarkSmoother::new(
                config.landmark_filter,
                config.landmark_visibility_floor,
            ),
            rom: RomTracker::new(),
            prev_frame: None,
            frames_processed: 0,
            schema,
            config,
        }
    }

    pub fn schema(&self) -> &PoseSchema {
        &self.schema
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn rom(&self) -> &RomTracker {
        &self.rom
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Analyze one frame.
    pub fn process_frame(&mut self, frame: &PoseFrame) -> Result<FrameAnalysis, SessionError> {
        if frame.schema_id != self.schema.id {
            return Err(SessionError::SchemaMismatch {
                expected: self.schema.id.clone(),
                got: frame.schema_id.clone(),
            });
        }

        let frame = if self.config.smooth_landmarks {
            self.landmark_smoother.smooth(frame)
        } else {
            frame.clone()
        };

        let mut angles = Vec::new();
        for joint in self.goniometer.measurable_joints() {
            match self.goniometer.joint_angle_smoothed(&frame, joint) {
                Ok(m) => {
                    if m.valid {
                        self.rom.update(&m.joint, m.angle_deg);
                    }
                    angles.push(m);
                }
                Err(AngleError::LowConfidence {
                    joint, landmark, ..
                }) => {
                    debug!(joint, landmark, "joint skipped, landmark occluded");
                }
                Err(e) => {
                    warn!(joint = joint.name(), error = %e, "joint measurement failed");
                }
            }
        }

        let euler = if self.config.track_euler {
            match self.goniometer.shoulder_euler(&frame, self.config.side) {
                Ok(e) => Some(e),
                Err(e) => {
                    debug!(error = %e, "shoulder decomposition unavailable");
                    None
                }
            }
        } else {
            None
        };
        let rhythm = match (self.config.movement, euler.as_ref()) {
            (MovementKind::ShoulderElevation, Some(e)) => Some(scapulohumeral_rhythm(e)),
            _ => None,
        };

        let secondary: HashMap<String, f64> = angles
            .iter()
            .filter(|m| m.valid)
            .map(|m| (m.joint.clone(), m.angle_deg))
            .collect();
        let compensations = self.detector.detect(
            &frame,
            self.config.side,
            self.config.movement,
            &secondary,
            self.prev_frame.as_ref(),
        );

        let quality = self.scorer.score(&frame, &compensations);

        let analysis = FrameAnalysis {
            timestamp_s: frame.timestamp_s,
            angles,
            euler,
            rhythm,
            compensations,
            quality,
        };
        self.prev_frame = Some(frame);
        self.frames_processed += 1;
        Ok(analysis)
    }

    /// Drop all accumulated state: filter histories, frame cache,
    /// range-of-motion spans, and the previous frame. The next frame
    /// is treated as the first of a fresh recording.
    pub fn reset(&mut self) {
        info!(frames = self.frames_processed, "resetting session");
        self.goniometer.reset_all_histories();
        self.goniometer.clear_cache();
        self.landmark_smoother.reset();
        self.scorer.reset();
        self.rom.clear();
        self.prev_frame = None;
        self.frames_processed = 0;
    }
}
