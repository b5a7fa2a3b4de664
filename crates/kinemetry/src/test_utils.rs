//! Synthetic pose fixtures shared across unit tests and benches.
//!
//! All fixtures use a y-up world space with the subject facing +z and
//! the subject's left side on +x. Proportions are metric-ish (1.7 m
//! figure) so bone-length ratios look like a real skeleton.

use crate::math::Vec3;
use crate::pose::{Landmark, PoseFrame, Side};
use crate::schema::{mediapipe_33, movenet_17, PoseSchema};

pub(crate) const DEFAULT_VIS: f64 = 0.95;

/// Canonical landmark positions for a neutral standing pose, arms at
/// the sides. Covers every mediapipe-33 name; movenet-17 uses the
/// subset it shares.
pub(crate) fn neutral_positions() -> Vec<(&'static str, [f64; 3])> {
    vec![
        ("nose", [0.0, 1.62, 0.08]),
        ("left_eye_inner", [0.02, 1.65, 0.07]),
        ("left_eye", [0.03, 1.65, 0.06]),
        ("left_eye_outer", [0.05, 1.65, 0.05]),
        ("right_eye_inner", [-0.02, 1.65, 0.07]),
        ("right_eye", [-0.03, 1.65, 0.06]),
        ("right_eye_outer", [-0.05, 1.65, 0.05]),
        ("left_ear", [0.08, 1.63, 0.0]),
        ("right_ear", [-0.08, 1.63, 0.0]),
        ("mouth_left", [0.03, 1.58, 0.07]),
        ("mouth_right", [-0.03, 1.58, 0.07]),
        ("left_shoulder", [0.18, 1.45, 0.0]),
        ("right_shoulder", [-0.18, 1.45, 0.0]),
        ("left_elbow", [0.20, 1.18, 0.0]),
        ("right_elbow", [-0.20, 1.18, 0.0]),
        ("left_wrist", [0.21, 0.92, 0.0]),
        ("right_wrist", [-0.21, 0.92, 0.0]),
        ("left_pinky", [0.22, 0.83, 0.0]),
        ("right_pinky", [-0.22, 0.83, 0.0]),
        ("left_index", [0.215, 0.83, 0.02]),
        ("right_index", [-0.215, 0.83, 0.02]),
        ("left_thumb", [0.20, 0.85, 0.03]),
        ("right_thumb", [-0.20, 0.85, 0.03]),
        ("left_hip", [0.10, 0.95, 0.0]),
        ("right_hip", [-0.10, 0.95, 0.0]),
        ("left_knee", [0.11, 0.52, 0.0]),
        ("right_knee", [-0.11, 0.52, 0.0]),
        ("left_ankle", [0.11, 0.08, 0.0]),
        ("right_ankle", [-0.11, 0.08, 0.0]),
        ("left_heel", [0.11, 0.03, -0.04]),
        ("right_heel", [-0.11, 0.03, -0.04]),
        ("left_foot_index", [0.11, 0.02, 0.10]),
        ("right_foot_index", [-0.11, 0.02, 0.10]),
    ]
}

fn set_pos(positions: &mut Vec<(&'static str, [f64; 3])>, name: &str, p: [f64; 3]) {
    for entry in positions.iter_mut() {
        if entry.0 == name {
            entry.1 = p;
            return;
        }
    }
}

fn lookup(positions: &[(&'static str, [f64; 3])], name: &str) -> [f64; 3] {
    positions
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, p)| *p)
        .unwrap_or([0.0, 1.6, 0.0])
}

/// Build a frame for `schema` from a name→position list; unlisted
/// landmarks fall back to a head-height default.
pub(crate) fn frame_from(
    schema: &PoseSchema,
    t_s: f64,
    positions: &[(&'static str, [f64; 3])],
) -> PoseFrame {
    let landmarks = schema
        .landmarks
        .iter()
        .map(|def| {
            let p = lookup(positions, &def.name);
            Landmark {
                name: def.name.clone(),
                index: def.index,
                position: Vec3::new(p[0], p[1], p[2]),
                visibility: DEFAULT_VIS,
            }
        })
        .collect();
    PoseFrame {
        schema_id: schema.id.clone(),
        timestamp_s: t_s,
        detection_confidence: DEFAULT_VIS,
        landmarks,
        view_orientation: None,
        has_depth: schema.has_depth,
    }
}

/// Neutral standing pose on the mediapipe-33 schema.
pub(crate) fn standing_frame(t_s: f64) -> PoseFrame {
    frame_from(&mediapipe_33(), t_s, &neutral_positions())
}

/// Neutral standing pose on the movenet-17 schema (no depth).
pub(crate) fn standing_frame_movenet(t_s: f64) -> PoseFrame {
    frame_from(&movenet_17(), t_s, &neutral_positions())
}

fn side_sign(side: Side) -> f64 {
    match side {
        Side::Left => 1.0,
        Side::Right => -1.0,
    }
}

const UPPER_ARM_LEN: f64 = 0.27;
const FOREARM_LEN: f64 = 0.26;

/// Standing pose with one elbow flexed so the included shoulder-
/// elbow-wrist angle equals `flexion_deg` (180 = straight arm), with
/// the forearm swung anteriorly in the sagittal plane.
pub(crate) fn bent_elbow_frame(t_s: f64, side: Side, flexion_deg: f64) -> PoseFrame {
    let mut positions = neutral_positions();
    let sx = side_sign(side);
    let shoulder = [0.18 * sx, 1.45, 0.0];
    let elbow = [shoulder[0], shoulder[1] - UPPER_ARM_LEN, shoulder[2]];
    let f = flexion_deg.to_radians();
    // angle between elbow->shoulder (up) and this direction is exactly
    // flexion_deg, in the y-z sagittal plane
    let wrist = [
        elbow[0],
        elbow[1] + FOREARM_LEN * f.cos(),
        elbow[2] + FOREARM_LEN * f.sin(),
    ];
    let prefix = side.prefix();
    place_arm(&mut positions, prefix, shoulder, elbow, wrist);
    frame_from(&mediapipe_33(), t_s, &positions)
}

/// Standing pose with one straight arm abducted `abduction_deg` from
/// vertical-down, in the coronal plane.
pub(crate) fn abducted_arm_frame(t_s: f64, side: Side, abduction_deg: f64) -> PoseFrame {
    let mut positions = neutral_positions();
    let sx = side_sign(side);
    let shoulder = [0.18 * sx, 1.45, 0.0];
    let a = abduction_deg.to_radians();
    let dir = [a.sin() * sx, -a.cos(), 0.0];
    let elbow = [
        shoulder[0] + UPPER_ARM_LEN * dir[0],
        shoulder[1] + UPPER_ARM_LEN * dir[1],
        shoulder[2],
    ];
    let wrist = [
        elbow[0] + FOREARM_LEN * dir[0],
        elbow[1] + FOREARM_LEN * dir[1],
        elbow[2],
    ];
    let prefix = side.prefix();
    place_arm(&mut positions, prefix, shoulder, elbow, wrist);
    frame_from(&mediapipe_33(), t_s, &positions)
}

/// Standing pose with one straight arm flexed forward
/// `flexion_deg` from vertical-down, in the sagittal plane.
pub(crate) fn forward_flexed_arm_frame(t_s: f64, side: Side, flexion_deg: f64) -> PoseFrame {
    let mut positions = neutral_positions();
    let sx = side_sign(side);
    let shoulder = [0.18 * sx, 1.45, 0.0];
    let f = flexion_deg.to_radians();
    let dir = [0.0, -f.cos(), f.sin()];
    let elbow = [
        shoulder[0],
        shoulder[1] + UPPER_ARM_LEN * dir[1],
        shoulder[2] + UPPER_ARM_LEN * dir[2],
    ];
    let wrist = [
        elbow[0],
        elbow[1] + FOREARM_LEN * dir[1],
        elbow[2] + FOREARM_LEN * dir[2],
    ];
    let prefix = side.prefix();
    place_arm(&mut positions, prefix, shoulder, elbow, wrist);
    frame_from(&mediapipe_33(), t_s, &positions)
}

fn place_arm(
    positions: &mut Vec<(&'static str, [f64; 3])>,
    prefix: &str,
    shoulder: [f64; 3],
    elbow: [f64; 3],
    wrist: [f64; 3],
) {
    let hand = [wrist[0], wrist[1] - 0.08, wrist[2] + 0.02];
    match prefix {
        "left" => {
            set_pos(positions, "left_shoulder", shoulder);
            set_pos(positions, "left_elbow", elbow);
            set_pos(positions, "left_wrist", wrist);
            set_pos(positions, "left_pinky", hand);
            set_pos(positions, "left_index", hand);
            set_pos(positions, "left_thumb", hand);
        }
        _ => {
            set_pos(positions, "right_shoulder", shoulder);
            set_pos(positions, "right_elbow", elbow);
            set_pos(positions, "right_wrist", wrist);
            set_pos(positions, "right_pinky", hand);
            set_pos(positions, "right_index", hand);
            set_pos(positions, "right_thumb", hand);
        }
    }
}

/// Standing pose with everything above the hips rotated `lean_deg`
/// about the anterior axis through the hip midpoint (positive leans
/// toward the subject's right).
pub(crate) fn leaning_frame(t_s: f64, lean_deg: f64) -> PoseFrame {
    let mut frame = standing_frame(t_s);
    let hip_mid_y = 0.95;
    let a = lean_deg.to_radians();
    let (sin, cos) = (a.sin(), a.cos());
    for lm in &mut frame.landmarks {
        if lm.position.y <= hip_mid_y {
            continue;
        }
        let x = lm.position.x;
        let y = lm.position.y - hip_mid_y;
        lm.position.x = x * cos - y * sin;
        lm.position.y = hip_mid_y + x * sin + y * cos;
    }
    frame
}

/// Uniformly scale every landmark position about the origin, as a
/// camera zoom would.
pub(crate) fn scaled(frame: &PoseFrame, factor: f64) -> PoseFrame {
    let mut out = frame.clone();
    for lm in &mut out.landmarks {
        lm.position = lm.position.scale(factor);
    }
    out
}

pub(crate) fn set_visibility(frame: &mut PoseFrame, name: &str, v: f64) {
    for lm in &mut frame.landmarks {
        if lm.name == name {
            lm.visibility = v;
        }
    }
}

/// A lateral-raise sequence: the arm sweeps from 0 to `peak_deg`
/// abduction over `n` frames at `fps`.
pub(crate) fn arm_raise_sequence(side: Side, n: usize, fps: f64, peak_deg: f64) -> Vec<PoseFrame> {
    (0..n)
        .map(|i| {
            let frac = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
            abducted_arm_frame(i as f64 / fps, side, peak_deg * frac)
        })
        .collect()
}
