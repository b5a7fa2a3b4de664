use std::error::Error;
use std::sync::Arc;

use kinemetry::{
    mediapipe_33, Landmark, MeasurementSession, MovementKind, PoseFrame, PoseSchema,
    SessionConfig, Side, Vec3,
};

/// Synthesizes a 3-second lateral raise of the left arm and streams it
/// through a measurement session, printing what a frontend would show.
fn main() -> Result<(), Box<dyn Error>> {
    let schema = Arc::new(mediapipe_33());
    let config = SessionConfig {
        movement: MovementKind::ShoulderElevation,
        side: Side::Left,
        ..SessionConfig::default()
    };
    let mut session = MeasurementSession::with_config(Arc::clone(&schema), config);

    let fps = 30.0;
    let frames = 90;
    for i in 0..frames {
        let t = i as f64 / fps;
        let abduction = 120.0 * i as f64 / (frames - 1) as f64;
        let analysis = session.process_frame(&synth_frame(&schema, t, abduction))?;

        if i % 15 == 0 {
            let measured = analysis
                .angles
                .iter()
                .find(|m| m.joint == "left_shoulder_abduction")
                .map(|m| m.angle_deg)
                .unwrap_or(f64::NAN);
            println!(
                "t={t:4.2}s  target={abduction:5.1}  measured={measured:5.1}  quality={:?}  compensations={}",
                analysis.quality.bucket,
                analysis.compensations.len()
            );
        }
    }

    println!();
    for (joint, span) in session.rom().all() {
        if span.max_deg - span.min_deg > 5.0 {
            println!(
                "{joint}: {:.1} -> {:.1} deg ({} samples)",
                span.min_deg, span.max_deg, span.samples
            );
        }
    }
    Ok(())
}

fn synth_frame(schema: &PoseSchema, t: f64, abduction_deg: f64) -> PoseFrame {
    let a = abduction_deg.to_radians();
    let landmarks = schema
        .landmarks
        .iter()
        .map(|def| Landmark {
            name: def.name.clone(),
            index: def.index,
            position: position(&def.name, a),
            visibility: 0.95,
        })
        .collect();
    PoseFrame {
        schema_id: schema.id.clone(),
        timestamp_s: t,
        detection_confidence: 0.95,
        landmarks,
        view_orientation: None,
        has_depth: schema.has_depth,
    }
}

fn position(name: &str, a: f64) -> Vec3 {
    let arm = |len: f64| Vec3::new(0.18 + len * a.sin(), 1.45 - len * a.cos(), 0.0);
    match name {
        "left_shoulder" => Vec3::new(0.18, 1.45, 0.0),
        "right_shoulder" => Vec3::new(-0.18, 1.45, 0.0),
        "left_elbow" => arm(0.27),
        "left_wrist" => arm(0.53),
        "left_pinky" | "left_index" | "left_thumb" => arm(0.60),
        "right_elbow" => Vec3::new(-0.20, 1.18, 0.0),
        "right_wrist" => Vec3::new(-0.21, 0.92, 0.0),
        "right_pinky" | "right_index" | "right_thumb" => Vec3::new(-0.22, 0.84, 0.0),
        "left_hip" => Vec3::new(0.10, 0.95, 0.0),
        "right_hip" => Vec3::new(-0.10, 0.95, 0.0),
        "left_knee" => Vec3::new(0.11, 0.52, 0.0),
        "right_knee" => Vec3::new(-0.11, 0.52, 0.0),
        "left_ankle" => Vec3::new(0.11, 0.08, 0.0),
        "right_ankle" => Vec3::new(-0.11, 0.08, 0.0),
        "left_heel" => Vec3::new(0.11, 0.03, -0.04),
        "right_heel" => Vec3::new(-0.11, 0.03, -0.04),
        "left_foot_index" => Vec3::new(0.11, 0.02, 0.10),
        "right_foot_index" => Vec3::new(-0.11, 0.02, 0.10),
        // face landmarks cluster around the head
        _ => Vec3::new(0.0, 1.62, 0.06),
    }
}
