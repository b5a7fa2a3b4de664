//! Anthropometric scale normalization.
//!
//! Before two people's recordings can be compared spatially, the
//! subject's skeleton is rescaled bone by bone to the reference
//! skeleton's segment lengths: each bone keeps its own direction but
//! adopts the reference length, walking outward from the hips so
//! parent joints are settled before their children. Landmarks outside
//! the bone tree (face, hands, feet) fall back to a uniform
//! trunk-length ratio.

use tracing::debug;

use crate::pose::PoseFrame;

use super::CompareError;

/// Bone tree walked in order; parents appear before children.
const BONES: [(&str, &str); 10] = [
    ("left_hip", "left_shoulder"),
    ("right_hip", "right_shoulder"),
    ("left_shoulder", "left_elbow"),
    ("left_elbow", "left_wrist"),
    ("right_shoulder", "right_elbow"),
    ("right_elbow", "right_wrist"),
    ("left_hip", "left_knee"),
    ("left_knee", "left_ankle"),
    ("right_hip", "right_knee"),
    ("right_knee", "right_ankle"),
];

/// Trunk length: hip midpoint to shoulder midpoint.
pub fn trunk_length(frame: &PoseFrame) -> Option<f64> {
    let p = |name: &str| frame.landmark(name).map(|l| l.position);
    let lsh = p("left_shoulder")?;
    let rsh = p("right_shoulder")?;
    let lhip = p("left_hip")?;
    let rhip = p("right_hip")?;
    Some(lsh.midpoint(&rsh).sub(&lhip.midpoint(&rhip)).magnitude())
}

/// Rescale `subject` so its segment lengths match `reference`.
///
/// Angles are unchanged: every bone keeps its direction. Fails when
/// either trunk is degenerate, since every ratio is anchored on it.
pub fn normalize_to(
    reference: &PoseFrame,
    subject: &PoseFrame,
) -> Result<PoseFrame, CompareError> {
    let ref_trunk = trunk_length(reference).unwrap_or(0.0);
    let subj_trunk = trunk_length(subject).unwrap_or(0.0);
    if ref_trunk < 1e-9 || subj_trunk < 1e-9 {
        return Err(CompareError::InsufficientData {
            reason: "degenerate trunk length, cannot derive scale".to_string(),
        });
    }
    let trunk_ratio = ref_trunk / subj_trunk;

    let mut out = subject.clone();

    let hip_mid = {
        let p = |name: &str| subject.landmark(name).map(|l| l.position);
        match (p("left_hip"), p("right_hip")) {
            (Some(l), Some(r)) => l.midpoint(&r),
            _ => {
                return Err(CompareError::InsufficientData {
                    reason: "hip landmarks missing".to_string(),
                })
            }
        }
    };

    // uniform fallback first, then bone-exact placement overwrites the
    // tree landmarks parent-to-child
    for lm in &mut out.landmarks {
        lm.position = hip_mid.add(&lm.position.sub(&hip_mid).scale(trunk_ratio));
    }

    for (parent, child) in BONES {
        let subj_parent = subject.landmark(parent).map(|l| l.position);
        let subj_child = subject.landmark(child).map(|l| l.position);
        let (Some(sp), Some(sc)) = (subj_parent, subj_child) else {
            continue;
        };
        let bone = sc.sub(&sp);
        let subj_len = bone.magnitude();
        if subj_len < 1e-9 {
            debug!(parent, child, "zero-length bone, keeping uniform scale");
            continue;
        }
        let target_len = reference_bone_length(reference, parent, child)
            .unwrap_or(subj_len * trunk_ratio);

        let new_parent = out
            .landmark(parent)
            .map(|l| l.position)
            .unwrap_or(sp);
        let new_child = new_parent.add(&bone.normalized().scale(target_len));
        for lm in &mut out.landmarks {
            if lm.name == child {
                lm.position = new_child;
            }
        }
    }

    Ok(out)
}

fn reference_bone_length(reference: &PoseFrame, parent: &str, child: &str) -> Option<f64> {
    let p = reference.landmark(parent)?.position;
    let c = reference.landmark(child)?.position;
    let len = c.sub(&p).magnitude();
    (len > 1e-9).then_some(len)
}
