use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use kinemetry::{MovementComparator, PoseFrame, SchemaRegistry};

/// Compares a patient recording against a clinician reference. Both
/// inputs are JSON arrays of pose frames as serialized by the library.
fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <reference.json> <subject.json> [report.json]", args[0]);
        std::process::exit(2);
    }

    let reference = load_frames(Path::new(&args[1]))?;
    let subject = load_frames(Path::new(&args[2]))?;

    let registry = SchemaRegistry::new();
    let schema = registry.get(&reference[0].schema_id)?;

    let mut comparator = MovementComparator::new(Arc::clone(&schema));
    let report = comparator.compare(&reference, &subject, &|| false)?;

    println!(
        "overall {:.1}%  temporal {:.1}%  flagged frames {}",
        report.overall_similarity * 100.0,
        report.temporal_similarity * 100.0,
        report.flagged_frames.len()
    );
    let mut joints = report.per_joint.clone();
    joints.sort_by(|a, b| a.similarity.total_cmp(&b.similarity));
    for j in joints.iter().take(5) {
        println!(
            "  {}: {:.1}% (mean diff {:.1} deg)",
            j.joint,
            j.similarity * 100.0,
            j.mean_abs_diff_deg
        );
    }

    if let Some(out_path) = args.get(3) {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}

fn load_frames(path: &Path) -> Result<Vec<PoseFrame>, Box<dyn Error>> {
    let data = std::fs::read_to_string(path)?;
    let frames: Vec<PoseFrame> = serde_json::from_str(&data)?;
    if frames.is_empty() {
        return Err(format!("{}: no frames", path.display()).into());
    }
    Ok(frames)
}
