//! kinemetry CLI — offline analysis of recorded pose-landmark sequences.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kinemetry::{
    FrameAnalysis, GoniometerConfig, MeasurementSession, MovementComparator, MovementKind,
    PoseFrame, SchemaRegistry, SessionConfig, Side,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "kinemetry")]
#[command(about = "Joint goniometry, compensation detection and movement comparison over recorded pose landmarks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one recording frame by frame.
    Analyze(CliAnalyzeArgs),

    /// Compare a subject recording against a reference recording.
    Compare(CliCompareArgs),

    /// List the registered pose schemas.
    SchemaInfo(CliSchemaInfoArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MovementArg {
    ShoulderElevation,
    ElbowFlexion,
    HipAbduction,
    Squat,
    General,
}

impl MovementArg {
    fn to_core(self) -> MovementKind {
        match self {
            MovementArg::ShoulderElevation => MovementKind::ShoulderElevation,
            MovementArg::ElbowFlexion => MovementKind::ElbowFlexion,
            MovementArg::HipAbduction => MovementKind::HipAbduction,
            MovementArg::Squat => MovementKind::Squat,
            MovementArg::General => MovementKind::General,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SideArg {
    Left,
    Right,
}

impl SideArg {
    fn to_core(self) -> Side {
        match self {
            SideArg::Left => Side::Left,
            SideArg::Right => Side::Right,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Recording to analyze (JSON array of pose frames).
    #[arg(long)]
    frames: PathBuf,

    /// Path to write per-frame analyses (JSON). Omit for stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Movement the patient was asked to perform.
    #[arg(long, value_enum, default_value_t = MovementArg::General)]
    movement: MovementArg,

    /// Side being measured.
    #[arg(long, value_enum, default_value_t = SideArg::Left)]
    side: SideArg,

    /// Disable One-Euro landmark smoothing.
    #[arg(long)]
    no_smoothing: bool,

    /// Disable the per-frame shoulder Euler decomposition.
    #[arg(long)]
    no_euler: bool,

    /// Override the minimum landmark visibility gate.
    #[arg(long)]
    min_visibility: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct CliCompareArgs {
    /// Clinician reference recording (JSON array of pose frames).
    #[arg(long)]
    reference: PathBuf,

    /// Subject recording (JSON array of pose frames).
    #[arg(long)]
    subject: PathBuf,

    /// Path to write the comparison report (JSON). Omit for stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Angle difference in degrees that maps to zero similarity.
    #[arg(long, default_value = "45.0")]
    max_angle_diff: f64,

    /// Frames below this similarity are flagged.
    #[arg(long, default_value = "0.6")]
    flag_threshold: f64,

    /// Cap on either sequence length before warping.
    #[arg(long, default_value = "2000")]
    dtw_max_len: usize,

    /// Keep residual uniform scale out of the rigid alignment.
    #[arg(long)]
    no_scale: bool,
}

#[derive(Debug, Clone, Args)]
struct CliSchemaInfoArgs {
    /// Print every landmark of one schema.
    #[arg(long)]
    schema: Option<String>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Compare(args) => run_compare(&args),
        Commands::SchemaInfo(args) => run_schema_info(&args),
    }
}

// ── shared I/O ──────────────────────────────────────────────────────

fn load_frames(path: &Path) -> CliResult<Vec<PoseFrame>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    let frames: Vec<PoseFrame> =
        serde_json::from_str(&data).map_err(|e| format!("{}: {e}", path.display()))?;
    if frames.is_empty() {
        return Err(format!("{}: recording holds no frames", path.display()).into());
    }
    Ok(frames)
}

fn write_json<T: serde::Serialize>(value: &T, out: &Option<PathBuf>) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── analyze ─────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    tracing::info!("Loading recording: {}", args.frames.display());
    let frames = load_frames(&args.frames)?;

    let registry = SchemaRegistry::new();
    let schema = registry.get(&frames[0].schema_id)?;
    tracing::info!("{} frames on schema {}", frames.len(), schema.id);

    let mut goniometer = GoniometerConfig::for_schema(&schema);
    if let Some(v) = args.min_visibility {
        goniometer.min_visibility = v;
    }
    let config = SessionConfig {
        movement: args.movement.to_core(),
        side: args.side.to_core(),
        track_euler: !args.no_euler,
        smooth_landmarks: !args.no_smoothing,
        goniometer,
        ..SessionConfig::default()
    };

    let mut session = MeasurementSession::with_config(Arc::clone(&schema), config);
    let mut analyses: Vec<FrameAnalysis> = Vec::with_capacity(frames.len());
    for frame in &frames {
        analyses.push(session.process_frame(frame)?);
    }

    write_json(&analyses, &args.out)?;

    eprintln!("analyzed {} frames on {}", analyses.len(), schema.id);
    let mut joints: Vec<_> = session.rom().all().iter().collect();
    joints.sort_by(|a, b| a.0.cmp(b.0));
    for (joint, span) in joints {
        eprintln!(
            "  {joint}: {:6.1} -> {:6.1} deg (rom {:5.1}, {} samples)",
            span.min_deg,
            span.max_deg,
            span.max_deg - span.min_deg,
            span.samples
        );
    }
    Ok(())
}

// ── compare ─────────────────────────────────────────────────────────

fn run_compare(args: &CliCompareArgs) -> CliResult<()> {
    tracing::info!(
        "Comparing {} against {}",
        args.subject.display(),
        args.reference.display()
    );
    let reference = load_frames(&args.reference)?;
    let subject = load_frames(&args.subject)?;

    let registry = SchemaRegistry::new();
    let schema = registry.get(&reference[0].schema_id)?;

    let mut comparator = MovementComparator::new(schema);
    comparator.config_mut().max_angle_diff_deg = args.max_angle_diff;
    comparator.config_mut().flag_threshold = args.flag_threshold;
    comparator.config_mut().dtw_max_len = args.dtw_max_len;
    comparator.config_mut().with_scale = !args.no_scale;

    let report = comparator.compare(&reference, &subject, &|| false)?;

    eprintln!(
        "overall {:.1}%  temporal {:.1}%  flagged {} of {} aligned frames",
        report.overall_similarity * 100.0,
        report.temporal_similarity * 100.0,
        report.flagged_frames.len(),
        report.per_frame.len()
    );
    let mut joints = report.per_joint.clone();
    joints.sort_by(|a, b| a.similarity.total_cmp(&b.similarity));
    for j in &joints {
        eprintln!(
            "  {:30} {:5.1}%  mean diff {:5.1} deg",
            j.joint,
            j.similarity * 100.0,
            j.mean_abs_diff_deg
        );
    }

    write_json(&report, &args.out)
}

// ── schema-info ─────────────────────────────────────────────────────

fn run_schema_info(args: &CliSchemaInfoArgs) -> CliResult<()> {
    let registry = SchemaRegistry::new();

    match &args.schema {
        Some(id) => {
            let schema = registry.get(id)?;
            println!("{} ({})", schema.id, schema.model);
            println!("  landmarks:            {}", schema.len());
            println!("  depth:                {}", schema.has_depth);
            println!(
                "  visibility threshold: {}",
                schema.default_visibility_threshold
            );
            for def in &schema.landmarks {
                if def.aliases.is_empty() {
                    println!("  [{:2}] {}", def.index, def.name);
                } else {
                    println!("  [{:2}] {} (aliases: {})", def.index, def.name, def.aliases.join(", "));
                }
            }
        }
        None => {
            let mut ids = registry.ids();
            ids.sort_unstable();
            for id in ids {
                let schema = registry.get(id)?;
                println!(
                    "{:15} {:3} landmarks  depth={}  model={}",
                    schema.id,
                    schema.len(),
                    schema.has_depth,
                    schema.model
                );
            }
        }
    }
    Ok(())
}
