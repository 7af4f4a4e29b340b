use argh::FromArgs;
use glam::{Quat, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

use handshape::icp::{
    coverage::coverage_error, IcpConfig, IcpSolver, IcpStatus, LineShape, SampleBuffer,
    ScaleMode, Shape, SplineCurve,
};
use handshape::linalg::Pose;
use handshape::pose::{PoseConfiguration, PoseEvaluator};

#[derive(FromArgs)]
/// Trace a noisy, transformed copy of a reference shape and recover the alignment
struct Args {
    /// reference shape: circle, rectangle, arrow or triangle
    #[argh(option, short = 's', default = "String::from(\"circle\")")]
    shape: String,

    /// uniform scale of the traced copy
    #[argh(option, default = "1.3")]
    scale: f32,

    /// standard deviation of the tracking noise
    #[argh(option, default = "0.002")]
    noise: f32,

    /// match threshold; also the sample spacing along the traced curve
    #[argh(option, default = "0.01")]
    threshold: f32,

    /// ICP steps per simulated frame
    #[argh(option, default = "2")]
    steps_per_frame: usize,

    /// random seed
    #[argh(option, default = "42")]
    seed: u64,
}

fn reference_shape(name: &str) -> Result<LineShape, Box<dyn std::error::Error>> {
    let shape = match name {
        "circle" => LineShape::circle(0.2, 16),
        "rectangle" => LineShape::rectangle(0.4, 0.2),
        "arrow" => LineShape::arrow(0.3, 0.2),
        "triangle" => LineShape::triangle(
            Vec3::new(-0.15, -0.1, 0.0),
            Vec3::new(0.15, -0.1, 0.0),
            Vec3::new(0.0, 0.15, 0.0),
        ),
        other => return Err(format!("unknown shape '{other}'").into()),
    };
    Ok(shape)
}

fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f32 = 1.0 - rng.random::<f32>();
    let u2: f32 = rng.random::<f32>();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let shape = reference_shape(&args.shape)?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    let axis = Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    )
    .normalize_or(Vec3::Z);
    let pose = Pose::new(
        Vec3::new(
            rng.random_range(-0.2..0.2),
            rng.random_range(-0.2..0.2),
            rng.random_range(-0.2..0.2),
        ),
        Quat::from_axis_angle(axis, rng.random_range(-0.8..0.8)),
    );
    println!("Applied pose: {pose:?}, scale {}", args.scale);

    // simulate a tracked fingertip moving along the shape at 60 Hz
    let mut trace = SampleBuffer::new();
    shape.generate_samples(args.threshold * 0.5, &mut trace);
    trace.transform_scaled(&pose, Vec3::splat(args.scale));

    let mut curve = SplineCurve::new();
    for (i, point) in trace.samples.iter().enumerate() {
        let jitter = Vec3::new(gaussian(&mut rng), gaussian(&mut rng), gaussian(&mut rng));
        curve.append(*point + jitter * args.noise, i as f32 / 60.0);
    }
    let now = curve.control_points().last().map_or(0.0, |cp| cp.timestamp);
    let pruned = curve.prune(now, 10.0, 30.0);
    println!(
        "Traced curve: #{} control points, arc length {:.3}, pruned {pruned}",
        curve.len(),
        curve.arc_length()
    );

    let mut samples = SampleBuffer::new();
    curve.generate_samples(args.threshold, &mut samples);

    let mut solver = IcpSolver::new(IcpConfig {
        scale_mode: ScaleMode::Uniform,
        ..Default::default()
    });
    solver.init_with_shape(&samples.samples, &shape);

    let mut frame = 0;
    loop {
        let status = solver.solve_with_budget(args.steps_per_frame)?;
        frame += 1;
        println!(
            "frame {frame}: iteration {} mse {:.3e}",
            solver.iterations(),
            solver.mean_square_error()
        );
        if status != IcpStatus::Iterating {
            println!("ICP finished: {status:?}");
            break;
        }
    }

    let threshold_sq = args.threshold * args.threshold;
    let coverage = coverage_error(
        &shape,
        &curve,
        &solver.target_offset(),
        solver.target_scale(),
        args.threshold,
    )?;
    let matched = solver.has_found_local_optimum()
        && solver.mean_square_error() <= threshold_sq
        && coverage <= threshold_sq;

    println!("Recovered pose: {:?}", solver.target_offset());
    println!("Recovered scale: {}", solver.target_scale());
    println!("Coverage error: {coverage:.3e}");
    println!("Matched: {matched}");

    // fixed-correspondence check on the shape vertices
    let vertices: Vec<Vec3> = shape.segments().iter().map(|s| s.start).collect();
    let config = PoseConfiguration::uniform(
        vertices.iter().map(|v| *v * args.scale).collect(),
    );
    let observed: Vec<Vec3> = config
        .targets()
        .iter()
        .map(|v| pose.transform_point(*v))
        .collect();
    let pose_match = PoseEvaluator::new().evaluate_pose(&observed, &config)?;
    log::info!(
        "vertex pose match condition number {:.2}",
        pose_match.condition_number
    );
    println!("Vertex pose match: {:?}", pose_match.offset);

    Ok(())
}
