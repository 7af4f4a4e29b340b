use approx::assert_relative_eq;
use glam::{Quat, Vec3};
use handshape_icp::{
    coverage::coverage_error, IcpConfig, IcpSolver, IcpStatus, LineShape, SampleBuffer,
    ScaleMode, Shape, SplineCurve,
};
use handshape_linalg::Pose;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Standard normal sample via the Box–Muller transform.
fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f32 = 1.0 - rng.random::<f32>();
    let u2: f32 = rng.random::<f32>();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

fn noise(rng: &mut StdRng, sigma: f32) -> Vec3 {
    Vec3::new(gaussian(rng), gaussian(rng), gaussian(rng)) * sigma
}

#[test]
fn circle_with_uniform_scale_and_noise() -> Result<(), Box<dyn std::error::Error>> {
    let shape = LineShape::circle(0.2, 16);

    let axis = Vec3::new(1.0, 2.0, 3.0).normalize();
    let rotation = Quat::from_axis_angle(axis, 37f32.to_radians());
    let translation = Vec3::new(0.05, -0.1, 0.02);
    let scale = 1.3;

    let mut rng = StdRng::seed_from_u64(7);
    let points: Vec<Vec3> = shape
        .segments()
        .iter()
        .map(|s| rotation * (s.start * scale) + translation + noise(&mut rng, 0.002))
        .collect();
    assert_eq!(points.len(), 16);

    let mut solver = IcpSolver::new(IcpConfig {
        scale_mode: ScaleMode::Uniform,
        ..Default::default()
    });
    solver.init_with_shape(&points, &shape);
    let status = solver.solve()?;

    assert_ne!(status, IcpStatus::Iterating);
    assert!(solver.iterations() <= 30);
    assert!(solver.mean_square_error() <= 0.01 * 0.01);

    let position = solver.target_offset().position;
    assert!(position.distance(translation) < 0.01, "position {position}");
    assert_relative_eq!(solver.target_scale().x, scale, epsilon = 0.05);
    assert_eq!(solver.target_scale().x, solver.target_scale().z);
    Ok(())
}

#[test]
fn empty_input_terminates_immediately() -> Result<(), Box<dyn std::error::Error>> {
    let shape = LineShape::circle(0.2, 16);
    let mut solver = IcpSolver::default();
    solver.init_with_shape(&[], &shape);
    solver.solve()?;
    assert_eq!(solver.iterations(), 0);
    assert_eq!(solver.mean_square_error(), 0.0);
    Ok(())
}

#[test]
fn traced_rectangle_matches_and_covers_shape() -> Result<(), Box<dyn std::error::Error>> {
    let threshold = 0.01;
    let shape = LineShape::rectangle(0.4, 0.2);
    let pose = Pose::new(Vec3::new(0.3, 1.2, -0.4), Quat::from_rotation_y(0.6));

    // trace the full outline, corner to corner
    let mut rng = StdRng::seed_from_u64(3);
    let mut curve = SplineCurve::new();
    let corners: Vec<Vec3> = shape.segments().iter().map(|s| s.start).collect();
    for (i, corner) in corners.iter().chain(corners.first()).enumerate() {
        curve.append(
            pose.transform_point(*corner) + noise(&mut rng, 0.001),
            i as f32 * 0.2,
        );
    }

    let mut samples = SampleBuffer::new();
    curve.generate_samples(threshold, &mut samples);

    let mut solver = IcpSolver::default();
    solver.init_with_shape(&samples.samples, &shape);
    solver.solve()?;
    assert!(solver.has_found_local_optimum());
    assert!(solver.mean_square_error() <= threshold * threshold);

    let coverage = coverage_error(
        &shape,
        &curve,
        &solver.target_offset(),
        solver.target_scale(),
        threshold,
    )?;
    assert!(coverage <= threshold * threshold, "coverage {coverage}");
    assert!(solver.target_offset().position.distance(pose.position) < 0.01);
    Ok(())
}

#[test]
fn half_traced_rectangle_fails_coverage() -> Result<(), Box<dyn std::error::Error>> {
    let threshold = 0.01;
    let shape = LineShape::rectangle(0.4, 0.2);

    let mut curve = SplineCurve::new();
    curve.append(Vec3::new(-0.2, -0.1, 0.0), 0.0);
    curve.append(Vec3::new(0.2, -0.1, 0.0), 0.1);
    curve.append(Vec3::new(0.2, 0.1, 0.0), 0.2);

    let coverage = coverage_error(&shape, &curve, &Pose::IDENTITY, Vec3::ONE, threshold)?;
    assert!(coverage > threshold * threshold);
    Ok(())
}

#[test]
fn solver_is_steppable_per_frame() -> Result<(), Box<dyn std::error::Error>> {
    let shape = LineShape::rectangle(0.4, 0.2);
    let mut samples = SampleBuffer::new();
    shape.generate_samples(0.02, &mut samples);
    samples.transform(&Pose::new(Vec3::X, Quat::from_rotation_z(0.25)));

    let mut solver = IcpSolver::default();
    solver.init_with_shape(&samples.samples, &shape);

    let mut frames = 0;
    while solver.solve_with_budget(2)? == IcpStatus::Iterating {
        frames += 1;
        assert!(frames < 30);
    }
    assert!(solver.mean_square_error() < 1e-6);
    Ok(())
}
