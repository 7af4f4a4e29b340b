use approx::assert_relative_eq;
use glam::{Quat, Vec3};
use handshape_icp::{PcaSolver, PointSetTransformSolver, ScaleMode};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_points(rng: &mut StdRng, n: usize) -> Vec<Vec3> {
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            )
        })
        .collect()
}

#[test]
fn two_points_rotate_x_onto_y_with_scale_two() -> Result<(), Box<dyn std::error::Error>> {
    let input = [Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)];
    let target = [Vec3::ZERO, Vec3::X];

    let solver = PointSetTransformSolver::new(ScaleMode::Uniform);
    let estimate = solver.solve(&input, &target, None)?;

    let mapped = estimate.rotation * Vec3::X;
    assert_relative_eq!(mapped.x, 0.0, epsilon = 1e-6);
    assert_relative_eq!(mapped.y, 1.0, epsilon = 1e-6);
    assert_relative_eq!(mapped.z, 0.0, epsilon = 1e-6);
    assert_relative_eq!(estimate.scale.x, 2.0, epsilon = 1e-6);
    assert_eq!(estimate.scale.x, estimate.scale.y);
    assert_eq!(estimate.scale.y, estimate.scale.z);

    for (x, y) in input.iter().zip(&target) {
        let mapped = estimate.transform_point(*y);
        assert_relative_eq!(mapped.distance(*x), 0.0, epsilon = 1e-5);
    }
    Ok(())
}

#[test]
fn rigid_transform_is_recovered() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(11);
    let solver = PointSetTransformSolver::default();

    for _ in 0..10 {
        let points = random_points(&mut rng, 12);
        let axis = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        )
        .normalize_or(Vec3::Z);
        let rotation = Quat::from_axis_angle(axis, rng.random_range(-3.0..3.0));
        let translation = Vec3::new(
            rng.random_range(-2.0..2.0),
            rng.random_range(-2.0..2.0),
            rng.random_range(-2.0..2.0),
        );
        let moved: Vec<Vec3> = points.iter().map(|p| rotation * *p + translation).collect();

        let estimate = solver.solve(&moved, &points, None)?;
        assert!(estimate.rotation.dot(rotation).abs() > 1.0 - 1e-4);
        assert_relative_eq!(estimate.translation.x, translation.x, epsilon = 1e-3);
        assert_relative_eq!(estimate.translation.y, translation.y, epsilon = 1e-3);
        assert_relative_eq!(estimate.translation.z, translation.z, epsilon = 1e-3);
        assert!(!estimate.reflection);
    }
    Ok(())
}

#[test]
fn pca_follows_rigid_transform() -> Result<(), Box<dyn std::error::Error>> {
    // distinct spreads along each axis so the principal axes are unique up to sign
    let mut rng = StdRng::seed_from_u64(5);
    let points: Vec<Vec3> = (0..200)
        .map(|_| {
            Vec3::new(
                rng.random_range(-3.0..3.0),
                rng.random_range(-1.5..1.5),
                rng.random_range(-0.5..0.5),
            )
        })
        .collect();
    let rotation = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -0.7, 1.1);
    let translation = Vec3::new(1.0, -2.0, 0.5);
    let moved: Vec<Vec3> = points.iter().map(|p| rotation * *p + translation).collect();

    let pca = PcaSolver::default();
    let before = pca.solve(&points)?;
    let after = pca.solve(&moved)?;

    let expected_center = rotation * before.pose.position + translation;
    assert_relative_eq!(after.pose.position.distance(expected_center), 0.0, epsilon = 1e-3);
    assert_relative_eq!(after.moments.x, before.moments.x, epsilon = 1e-3);
    assert_relative_eq!(after.moments.y, before.moments.y, epsilon = 1e-3);

    for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
        let expected = rotation * (before.pose.rotation * axis);
        let actual = after.pose.rotation * axis;
        assert_relative_eq!(expected.dot(actual).abs(), 1.0, epsilon = 1e-3);
    }
    Ok(())
}
