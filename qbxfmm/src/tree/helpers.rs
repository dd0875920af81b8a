//! Helper functions used in testing tree implementations, specifically test point generators.
use rand::prelude::*;

use crate::traits::general::RealScalar;

/// Points fixture for testing, uniformly samples in each axis from min to max.
///
/// # Arguments
/// * `n_points` - The number of points to sample.
/// * `min` - The minimum coordinate value along each axis, defaults to 0.
/// * `max` - The maximum coordinate value along each axis, defaults to 1.
/// * `seed` - Random seed, defaults to 0.
pub fn points_fixture<T: RealScalar + rand::distributions::uniform::SampleUniform>(
    n_points: usize,
    min: Option<T>,
    max: Option<T>,
    seed: Option<u64>,
) -> Vec<[T; 2]> {
    let seed = seed.unwrap_or(0);
    let mut range = StdRng::seed_from_u64(seed);

    let between = if let (Some(min), Some(max)) = (min, max) {
        rand::distributions::Uniform::from(min..max)
    } else {
        rand::distributions::Uniform::from(T::zero()..T::one())
    };

    (0..n_points)
        .map(|_| [between.sample(&mut range), between.sample(&mut range)])
        .collect()
}

/// Points fixture for testing, samples points in an annulus around the origin.
///
/// # Arguments
/// * `n_points` - The number of points to sample.
/// * `inner` - Inner radius of the annulus.
/// * `outer` - Outer radius of the annulus.
/// * `seed` - Random seed.
pub fn points_fixture_annulus<T: RealScalar>(
    n_points: usize,
    inner: f64,
    outer: f64,
    seed: u64,
) -> Vec<[T; 2]> {
    let mut range = StdRng::seed_from_u64(seed);
    let radius = rand::distributions::Uniform::from(inner..outer);
    let angle = rand::distributions::Uniform::from(0.0..std::f64::consts::TAU);

    (0..n_points)
        .map(|_| {
            let r = radius.sample(&mut range);
            let theta = angle.sample(&mut range);
            [T::real(r * theta.cos()), T::real(r * theta.sin())]
        })
        .collect()
}
