//! Constructor for a square Domain.
use crate::{
    traits::general::RealScalar,
    tree::{constants::DOMAIN_PADDING, types::Domain},
};

impl<T> Domain<T>
where
    T: RealScalar,
{
    /// Create a domain from its lower left corner and side length.
    pub fn new(origin: &[T; 2], side_length: T) -> Self {
        Self {
            origin: *origin,
            side_length,
        }
    }

    /// Compute the square domain enclosing a set of points. The domain is padded on each side so
    /// that no point lies on its boundary, ensuring a well defined Morton encoding. An empty point set
    /// yields the unit square, a single point a unit square centred on it.
    ///
    /// # Arguments
    /// * `points` - Point coordinates.
    pub fn from_local_points<'a, I>(points: I) -> Domain<T>
    where
        I: IntoIterator<Item = &'a [T; 2]>,
    {
        let mut min = [T::infinity(); 2];
        let mut max = [T::neg_infinity(); 2];
        let mut any = false;

        for point in points {
            any = true;
            for i in 0..2 {
                min[i] = min[i].min(point[i]);
                max[i] = max[i].max(point[i]);
            }
        }

        if !any {
            return Domain::new(&[T::zero(), T::zero()], T::one());
        }

        // Want a square box to place everything in
        let side_length = (max[0] - min[0]).max(max[1] - min[1]);

        if side_length <= T::zero() {
            let half = T::real(0.5);
            return Domain::new(&[min[0] - half, min[1] - half], T::one());
        }

        let err = side_length * T::real(DOMAIN_PADDING);
        let two = T::real(2.0);

        Domain {
            origin: [min[0] - err, min[1] - err],
            side_length: side_length + two * err,
        }
    }

    /// Find the smallest square domain containing both this domain and another.
    ///
    /// # Arguments
    /// * `other` - Other domain with which to find the union.
    pub fn union(&self, other: &Self) -> Self {
        let origin = [
            self.origin[0].min(other.origin[0]),
            self.origin[1].min(other.origin[1]),
        ];

        let upper = [
            (self.origin[0] + self.side_length).max(other.origin[0] + other.side_length),
            (self.origin[1] + self.side_length).max(other.origin[1] + other.side_length),
        ];

        let side_length = (upper[0] - origin[0]).max(upper[1] - origin[1]);

        Domain {
            origin,
            side_length,
        }
    }

    /// Test whether a point lies in the closed domain.
    pub fn contains(&self, point: &[T; 2]) -> bool {
        (0..2).all(|i| {
            point[i] >= self.origin[i] && point[i] <= self.origin[i] + self.side_length
        })
    }
}
