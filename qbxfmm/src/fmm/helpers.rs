//! Helper functions shared by the FMM backends and the driver.
use std::time::{Duration, Instant};

/// Run a closure, measuring its wall time when `timed` is set.
///
/// # Arguments
/// * `timed` - Whether to measure.
/// * `f` - Closure to run.
pub fn optionally_time<F, R>(timed: bool, f: F) -> (R, Option<Duration>)
where
    F: FnOnce() -> R,
{
    if timed {
        let start = Instant::now();
        let result = f();
        (result, Some(start.elapsed()))
    } else {
        (f(), None)
    }
}

/// Euclidean algorithm to find greatest divisor of `n` less than or equal to `max`
///
/// # Arguments
/// * `max` - The maximum chunk size
pub fn chunk_size(n: usize, max: usize) -> usize {
    for divisor in (1..=max).rev() {
        if n % divisor == 0 {
            return divisor;
        }
    }
    1
}

/// Split a mutable slice into consecutive pieces delimited by `starts`, each entry of which counts
/// blocks of `stride` elements.
///
/// Piece `i` covers blocks `starts[i]..starts[i + 1]`, elements before `starts[0]` are skipped.
///
/// # Arguments
/// * `data` - Slice to split.
/// * `starts` - Non decreasing block offsets, one more than the number of pieces.
/// * `stride` - Number of elements per block.
pub fn split_by_starts<'a, X>(data: &'a mut [X], starts: &[usize], stride: usize) -> Vec<&'a mut [X]> {
    let mut result = Vec::with_capacity(starts.len().saturating_sub(1));
    let skip = starts.first().map_or(0, |&s| s * stride);
    let (_, mut rest) = data.split_at_mut(skip);

    for window in starts.windows(2) {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut((window[1] - window[0]) * stride);
        result.push(head);
        rest = tail;
    }

    result
}

/// Squared Euclidean distance between two points.
pub fn distance_squared<T: num::Float>(a: &[T; 2], b: &[T; 2]) -> T {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_chunk_size() {
        assert_eq!(chunk_size(12, 5), 4);
        assert_eq!(chunk_size(7, 5), 1);
        assert_eq!(chunk_size(10, 1), 1);
    }

    #[test]
    fn test_split_by_starts() {
        let mut data = (0..12).collect::<Vec<usize>>();
        let pieces = split_by_starts(&mut data, &[1, 2, 2, 5], 2);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0], &[2, 3]);
        assert!(pieces[1].is_empty());
        assert_eq!(pieces[2], &[4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_optionally_time() {
        let (value, duration) = optionally_time(false, || 3);
        assert_eq!(value, 3);
        assert!(duration.is_none());

        let (value, duration) = optionally_time(true, || 4);
        assert_eq!(value, 4);
        assert!(duration.is_some());
    }
}
