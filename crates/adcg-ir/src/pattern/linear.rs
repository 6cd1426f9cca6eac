use super::{IndexPattern, LinearPattern, Observations};

/// Step widths tried per step height once the admissible range is known.
/// Wider ranges are cut off; no fit is always a safe answer.
const MAX_WIDTH_CANDIDATES: i64 = 1 << 12;

/// Fits `floor((x - x_offset) / dx) * dy + b` through every sample.
///
/// A straight line through the first and last sample is tried first. When
/// that fails the samples are treated as a staircase: `dy` must divide every
/// rise from the first sample, the step count of each sample bounds the
/// admissible step widths `dx`, and for each width in those bounds the
/// admissible phases are narrowed sample by sample. All samples sharing one
/// value give a [`IndexPattern::Constant`].
pub fn detect_linear(observations: &Observations) -> Option<IndexPattern> {
    let (&x0, &y0) = observations.first_key_value()?;
    let (&xn, &yn) = observations.last_key_value()?;

    if observations.values().all(|&y| y == y0) {
        return Some(IndexPattern::Constant(y0));
    }

    let rise = yn.checked_sub(y0)?;
    let run = xn.checked_sub(x0)?;

    if rise % run == 0 {
        let dy = rise / run;
        let b = y0.checked_sub(dy.checked_mul(x0)?)?;
        let pattern = IndexPattern::Linear(LinearPattern::new(dy, b));
        if pattern.fits(observations) {
            return Some(pattern);
        }
    }

    // A staircase is monotone, so a zero overall rise cannot be one.
    if rise == 0 {
        return None;
    }

    let common = observations
        .values()
        .try_fold(0, |acc, &y| Some(gcd(acc, y.checked_sub(y0)?.checked_abs()?)))?;

    for step in divisors(common).into_iter().rev() {
        let dy = step * rise.signum();
        let Some(steps) = step_counts(observations, x0, y0, dy) else {
            continue;
        };
        let Some((low, high)) = width_bounds(&steps) else {
            continue;
        };

        for dx in low..=high.min(low.saturating_add(MAX_WIDTH_CANDIDATES)) {
            if let Some(phase) = phase_for(&steps, dx) {
                let pattern = IndexPattern::Linear(LinearPattern {
                    x_offset: x0.checked_sub(phase)?,
                    dy,
                    dx,
                    b: y0,
                });
                if pattern.fits(observations) {
                    return Some(pattern);
                }
            }
        }
    }

    None
}

/// `(x - x0, (y - y0) / dy)` per sample, if every rise is a whole number of
/// non-decreasing steps.
fn step_counts(observations: &Observations, x0: i64, y0: i64, dy: i64) -> Option<Vec<(i64, i64)>> {
    let steps = observations
        .iter()
        .map(|(&x, &y)| {
            let distance = x.checked_sub(x0)?;
            let rise = y.checked_sub(y0)?;
            (rise % dy == 0).then_some((distance, rise / dy))
        })
        .collect::<Option<Vec<_>>>()?;

    steps
        .windows(2)
        .all(|pair| pair[0].1 <= pair[1].1)
        .then_some(steps)
}

/// Range of step widths `dx >= 2` compatible with every sample's step count.
///
/// `floor((d + phase) / dx) == k` with `0 <= phase < dx` needs
/// `dx >= ceil((d + 1) / (k + 1))` and, for `k >= 2`,
/// `dx <= floor((d - 1) / (k - 1))`.
fn width_bounds(steps: &[(i64, i64)]) -> Option<(i64, i64)> {
    let mut low: i128 = 2;
    let mut high: i128 = i128::from(i64::MAX);

    for &(distance, count) in steps {
        let (d, k) = (i128::from(distance), i128::from(count));
        low = low.max((d + 1 + k) / (k + 1));
        if k >= 2 {
            high = high.min((d - 1).div_euclid(k - 1));
        }
        if low > high {
            return None;
        }
    }

    Some((i64::try_from(low).ok()?, i64::try_from(high).ok()?))
}

/// Smallest phase in `0..dx` with `floor((d + phase) / dx) == k` for every sample.
fn phase_for(steps: &[(i64, i64)], dx: i64) -> Option<i64> {
    let dx = i128::from(dx);
    let mut low: i128 = 0;
    let mut high = dx - 1;

    for &(distance, count) in steps {
        let (d, k) = (i128::from(distance), i128::from(count));
        low = low.max(k * dx - d);
        high = high.min((k + 1) * dx - 1 - d);
        if low > high {
            return None;
        }
    }

    i64::try_from(low).ok()
}

fn divisors(n: i64) -> Vec<i64> {
    let mut small = Vec::new();
    let mut large = Vec::new();
    let mut i = 1;

    while i <= n / i {
        if n % i == 0 {
            small.push(i);
            if i != n / i {
                large.push(n / i);
            }
        }
        i += 1;
    }

    small.extend(large.into_iter().rev());
    small
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn observations(samples: &[(i64, i64)]) -> Observations {
        samples.iter().copied().collect()
    }

    #[rstest]
    #[case::empty(&[], None)]
    #[case::single(&[(4, 9)], Some(IndexPattern::Constant(9)))]
    #[case::constant(&[(0, 3), (1, 3), (5, 3)], Some(IndexPattern::Constant(3)))]
    #[case::integer_slope(&[(0, 1), (1, 3), (2, 5), (3, 7)], Some(IndexPattern::Linear(LinearPattern::new(2, 1))))]
    #[case::negative_slope(&[(1, 10), (2, 7), (4, 1)], Some(IndexPattern::Linear(LinearPattern::new(-3, 13))))]
    #[case::deviating(&[(0, 0), (1, 1), (2, 5), (3, 3)], None)]
    #[case::half_slope(
        &[(0, 0), (1, 0), (2, 1), (3, 1), (4, 2), (5, 2)],
        Some(IndexPattern::Linear(LinearPattern { x_offset: 0, dy: 1, dx: 2, b: 0 }))
    )]
    #[case::shifted_phase(
        &[(0, 5), (1, 8), (2, 8), (3, 11), (4, 11)],
        Some(IndexPattern::Linear(LinearPattern { x_offset: -1, dy: 3, dx: 2, b: 5 }))
    )]
    fn test_detect_linear(#[case] samples: &[(i64, i64)], #[case] expected: Option<IndexPattern>) {
        assert_eq!(detect_linear(&observations(samples)), expected);
    }

    #[test]
    fn test_detected_pattern_reproduces_samples() {
        let samples = observations(&[(3, 1), (6, 3), (9, 5), (12, 7)]);
        let pattern = detect_linear(&samples).unwrap();
        assert!(pattern.fits(&samples));
    }

    #[test]
    fn test_staircase_prefers_widest_step() {
        let samples = observations(&[(0, 0), (1, 0), (2, 2), (3, 2), (4, 4)]);
        assert_eq!(
            detect_linear(&samples),
            Some(IndexPattern::Linear(LinearPattern {
                x_offset: 0,
                dy: 2,
                dx: 2,
                b: 0
            }))
        );
    }

    #[rstest]
    #[case::wide_step(
        &[(0, 0), (1_000_000_000_000, 1)],
        Some(IndexPattern::Linear(LinearPattern { x_offset: -1, dy: 1, dx: 500_000_000_001, b: 0 }))
    )]
    #[case::full_span(
        &[(0, 0), (i64::MAX, 1)],
        Some(IndexPattern::Linear(LinearPattern { x_offset: 0, dy: 1, dx: 1 << 62, b: 0 }))
    )]
    #[case::overflowing_span(&[(i64::MIN, 0), (i64::MAX, 1)], None)]
    fn test_sparse_samples(#[case] samples: &[(i64, i64)], #[case] expected: Option<IndexPattern>) {
        assert_eq!(detect_linear(&observations(samples)), expected);
    }

    #[rstest]
    #[case::single_step(&[(0, 0), (9, 1)], Some((5, i64::MAX)))]
    #[case::two_steps(&[(0, 0), (3, 1), (6, 2)], Some((3, 5)))]
    #[case::too_dense(&[(0, 0), (1, 1), (2, 2)], None)]
    fn test_width_bounds(#[case] steps: &[(i64, i64)], #[case] expected: Option<(i64, i64)>) {
        assert_eq!(width_bounds(steps), expected);
    }

    #[test]
    fn test_non_monotone_has_no_fit() {
        let samples = observations(&[(0, 0), (1, 2), (2, 0)]);
        assert_eq!(detect_linear(&samples), None);
    }

    #[rstest]
    #[case(0, 5, 5)]
    #[case(12, 18, 6)]
    #[case(7, 3, 1)]
    fn test_gcd(#[case] a: i64, #[case] b: i64, #[case] expected: i64) {
        assert_eq!(gcd(a, b), expected);
    }

    #[rstest]
    #[case(1, vec![1])]
    #[case(12, vec![1, 2, 3, 4, 6, 12])]
    #[case(9, vec![1, 3, 9])]
    fn test_divisors(#[case] n: i64, #[case] expected: Vec<i64>) {
        assert_eq!(divisors(n), expected);
    }
}
