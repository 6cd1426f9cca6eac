use super::{IndexPattern, Observations, SectionedPattern, detect_linear};

/// Splits the samples into maximal contiguous runs that each fit a linear
/// pattern.
///
/// A single run is returned as its own pattern. When the samples split into
/// several runs, every run must hold at least `min_section_size` samples,
/// otherwise the slope of the short run is not trusted and there is no fit.
pub fn detect_sectioned(observations: &Observations, min_section_size: usize) -> Option<IndexPattern> {
    let mut runs: Vec<(Observations, IndexPattern)> = Vec::new();
    let mut current = Observations::new();
    let mut pattern: Option<IndexPattern> = None;

    for (&x, &y) in observations {
        if pattern.as_ref().is_some_and(|p| p.evaluate(x, 0) == y) {
            current.insert(x, y);
            continue;
        }

        current.insert(x, y);
        match detect_linear(&current) {
            Some(extended) => pattern = Some(extended),
            None => {
                current.remove(&x);
                if let Some(closed) = pattern.take() {
                    runs.push((std::mem::take(&mut current), closed));
                }
                current.insert(x, y);
                pattern = Some(IndexPattern::Constant(y));
            }
        }
    }

    if let Some(last) = pattern {
        runs.push((current, last));
    }

    if runs.len() <= 1 {
        return runs.pop().map(|(_, pattern)| pattern);
    }

    if runs.iter().any(|(samples, _)| samples.len() < min_section_size) {
        return None;
    }

    let sectioned = IndexPattern::Sectioned(SectionedPattern {
        sections: runs
            .into_iter()
            .filter_map(|(samples, pattern)| samples.first_key_value().map(|(&start, _)| (start, pattern)))
            .collect(),
    });

    sectioned.fits(observations).then_some(sectioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::LinearPattern;
    use rstest::rstest;

    fn observations(samples: &[(i64, i64)]) -> Observations {
        samples.iter().copied().collect()
    }

    #[rstest]
    #[case::empty(&[], 2, None)]
    #[case::single_run(&[(0, 1), (1, 2), (2, 3)], 2, Some(IndexPattern::Linear(LinearPattern::new(1, 1))))]
    #[case::single_short_run(&[(5, 9)], 3, Some(IndexPattern::Constant(9)))]
    #[case::two_runs(
        &[(0, 0), (1, 2), (2, 4), (3, 10), (4, 11), (5, 12)],
        2,
        Some(IndexPattern::Sectioned(SectionedPattern {
            sections: vec![
                (0, IndexPattern::Linear(LinearPattern::new(2, 0))),
                (3, IndexPattern::Linear(LinearPattern::new(1, 7))),
            ]
        }))
    )]
    #[case::short_trailing_run(&[(0, 0), (1, 2), (2, 4), (3, 100)], 2, None)]
    #[case::minimum_not_met(&[(0, 0), (1, 2), (2, 4), (3, 10), (4, 11)], 3, None)]
    fn test_detect_sectioned(
        #[case] samples: &[(i64, i64)],
        #[case] min_section_size: usize,
        #[case] expected: Option<IndexPattern>,
    ) {
        assert_eq!(detect_sectioned(&observations(samples), min_section_size), expected);
    }

    #[test]
    fn test_constant_then_linear() {
        let samples = observations(&[(0, 7), (1, 7), (2, 7), (3, 9), (4, 11), (5, 13), (6, 15)]);
        let pattern = detect_sectioned(&samples, 2).unwrap();

        assert!(pattern.fits(&samples));
        assert!(matches!(pattern, IndexPattern::Sectioned(ref s) if s.sections.len() == 2));
    }
}
