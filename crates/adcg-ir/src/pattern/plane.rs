use super::{IndexPattern, Observations, Plane2DPattern, PlaneObservations, detect};
use crate::config::DEFAULT_MIN_SECTION_SIZE;

/// Detects `z = f1(x) + f2(y)` from `x -> (y -> z)` samples.
pub fn detect_plane_2d(x2y2z: &PlaneObservations) -> Option<IndexPattern> {
    detect_plane_2d_with_sections(x2y2z, DEFAULT_MIN_SECTION_SIZE)
}

/// [`detect_plane_2d`] with an explicit minimum section size for the
/// per-axis fits.
///
/// Whenever the second axis resolves to a constant, the constant is folded
/// into the first axis and the second axis is dropped. The result is checked
/// against every sample before it is returned.
pub fn detect_plane_2d_with_sections(x2y2z: &PlaneObservations, min_section_size: usize) -> Option<IndexPattern> {
    let samples: PlaneObservations = x2y2z
        .iter()
        .filter(|(_, y2z)| !y2z.is_empty())
        .map(|(x, y2z)| (*x, y2z.clone()))
        .collect();

    let plane = if samples.len() == 1 {
        let (_, y2z) = samples.first_key_value()?;
        Plane2DPattern {
            x: None,
            y: Some(Box::new(detect(y2z, min_section_size)?)),
        }
    } else if let Some(x2z) = single_shared_y(&samples) {
        Plane2DPattern {
            x: Some(Box::new(detect(&x2z, min_section_size)?)),
            y: None,
        }
    } else {
        let mut x2z_start = Observations::new();
        let mut y2z_offset = Observations::new();

        for (&x, y2z) in &samples {
            let (_, &z_start) = y2z.first_key_value()?;
            x2z_start.insert(x, z_start);

            for (&y, &z) in y2z {
                let offset = z - z_start;
                if *y2z_offset.entry(y).or_insert(offset) != offset {
                    return None;
                }
            }
        }

        let fx = detect(&x2z_start, min_section_size)?;
        let fy = detect(&y2z_offset, min_section_size)?;

        match fy {
            IndexPattern::Constant(offset) => Plane2DPattern {
                x: Some(Box::new(fx.shifted(offset))),
                y: None,
            },
            fy => Plane2DPattern {
                x: Some(Box::new(fx)),
                y: Some(Box::new(fy)),
            },
        }
    };

    let pattern = IndexPattern::Plane2D(plane);
    pattern.fits_plane(&samples).then_some(pattern)
}

/// `x -> z` when every `x` is observed at exactly one and the same `y`.
fn single_shared_y(samples: &PlaneObservations) -> Option<Observations> {
    let mut shared = None;
    let mut x2z = Observations::new();

    for (&x, y2z) in samples {
        if y2z.len() != 1 {
            return None;
        }
        let (&y, &z) = y2z.first_key_value()?;
        if *shared.get_or_insert(y) != y {
            return None;
        }
        x2z.insert(x, z);
    }

    Some(x2z)
}
