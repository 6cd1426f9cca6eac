//! Closed-form index patterns and their detection.
//!
//! A pattern maps one or two integer loop indices to an integer target. The
//! detectors in this module only ever return a pattern that reproduces every
//! observed sample exactly; `None` means the caller has to keep the
//! unrolled form.

mod linear;
mod plane;
mod sectioned;

pub use linear::detect_linear;
pub use plane::{detect_plane_2d, detect_plane_2d_with_sections};
pub use sectioned::detect_sectioned;

use std::collections::BTreeMap;
use std::fmt;

/// Observed samples, index to target.
pub type Observations = BTreeMap<i64, i64>;

/// Observed samples of a two-dimensional domain, `x -> (y -> z)`.
pub type PlaneObservations = BTreeMap<i64, BTreeMap<i64, i64>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexPattern {
    Constant(i64),
    Linear(LinearPattern),
    Sectioned(SectionedPattern),
    Plane2D(Plane2DPattern),
}

/// `floor((x - x_offset) / dx) * dy + b` with `dx > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearPattern {
    pub x_offset: i64,
    pub dy: i64,
    pub dx: i64,
    pub b: i64,
}

/// Contiguous regions, each starting at the given index and extending up to
/// the start of the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionedPattern {
    pub sections: Vec<(i64, IndexPattern)>,
}

/// `f1(x) + f2(y)`; an absent component contributes zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane2DPattern {
    pub x: Option<Box<IndexPattern>>,
    pub y: Option<Box<IndexPattern>>,
}

impl LinearPattern {
    /// `dy * x + b`
    pub fn new(dy: i64, b: i64) -> Self {
        Self {
            x_offset: 0,
            dy,
            dx: 1,
            b,
        }
    }

    pub fn evaluate(&self, x: i64) -> i64 {
        (x - self.x_offset).div_euclid(self.dx) * self.dy + self.b
    }

    fn render(&self, x: &str) -> String {
        let base = match self.x_offset {
            0 => x.to_string(),
            offset if offset > 0 => format!("({} - {})", x, offset),
            offset => format!("({} + {})", x, -offset),
        };

        let scaled = match (self.dx, self.dy) {
            (_, 0) => String::new(),
            (1, 1) => base,
            (1, -1) => format!("-{}", base),
            (1, dy) => format!("{} * {}", dy, base),
            (dx, 1) => format!("{} / {}", base, dx),
            (dx, dy) => format!("{} / {} * {}", base, dx, dy),
        };

        match (scaled.is_empty(), self.b) {
            (true, b) => b.to_string(),
            (false, 0) => scaled,
            (false, b) if b > 0 => format!("{} + {}", scaled, b),
            (false, b) => format!("{} - {}", scaled, -b),
        }
    }
}

impl SectionedPattern {
    fn section_for(&self, x: i64) -> Option<&IndexPattern> {
        self.sections
            .iter()
            .take_while(|(start, _)| *start <= x)
            .last()
            .or_else(|| self.sections.first())
            .map(|(_, pattern)| pattern)
    }
}

impl IndexPattern {
    /// Evaluates the pattern. One-dimensional patterns ignore `y`.
    pub fn evaluate(&self, x: i64, y: i64) -> i64 {
        match self {
            IndexPattern::Constant(value) => *value,
            IndexPattern::Linear(linear) => linear.evaluate(x),
            IndexPattern::Sectioned(sectioned) => sectioned
                .section_for(x)
                .map(|pattern| pattern.evaluate(x, y))
                .unwrap_or_default(),
            IndexPattern::Plane2D(plane) => {
                plane.x.as_ref().map(|p| p.evaluate(x, 0)).unwrap_or_default()
                    + plane.y.as_ref().map(|p| p.evaluate(y, 0)).unwrap_or_default()
            }
        }
    }

    /// Renders the pattern as a C integer expression over the index
    /// variables `x` and `y`. A missing `y` renders as the literal `0`.
    pub fn render(&self, x: &str, y: Option<&str>) -> String {
        match self {
            IndexPattern::Constant(value) => value.to_string(),
            IndexPattern::Linear(linear) => linear.render(x),
            IndexPattern::Sectioned(sectioned) => {
                let mut sections = sectioned.sections.iter().rev();
                let Some((_, last)) = sections.next() else {
                    return "0".to_string();
                };
                let mut rendered = last.render(x, y);
                let mut next_start = sectioned.sections.last().map(|(start, _)| *start);

                for (start, pattern) in sections {
                    if let Some(boundary) = next_start {
                        rendered = format!(
                            "({} < {})? {} : {}",
                            x,
                            boundary,
                            parenthesize(pattern.render(x, y)),
                            parenthesize(rendered)
                        );
                    }
                    next_start = Some(*start);
                }
                rendered
            }
            IndexPattern::Plane2D(plane) => {
                let y = y.unwrap_or("0");
                match (&plane.x, &plane.y) {
                    (Some(fx), Some(fy)) => format!(
                        "{} + {}",
                        parenthesize(fx.render(x, None)),
                        parenthesize(fy.render(y, None))
                    ),
                    (Some(fx), None) => fx.render(x, None),
                    (None, Some(fy)) => fy.render(y, None),
                    (None, None) => "0".to_string(),
                }
            }
        }
    }

    /// The same pattern with `offset` added to every result.
    pub fn shifted(&self, offset: i64) -> IndexPattern {
        match self {
            IndexPattern::Constant(value) => IndexPattern::Constant(value + offset),
            IndexPattern::Linear(linear) => IndexPattern::Linear(LinearPattern {
                b: linear.b + offset,
                ..*linear
            }),
            IndexPattern::Sectioned(sectioned) => IndexPattern::Sectioned(SectionedPattern {
                sections: sectioned
                    .sections
                    .iter()
                    .map(|(start, pattern)| (*start, pattern.shifted(offset)))
                    .collect(),
            }),
            IndexPattern::Plane2D(plane) => match (&plane.x, &plane.y) {
                (Some(fx), fy) => IndexPattern::Plane2D(Plane2DPattern {
                    x: Some(Box::new(fx.shifted(offset))),
                    y: fy.clone(),
                }),
                (None, Some(fy)) => IndexPattern::Plane2D(Plane2DPattern {
                    x: None,
                    y: Some(Box::new(fy.shifted(offset))),
                }),
                (None, None) => IndexPattern::Plane2D(Plane2DPattern {
                    x: Some(Box::new(IndexPattern::Constant(offset))),
                    y: None,
                }),
            },
        }
    }

    /// `true` if every sample is reproduced exactly.
    pub fn fits(&self, observations: &Observations) -> bool {
        observations.iter().all(|(&x, &z)| self.evaluate(x, 0) == z)
    }

    /// `true` if every two-dimensional sample is reproduced exactly.
    pub fn fits_plane(&self, observations: &PlaneObservations) -> bool {
        observations
            .iter()
            .all(|(&x, y2z)| y2z.iter().all(|(&y, &z)| self.evaluate(x, y) == z))
    }
}

impl fmt::Display for IndexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render("x", Some("y")))
    }
}

/// Fits a single linear pattern, falling back to sections of at least
/// `min_section_size` samples.
pub fn detect(observations: &Observations, min_section_size: usize) -> Option<IndexPattern> {
    detect_linear(observations).or_else(|| detect_sectioned(observations, min_section_size))
}

fn parenthesize(expr: String) -> String {
    if expr.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        expr
    } else {
        format!("({})", expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn linear(x_offset: i64, dy: i64, dx: i64, b: i64) -> IndexPattern {
        IndexPattern::Linear(LinearPattern { x_offset, dy, dx, b })
    }

    #[rstest]
    #[case(IndexPattern::Constant(4), "4")]
    #[case(linear(0, 1, 1, 0), "j")]
    #[case(linear(0, 2, 1, 1), "2 * j + 1")]
    #[case(linear(0, -1, 1, 5), "-j + 5")]
    #[case(linear(0, 3, 1, -2), "3 * j - 2")]
    #[case(linear(1, 1, 2, 0), "(j - 1) / 2")]
    #[case(linear(-1, 3, 2, 4), "(j + 1) / 2 * 3 + 4")]
    #[case(
        IndexPattern::Sectioned(SectionedPattern {
            sections: vec![(0, IndexPattern::Constant(7)), (3, linear(0, 2, 1, 0)), (6, IndexPattern::Constant(1))]
        }),
        "(j < 3)? 7 : ((j < 6)? (2 * j) : 1)"
    )]
    #[case(
        IndexPattern::Plane2D(Plane2DPattern {
            x: Some(Box::new(linear(0, 4, 1, 0))),
            y: Some(Box::new(linear(0, 1, 1, 1))),
        }),
        "(4 * j) + (k + 1)"
    )]
    fn test_render(#[case] pattern: IndexPattern, #[case] expected: &str) {
        assert_eq!(pattern.render("j", Some("k")), expected);
    }

    #[rstest]
    #[case(linear(0, 2, 1, 1), 3, 0, 7)]
    #[case(linear(1, 3, 2, 4), 1, 0, 4)]
    #[case(linear(1, 3, 2, 4), 4, 0, 7)]
    #[case(
        IndexPattern::Sectioned(SectionedPattern {
            sections: vec![(0, IndexPattern::Constant(7)), (3, linear(0, 2, 1, 0))]
        }),
        4, 0, 8
    )]
    #[case(
        IndexPattern::Plane2D(Plane2DPattern {
            x: Some(Box::new(linear(0, 4, 1, 0))),
            y: Some(Box::new(linear(0, 1, 1, 1))),
        }),
        2, 3, 12
    )]
    fn test_evaluate(#[case] pattern: IndexPattern, #[case] x: i64, #[case] y: i64, #[case] expected: i64) {
        assert_eq!(pattern.evaluate(x, y), expected);
    }

    #[test]
    fn test_shifted() {
        let pattern = IndexPattern::Sectioned(SectionedPattern {
            sections: vec![(0, IndexPattern::Constant(1)), (2, linear(0, 1, 1, 0))],
        });
        let shifted = pattern.shifted(10);

        for x in 0..5 {
            assert_eq!(shifted.evaluate(x, 0), pattern.evaluate(x, 0) + 10);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(linear(0, 2, 1, 0).to_string(), "2 * x");
    }
}
