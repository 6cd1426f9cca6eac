use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_SECTION_SIZE: usize = 2;

/// Knobs of the evaluation-order and lifetime analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnalyzerOptions {
    /// Recycle temporary slots once their value is fully consumed.
    pub reuse_ids: bool,
    /// Render single-use scalar values inside their consumer instead of
    /// binding them to a temporary.
    pub inline_single_use: bool,
    /// Smallest run accepted when a loop index map splits into sections.
    pub min_section_size: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            reuse_ids: true,
            inline_single_use: false,
            min_section_size: DEFAULT_MIN_SECTION_SIZE,
        }
    }
}

impl AnalyzerOptions {
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", AnalyzerOptions::default())]
    #[case("reuse-ids = false", AnalyzerOptions { reuse_ids: false, ..Default::default() })]
    #[case(
        "inline-single-use = true\nmin-section-size = 3",
        AnalyzerOptions { inline_single_use: true, min_section_size: 3, ..Default::default() }
    )]
    fn test_from_toml(#[case] source: &str, #[case] expected: AnalyzerOptions) {
        assert_eq!(AnalyzerOptions::from_toml(source).unwrap(), expected);
    }

    #[test]
    fn test_from_toml_rejects_wrong_type() {
        assert!(AnalyzerOptions::from_toml("reuse-ids = 3").is_err());
    }
}
