use crate::error::ConfigError;
use crate::lang_c::CLanguageConfig;
use adcg_ir::AnalyzerOptions;
use serde::{Deserialize, Serialize};

/// Configuration of one code generation run.
///
/// ```toml
/// detect-loops = true
///
/// [analyzer]
/// reuse-ids = true
/// min-section-size = 2
///
/// [c]
/// indent-width = 4
/// function-name = "model"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CodegenConfig {
    pub analyzer: AnalyzerOptions,
    /// Fold verified loop groups into loops for languages that support them.
    pub detect_loops: bool,
    pub c: CLanguageConfig,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerOptions::default(),
            detect_loops: true,
            c: CLanguageConfig::default(),
        }
    }
}

impl CodegenConfig {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}
