//! `adcg-lang` turns an analyzed [`adcg_ir::Graph`] into source code.
//!
//! A [`CodeHandler`] runs the lifetime analysis, verifies the requested loop
//! groups and hands the result to a [`Language`] backend together with a
//! [`VariableNameGenerator`].
//!
//! ## Examples
//!
//! ```rust
//! use adcg_ir::{Graph, OpKind, Operand};
//! use adcg_lang::{CLanguage, CodeHandler, CodegenInput, DefaultNameGenerator};
//!
//! let mut graph = Graph::new();
//! let x0 = graph.add_independent();
//! let x1 = graph.add_independent();
//! let y = graph.binary(OpKind::Mul, x0, x1).unwrap();
//!
//! let generated = CodeHandler::default()
//!     .generate(
//!         &graph,
//!         &CodegenInput::new([Operand::Node(y)]),
//!         &CLanguage::default(),
//!         &DefaultNameGenerator::default(),
//!     )
//!     .unwrap();
//!
//! assert_eq!(generated.source, "y[0] = x[0] * x[1];\n");
//! ```
mod config;
mod error;
mod handler;
mod lang_c;
mod lang_latex;
mod language;
mod name_gen;

pub use config::CodegenConfig;
pub use error::{ConfigError, EmitError};
pub use handler::{AtomicCallSite, CodeHandler, CodegenInput, GeneratedSource};
pub use lang_c::{CLanguage, CLanguageConfig};
pub use lang_latex::LatexLanguage;
pub use language::{GenerationData, Language, OperandValue};
pub use name_gen::{CustomNameGenerator, DefaultNameGenerator, LatexNameGenerator, VariableNameGenerator};
