//! `adcg-ir` holds the operation graph recorded while tracing an algorithmic
//! differentiation model, the analysis that schedules it for source
//! generation, and the index-pattern detection used to fold repeated
//! equations into loops.
//!
//! ## Examples
//!
//! ```rust
//! use adcg_ir::{Analyzer, AnalyzerOptions, DefaultBinding, Graph, OpKind, Operand, VariableBinding};
//!
//! let mut graph = Graph::new();
//! let x0 = graph.add_independent();
//! let x1 = graph.add_independent();
//! let t = graph.binary(OpKind::Mul, x0, x1).unwrap();
//! let y0 = graph.unary(OpKind::Cos, t).unwrap();
//! let y1 = graph.binary(OpKind::Add, t, 1.0).unwrap();
//!
//! let schedule = Analyzer::new(AnalyzerOptions::default())
//!     .analyze(&graph, &[Operand::Node(y0), Operand::Node(y1)], &DefaultBinding)
//!     .unwrap();
//!
//! assert_eq!(schedule.binding(&graph, t), VariableBinding::Temporary(0));
//! assert_eq!(schedule.binding(&graph, y1), VariableBinding::Dependent(1));
//! ```
mod config;
mod error;
mod graph;
mod node;
mod op;
mod schedule;

pub mod debug;
pub mod loops;
pub mod pattern;

pub use config::{AnalyzerOptions, DEFAULT_MIN_SECTION_SIZE};
pub use error::GraphError;
pub use graph::Graph;
pub use loops::{BodyNode, BodyOperand, LoopDetector, LoopEquation, LoopFallback, LoopGroup, LoopInstance, LoopPlan};
pub use node::{Info, Node, NodeId, Operand, Operands};
pub use op::{CompareOp, OpKind};
pub use pattern::{IndexPattern, LinearPattern, Plane2DPattern, SectionedPattern};
pub use schedule::{Analyzer, DefaultBinding, NodeSchedule, OperandBinding, Schedule, VariableBinding};
