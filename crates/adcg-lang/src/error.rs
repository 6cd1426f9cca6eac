use adcg_ir::{GraphError, NodeId, OpKind};
use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum EmitError {
    #[error("Unknown operation: {kind} (node {node}) has no rendering rule in this language")]
    #[diagnostic(code(adcg::emit::unknown_operation))]
    UnknownOperation { node: NodeId, kind: OpKind },
    #[error("Missing operand binding: operand {operand} of node {node} has no variable")]
    #[diagnostic(
        code(adcg::emit::missing_operand_binding),
        help("the operand must be a value the analyzer bound to a variable slot")
    )]
    MissingOperandBinding { node: NodeId, operand: usize },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
    #[error("Failed to write generated source")]
    #[diagnostic(code(adcg::emit::format))]
    Format(#[from] fmt::Error),
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(adcg::config::invalid))]
    Parse(#[from] toml::de::Error),
}
