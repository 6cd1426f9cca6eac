use crate::node::NodeId;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum GraphError {
    #[error("Invalid graph: {0}")]
    #[diagnostic(
        code(adcg::graph::invalid),
        help("nodes may only reference nodes created before them")
    )]
    InvalidGraph(String),
    #[error("Cyclic graph: no evaluation order exists through node {0}")]
    #[diagnostic(
        code(adcg::graph::cyclic),
        help("an alias was probably pointed at one of its own consumers")
    )]
    CyclicGraph(NodeId),
    #[error("Unresolved operand: {operand} is not part of the graph{}", referrer_suffix(.node))]
    #[diagnostic(code(adcg::graph::unresolved_operand))]
    UnresolvedOperand {
        node: Option<NodeId>,
        operand: NodeId,
    },
    #[error("Node {0} is already named \"{1}\"")]
    #[diagnostic(code(adcg::graph::name_already_set))]
    NameAlreadySet(NodeId, SmolStr),
}

fn referrer_suffix(node: &Option<NodeId>) -> String {
    node.map(|node| format!(" (referenced by {})", node))
        .unwrap_or_default()
}
