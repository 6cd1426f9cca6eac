use crate::op::OpKind;
use itertools::Itertools;
use smallvec::SmallVec;
use smol_str::SmolStr;
use std::fmt;

/// Reference to a node in a [`Graph`](crate::Graph).
///
/// A `NodeId` is a 32-bit position in the graph's node arena. Ids are
/// assigned in creation order, so an operand always has a smaller id than
/// the node consuming it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for NodeId {
    fn from(id: usize) -> Self {
        Self(id as u32)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Either a link to another node or a literal constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Node(NodeId),
    Constant(f64),
}

impl Operand {
    #[inline]
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Operand::Node(id) => Some(*id),
            Operand::Constant(_) => None,
        }
    }

    #[inline]
    pub fn constant(&self) -> Option<f64> {
        match self {
            Operand::Node(_) => None,
            Operand::Constant(value) => Some(*value),
        }
    }
}

impl From<NodeId> for Operand {
    fn from(id: NodeId) -> Self {
        Operand::Node(id)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Constant(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Node(id) => write!(f, "{}", id),
            Operand::Constant(value) => write!(f, "{:?}", value),
        }
    }
}

pub type Operands = SmallVec<[Operand; 2]>;
pub type Info = SmallVec<[usize; 2]>;

/// An operation recorded in the graph.
///
/// Scheduling state (evaluation order, use counts, slots) is not stored
/// here; it lives in the [`Schedule`](crate::Schedule) produced by the
/// analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) kind: OpKind,
    pub(crate) operands: Operands,
    pub(crate) info: Info,
    pub(crate) name: Option<SmolStr>,
}

impl Node {
    pub(crate) fn new(kind: OpKind, operands: Operands, info: Info) -> Self {
        Self {
            kind,
            operands,
            info,
            name: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    #[inline]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    #[inline]
    pub fn info(&self) -> &[usize] {
        &self.info
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Ids of the nodes referenced by this node's operands.
    pub fn operand_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.operands.iter().filter_map(Operand::node)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = self.kind.template().to_string();

        if text.contains("$*") {
            text = text.replace("$*", &self.operands.iter().join(", "));
        }
        if text.contains("$i") {
            let index = self.info.first().copied().unwrap_or_default();
            text = text.replace("$i", &index.to_string());
        }
        // Replace from the highest position down so "$1" never clobbers "$10".
        for (position, operand) in self.operands.iter().enumerate().rev() {
            text = text.replace(&format!("${}", position + 1), &operand.to_string());
        }

        f.write_str(&text)?;

        if self.kind.is_atomic() {
            write!(f, " info: [{}]", self.info.iter().join(", "))?;
        }
        if let Some(name) = &self.name {
            write!(f, " \"{}\"", name)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::CompareOp;
    use rstest::rstest;
    use smallvec::smallvec;

    #[rstest]
    #[case(
        Node::new(OpKind::Add, smallvec![NodeId::new(0).into(), NodeId::new(1).into()], smallvec![]),
        "n0 + n1"
    )]
    #[case(Node::new(OpKind::Cos, smallvec![Operand::Constant(0.5)], smallvec![]), "cos( 0.5 )")]
    #[case(
        Node::new(OpKind::ArrayElement, smallvec![NodeId::new(4).into()], smallvec![3]),
        "n4[3]"
    )]
    #[case(
        Node::new(
            OpKind::CondExp(CompareOp::Lt),
            smallvec![
                NodeId::new(0).into(),
                Operand::Constant(1.0),
                NodeId::new(1).into(),
                Operand::Constant(-1.0)
            ],
            smallvec![]
        ),
        "(n0 < 1.0)? n1 : -1.0"
    )]
    #[case(
        Node::new(
            OpKind::AtomicForward,
            smallvec![NodeId::new(2).into(), NodeId::new(3).into()],
            smallvec![7, 0, 1]
        ),
        "atomic_forward( n2, n3 ) info: [7, 0, 1]"
    )]
    fn test_display(#[case] node: Node, #[case] expected: &str) {
        assert_eq!(node.to_string(), expected);
    }

    #[test]
    fn test_display_with_name() {
        let mut node = Node::new(OpKind::Exp, smallvec![NodeId::new(0).into()], smallvec![]);
        node.name = Some("e".into());
        assert_eq!(node.to_string(), "exp( n0 ) \"e\"");
    }

    #[test]
    fn test_operand_nodes() {
        let node = Node::new(
            OpKind::Mul,
            smallvec![Operand::Constant(2.0), NodeId::new(3).into()],
            smallvec![],
        );
        assert_eq!(node.operand_nodes().collect::<Vec<_>>(), vec![NodeId::new(3)]);
    }
}
