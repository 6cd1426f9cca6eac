use crate::error::GraphError;
use crate::node::{Info, Node, NodeId, Operand, Operands};
use crate::op::{CompareOp, OpKind};
use smallvec::{SmallVec, smallvec};
use smol_str::SmolStr;

/// Arena holding every recorded operation.
///
/// Nodes are appended in creation order and addressed by [`NodeId`]. Operands
/// can only reference nodes that already exist, so the graph is acyclic by
/// construction. The single exception is [`Graph::make_alias`], which rewrites
/// a node in place and may point it anywhere; the analyzer reports the cycles
/// this can introduce.
///
/// # Example
///
/// ```rust
/// use adcg_ir::{Graph, OpKind};
///
/// let mut graph = Graph::new();
/// let x0 = graph.add_independent();
/// let x1 = graph.add_independent();
/// let t = graph.binary(OpKind::Mul, x0, x1).unwrap();
/// assert_eq!(graph.node(t).to_string(), "n0 * n1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    independents: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            independents: Vec::new(),
        }
    }

    /// Appends a new independent variable marker and returns its id.
    pub fn add_independent(&mut self) -> NodeId {
        let index = self.independents.len();
        let id = self.push(Node::new(OpKind::Independent, SmallVec::new(), smallvec![index]));
        self.independents.push(id);
        id
    }

    /// Creates a node after checking it against the construction rules of its kind.
    pub fn create(
        &mut self,
        kind: OpKind,
        operands: impl IntoIterator<Item = Operand>,
        info: impl IntoIterator<Item = usize>,
    ) -> Result<NodeId, GraphError> {
        let operands: Operands = operands.into_iter().collect();
        let info: Info = info.into_iter().collect();
        self.validate(kind, &operands, &info)?;
        Ok(self.push(Node::new(kind, operands, info)))
    }

    pub fn unary(&mut self, kind: OpKind, operand: impl Into<Operand>) -> Result<NodeId, GraphError> {
        if !kind.is_unary() {
            return Err(GraphError::InvalidGraph(format!("{} is not a unary operation", kind)));
        }
        self.create(kind, [operand.into()], [])
    }

    pub fn binary(
        &mut self,
        kind: OpKind,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Result<NodeId, GraphError> {
        if !kind.is_binary() {
            return Err(GraphError::InvalidGraph(format!("{} is not a binary operation", kind)));
        }
        self.create(kind, [left.into(), right.into()], [])
    }

    /// `(left op right) ? if_true : if_false`
    pub fn cond_exp(
        &mut self,
        op: CompareOp,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
        if_true: impl Into<Operand>,
        if_false: impl Into<Operand>,
    ) -> Result<NodeId, GraphError> {
        self.create(
            OpKind::CondExp(op),
            [left.into(), right.into(), if_true.into(), if_false.into()],
            [],
        )
    }

    pub fn array(&mut self, elements: impl IntoIterator<Item = Operand>) -> Result<NodeId, GraphError> {
        self.create(OpKind::ArrayCreation, elements, [])
    }

    /// Reads element `index` of `array`. `call` is the atomic call filling the
    /// array, if any, so the read is ordered after it.
    pub fn array_element(
        &mut self,
        array: NodeId,
        call: Option<NodeId>,
        index: usize,
    ) -> Result<NodeId, GraphError> {
        let operands: Operands = std::iter::once(array).chain(call).map(Operand::Node).collect();
        self.create(OpKind::ArrayElement, operands, [index])
    }

    /// Calls atomic function `atomic_id` forward: reads `tx`, writes `ty`.
    pub fn atomic_forward(
        &mut self,
        atomic_id: usize,
        q: usize,
        p: usize,
        tx: NodeId,
        ty: NodeId,
    ) -> Result<NodeId, GraphError> {
        self.create(OpKind::AtomicForward, [tx.into(), ty.into()], [atomic_id, q, p])
    }

    /// Calls atomic function `atomic_id` in reverse mode: reads `tx`, `ty`, `py`, writes `px`.
    pub fn atomic_reverse(
        &mut self,
        atomic_id: usize,
        p: usize,
        arrays: [NodeId; 4],
    ) -> Result<NodeId, GraphError> {
        self.create(OpKind::AtomicReverse, arrays.map(Operand::Node), [atomic_id, p])
    }

    /// Turns `id` into an alias of `operand`.
    ///
    /// Every existing reference to `id` keeps its identity and now resolves
    /// through the alias. Any name given to the node is discarded.
    pub fn make_alias(&mut self, id: NodeId, operand: impl Into<Operand>) -> Result<(), GraphError> {
        let operand = operand.into();
        self.check_exists(None, id)?;

        if self.nodes[id.index()].kind == OpKind::Independent {
            return Err(GraphError::InvalidGraph(format!(
                "independent variable {} cannot become an alias",
                id
            )));
        }

        if let Operand::Node(target) = operand {
            self.check_exists(Some(id), target)?;
            if target == id {
                return Err(GraphError::CyclicGraph(id));
            }
        }

        let node = &mut self.nodes[id.index()];
        node.kind = OpKind::Alias;
        node.operands = smallvec![operand];
        node.info.clear();
        node.name = None;

        Ok(())
    }

    /// Assigns a display name. A node can be named at most once.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<SmolStr>) -> Result<(), GraphError> {
        self.check_exists(None, id)?;
        let node = &mut self.nodes[id.index()];

        match &node.name {
            Some(existing) => Err(GraphError::NameAlreadySet(id, existing.clone())),
            None => {
                node.name = Some(name.into());
                Ok(())
            }
        }
    }

    /// Returns the node with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this graph.
    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId::from(i), node))
    }

    pub fn independents(&self) -> &[NodeId] {
        &self.independents
    }

    /// Position of `id` among the independent variables, if it is one.
    pub fn independent_index(&self, id: NodeId) -> Option<usize> {
        self.get(id)
            .filter(|node| node.kind == OpKind::Independent)
            .and_then(|node| node.info.first().copied())
    }

    /// Follows alias chains until a constant or a non-alias node is reached.
    pub fn resolve(&self, operand: Operand) -> Result<Operand, GraphError> {
        let mut current = operand;
        let mut steps = 0;

        while let Operand::Node(id) = current {
            let node = self.get(id).ok_or(GraphError::UnresolvedOperand {
                node: None,
                operand: id,
            })?;

            if node.kind != OpKind::Alias {
                break;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return Err(GraphError::CyclicGraph(id));
            }
            current = node.operands[0];
        }

        Ok(current)
    }

    /// [`Graph::resolve`] for a node reference.
    pub fn resolve_node(&self, id: NodeId) -> Result<Operand, GraphError> {
        self.resolve(Operand::Node(id))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::from(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn check_exists(&self, referrer: Option<NodeId>, id: NodeId) -> Result<(), GraphError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(GraphError::UnresolvedOperand {
                node: referrer,
                operand: id,
            })
        }
    }

    fn validate(&self, kind: OpKind, operands: &[Operand], info: &[usize]) -> Result<(), GraphError> {
        if kind == OpKind::Independent {
            return Err(GraphError::InvalidGraph(
                "independent variables are created with add_independent".to_string(),
            ));
        }

        if !kind.arity().contains(&operands.len()) {
            return Err(GraphError::InvalidGraph(format!(
                "{} expects {:?} operands, got {}",
                kind,
                kind.arity(),
                operands.len()
            )));
        }

        if info.len() != kind.info_len() {
            return Err(GraphError::InvalidGraph(format!(
                "{} expects {} info values, got {}",
                kind,
                kind.info_len(),
                info.len()
            )));
        }

        let next = NodeId::from(self.nodes.len());
        for id in operands.iter().filter_map(Operand::node) {
            if id >= next {
                return Err(GraphError::InvalidGraph(format!(
                    "forward reference to {} from new node {}",
                    id, next
                )));
            }
        }

        if !matches!(kind, OpKind::Alias | OpKind::ArrayCreation)
            && operands.iter().all(|operand| operand.node().is_none())
        {
            return Err(GraphError::InvalidGraph(format!(
                "{} needs at least one operand produced by a node",
                kind
            )));
        }

        match kind {
            OpKind::ArrayElement => {
                let length = self.array_length(operands[0])?;
                if info[0] >= length {
                    return Err(GraphError::InvalidGraph(format!(
                        "element {} is out of bounds for an array of {}",
                        info[0], length
                    )));
                }
                if let Some(call) = operands.get(1) {
                    let is_call = matches!(
                        self.resolve(*call)?,
                        Operand::Node(id) if self.nodes[id.index()].kind.is_atomic()
                    );
                    if !is_call {
                        return Err(GraphError::InvalidGraph(
                            "the second operand of an array element must be an atomic call".to_string(),
                        ));
                    }
                }
            }
            OpKind::AtomicForward | OpKind::AtomicReverse => {
                for operand in operands {
                    self.array_length(*operand)?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn array_length(&self, operand: Operand) -> Result<usize, GraphError> {
        match self.resolve(operand)? {
            Operand::Node(id) if self.nodes[id.index()].kind == OpKind::ArrayCreation => {
                Ok(self.nodes[id.index()].operands.len())
            }
            other => Err(GraphError::InvalidGraph(format!("{} is not an array", other))),
        }
    }
}
