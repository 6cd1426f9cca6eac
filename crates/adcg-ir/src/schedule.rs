//! Evaluation-order and lifetime analysis.
//!
//! The [`Analyzer`] walks the part of a [`Graph`] reachable from the dependent
//! variables and produces a [`Schedule`]: a side table keyed by node id with
//! evaluation orders, use counts, last-use orders and variable slots.
//!
//! Variable slots live in three id spaces:
//!
//! ```text
//! 1 ..= n                      independent variables (slot = index + 1)
//! n + 1 ..= n + m              dependents computed straight into the output
//! n + m + 1 ..                 temporaries, recycled linear-scan style
//! ```
//!
//! Temporary arrays are allocated in a separate space as contiguous blocks;
//! their slot is the block start plus one. Named scalar nodes are written to
//! a variable carrying their name and take no slot.

use crate::config::AnalyzerOptions;
use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::{NodeId, Operand};
use crate::op::OpKind;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::{debug, trace};

/// Tells the analyzer which operand positions must be rendered through a
/// bound variable rather than as an inline sub-expression.
pub trait OperandBinding {
    fn requires_named_operand(&self, kind: OpKind, position: usize) -> bool;

    /// `true` if evaluating the node introduces a binding of its own. A
    /// scalar node answering `false` is rendered inside every consumer.
    fn creates_new_variable(&self, graph: &Graph, id: NodeId) -> bool {
        let kind = graph.node(id).kind();
        kind.is_scalar() || kind == OpKind::ArrayCreation
    }
}

/// Arrays handed to atomic calls and arrays read by element accesses must be
/// bound; everything else may be inlined.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBinding;

impl OperandBinding for DefaultBinding {
    fn requires_named_operand(&self, kind: OpKind, position: usize) -> bool {
        kind.is_atomic() || (kind == OpKind::ArrayElement && position == 0)
    }
}

/// Scheduling state of a single node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeSchedule {
    pub eval_order: usize,
    pub total_use_count: usize,
    pub live_use_count: usize,
    pub last_use_order: usize,
    pub variable_slot: usize,
    /// Consumer this node is rendered inside of, when inlined.
    pub inlined_into: Option<NodeId>,
}

impl NodeSchedule {
    /// Last evaluation order at which the value must still be held.
    #[inline]
    pub fn live_end(&self) -> usize {
        self.last_use_order.max(self.eval_order)
    }
}

/// Where the value of a node is stored once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableBinding {
    Unbound,
    Independent(usize),
    Dependent(usize),
    Temporary(usize),
    /// Start offset of the node's block in the temporary array.
    Array(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: Vec<NodeSchedule>,
    order: Vec<NodeId>,
    dependents: Vec<Operand>,
    dependent_positions: FxHashMap<NodeId, SmallVec<[usize; 1]>>,
    independent_count: usize,
    reuse_ids: bool,
    temporary_count: usize,
    array_size: usize,
}

impl Schedule {
    fn new(graph: &Graph, dependents: Vec<Operand>, reuse_ids: bool) -> Self {
        let mut dependent_positions: FxHashMap<NodeId, SmallVec<[usize; 1]>> = FxHashMap::default();
        for (position, dependent) in dependents.iter().enumerate() {
            if let Operand::Node(id) = dependent {
                dependent_positions.entry(*id).or_default().push(position);
            }
        }

        Self {
            entries: vec![NodeSchedule::default(); graph.len()],
            order: Vec::new(),
            dependents,
            dependent_positions,
            independent_count: graph.independents().len(),
            reuse_ids,
            temporary_count: 0,
            array_size: 0,
        }
    }

    #[inline]
    pub fn entry(&self, id: NodeId) -> NodeSchedule {
        self.entries.get(id.index()).copied().unwrap_or_default()
    }

    #[inline]
    pub fn eval_order(&self, id: NodeId) -> usize {
        self.entry(id).eval_order
    }

    #[inline]
    pub fn last_use_order(&self, id: NodeId) -> usize {
        self.entry(id).last_use_order
    }

    #[inline]
    pub fn total_use_count(&self, id: NodeId) -> usize {
        self.entry(id).total_use_count
    }

    #[inline]
    pub fn variable_slot(&self, id: NodeId) -> usize {
        self.entry(id).variable_slot
    }

    #[inline]
    pub fn is_inlined(&self, id: NodeId) -> bool {
        self.entry(id).inlined_into.is_some()
    }

    /// Value-producing nodes sorted by evaluation order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Dependent values with aliases already resolved.
    pub fn dependents(&self) -> &[Operand] {
        &self.dependents
    }

    pub fn dependent_positions(&self, id: NodeId) -> &[usize] {
        self.dependent_positions
            .get(&id)
            .map(|positions| positions.as_slice())
            .unwrap_or_default()
    }

    #[inline]
    pub fn is_dependent(&self, id: NodeId) -> bool {
        self.dependent_positions.contains_key(&id)
    }

    pub fn independent_count(&self) -> usize {
        self.independent_count
    }

    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    /// First slot of the temporary id space.
    pub fn min_temporary_id(&self) -> usize {
        self.independent_count + self.dependents.len() + 1
    }

    /// Number of distinct temporary slots handed out.
    pub fn temporary_count(&self) -> usize {
        self.temporary_count
    }

    /// Number of elements the temporary array must hold.
    pub fn array_size(&self) -> usize {
        self.array_size
    }

    pub fn reuse_ids(&self) -> bool {
        self.reuse_ids
    }

    /// Evaluation order at which the node's value is actually computed. An
    /// inlined node is computed together with the consumer it is inlined into.
    pub fn effective_order(&self, id: NodeId) -> usize {
        let mut current = id;
        while let Some(consumer) = self.entry(current).inlined_into {
            current = consumer;
        }
        self.eval_order(current)
    }

    pub fn binding(&self, graph: &Graph, id: NodeId) -> VariableBinding {
        let slot = self.variable_slot(id);
        if slot == 0 {
            return VariableBinding::Unbound;
        }

        match graph.get(id).map(|node| node.kind()) {
            Some(OpKind::ArrayCreation) => VariableBinding::Array(slot - 1),
            Some(OpKind::Independent) => VariableBinding::Independent(slot - 1),
            _ if slot >= self.min_temporary_id() => VariableBinding::Temporary(slot - self.min_temporary_id()),
            _ => VariableBinding::Dependent(slot - self.independent_count - 1),
        }
    }

    /// Raises the node's last-use order to `order`. An array element access
    /// raises the owning array as well, so the array stays live as long as
    /// any access to it is pending.
    pub fn set_last_usage_order(&mut self, graph: &Graph, id: NodeId, order: usize) -> Result<(), GraphError> {
        let Some(entry) = self.entries.get_mut(id.index()) else {
            return Err(GraphError::UnresolvedOperand {
                node: None,
                operand: id,
            });
        };
        entry.last_use_order = entry.last_use_order.max(order);

        let node = graph.node(id);
        if node.kind() == OpKind::ArrayElement {
            if let Operand::Node(array) = graph.resolve(node.operands()[0])? {
                self.set_last_usage_order(graph, array, order)?;
            }
        }

        Ok(())
    }

    /// Drops every scheduling result so the graph can be analyzed again.
    pub fn reset(&mut self) {
        self.entries.iter_mut().for_each(|entry| *entry = NodeSchedule::default());
        self.order.clear();
        self.temporary_count = 0;
        self.array_size = 0;
    }

    /// Assigns variable slots to every scheduled node except those in `excluded`.
    ///
    /// Slots are released once the evaluation order passes the end of their
    /// live range and are handed to a strictly later node, so two nodes with
    /// overlapping live ranges never share a slot.
    pub fn assign_slots(&mut self, graph: &Graph, excluded: &FxHashSet<NodeId>) {
        self.entries.iter_mut().for_each(|entry| entry.variable_slot = 0);

        for (index, id) in graph.independents().iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(id.index()) {
                entry.variable_slot = index + 1;
            }
        }

        let min_temporary_id = self.min_temporary_id();
        let mut free_slots: Vec<usize> = Vec::new();
        let mut active: BinaryHeap<Reverse<(usize, usize)>> = BinaryHeap::new();
        let mut arrays = ArrayAllocator::default();
        let mut active_arrays: BinaryHeap<Reverse<(usize, usize, usize)>> = BinaryHeap::new();
        let mut fresh = 0;

        for &id in &self.order {
            let entry = self.entries[id.index()];
            if entry.inlined_into.is_some() || excluded.contains(&id) {
                continue;
            }

            let current = entry.eval_order;
            if self.reuse_ids {
                while let Some(&Reverse((end, slot))) = active.peek() {
                    if end >= current {
                        break;
                    }
                    active.pop();
                    free_slots.push(slot);
                }
                while let Some(&Reverse((end, start, length))) = active_arrays.peek() {
                    if end >= current {
                        break;
                    }
                    active_arrays.pop();
                    arrays.release(start, length);
                }
            }

            let node = graph.node(id);
            if node.name().is_some() && node.kind().is_scalar() {
                continue;
            }
            let slot = match node.kind() {
                OpKind::ArrayCreation => {
                    let length = node.operands().len();
                    let start = arrays.allocate(length);
                    active_arrays.push(Reverse((entry.live_end(), start, length)));
                    start + 1
                }
                OpKind::ArrayElement | OpKind::AtomicForward | OpKind::AtomicReverse => continue,
                _ => match self.dependent_positions.get(&id) {
                    Some(positions) if entry.total_use_count == 0 => self.independent_count + 1 + positions[0],
                    _ => {
                        let slot = free_slots.pop().unwrap_or_else(|| {
                            fresh += 1;
                            min_temporary_id + fresh - 1
                        });
                        active.push(Reverse((entry.live_end(), slot)));
                        slot
                    }
                },
            };

            trace!(node = %id, slot, order = current, "Assigned variable slot");
            self.entries[id.index()].variable_slot = slot;
        }

        self.temporary_count = fresh;
        self.array_size = arrays.size;
    }

    fn assign_orders(&mut self, graph: &Graph, topological: &[NodeId]) -> Result<(), GraphError> {
        let mut order = 0;
        for &id in topological {
            if graph.node(id).kind().produces_value() {
                order += 1;
                self.entries[id.index()].eval_order = order;
                self.order.push(id);
            }
        }

        for index in 0..self.order.len() {
            let id = self.order[index];
            for operand in graph.node(id).operands() {
                if let Operand::Node(used) = graph.resolve(*operand)? {
                    self.entries[used.index()].total_use_count += 1;
                }
            }
        }

        Ok(())
    }

    fn mark_inlined<P: OperandBinding + ?Sized>(&mut self, graph: &Graph, binding: &P) -> Result<(), GraphError> {
        for index in 0..self.order.len() {
            let consumer = self.order[index];
            let node = graph.node(consumer);

            for (position, operand) in node.operands().iter().enumerate() {
                let Operand::Node(used) = graph.resolve(*operand)? else {
                    continue;
                };
                let used_node = graph.node(used);
                let candidate = used_node.kind().is_scalar()
                    && used_node.name().is_none()
                    && self.entries[used.index()].total_use_count == 1
                    && !self.is_dependent(used)
                    && !binding.requires_named_operand(node.kind(), position);

                if candidate {
                    self.entries[used.index()].inlined_into = Some(consumer);
                }
            }
        }

        Ok(())
    }

    /// Scalar nodes the binding gives no variable are attached to their last
    /// consumer, so their operands stay live until every consumer has read
    /// them.
    fn mark_unbound<P: OperandBinding + ?Sized>(&mut self, graph: &Graph, binding: &P) -> Result<(), GraphError> {
        for index in 0..self.order.len() {
            let consumer = self.order[index];

            for operand in graph.node(consumer).operands() {
                let Operand::Node(used) = graph.resolve(*operand)? else {
                    continue;
                };
                let used_node = graph.node(used);
                let unbound = used_node.kind().is_scalar()
                    && used_node.name().is_none()
                    && !self.is_dependent(used)
                    && !binding.creates_new_variable(graph, used);

                if unbound {
                    self.entries[used.index()].inlined_into = Some(consumer);
                }
            }
        }

        Ok(())
    }

    fn record_last_uses(&mut self, graph: &Graph) -> Result<(), GraphError> {
        for index in 0..self.order.len() {
            let id = self.order[index];
            let current = self.effective_order(id);

            for operand in graph.node(id).operands() {
                if let Operand::Node(used) = graph.resolve(*operand)? {
                    self.entries[used.index()].live_use_count += 1;
                    self.set_last_usage_order(graph, used, current)?;
                }
            }
        }

        Ok(())
    }
}

/// First-fit allocator for blocks of the temporary array.
#[derive(Debug, Default)]
struct ArrayAllocator {
    free: Vec<(usize, usize)>,
    size: usize,
}

impl ArrayAllocator {
    fn allocate(&mut self, length: usize) -> usize {
        if let Some(position) = self.free.iter().position(|&(_, free)| free >= length) {
            let (start, free) = self.free[position];
            if free == length {
                self.free.remove(position);
            } else {
                self.free[position] = (start + length, free - length);
            }
            return start;
        }

        if let Some(&(start, free)) = self.free.last() {
            if start + free == self.size {
                self.free.pop();
                self.size = start + length;
                return start;
            }
        }

        let start = self.size;
        self.size += length;
        start
    }

    fn release(&mut self, start: usize, length: usize) {
        let position = self.free.partition_point(|&(s, _)| s < start);
        self.free.insert(position, (start, length));

        if position + 1 < self.free.len() && start + self.free[position].1 == self.free[position + 1].0 {
            self.free[position].1 += self.free[position + 1].1;
            self.free.remove(position + 1);
        }
        if position > 0 && self.free[position - 1].0 + self.free[position - 1].1 == start {
            self.free[position - 1].1 += self.free[position].1;
            self.free.remove(position);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Schedules every node reachable from `dependents`.
    ///
    /// # Errors
    ///
    /// - [`GraphError::UnresolvedOperand`] if a dependent or an operand
    ///   references a node outside the graph.
    /// - [`GraphError::CyclicGraph`] if alias rewrites introduced a cycle.
    pub fn analyze<P: OperandBinding + ?Sized>(
        &self,
        graph: &Graph,
        dependents: &[Operand],
        binding: &P,
    ) -> Result<Schedule, GraphError> {
        let dependents = dependents
            .iter()
            .map(|dependent| graph.resolve(*dependent))
            .collect::<Result<Vec<_>, _>>()?;

        let reachable = reachable_nodes(graph, &dependents)?;
        let topological = topological_order(graph, &reachable)?;

        let mut schedule = Schedule::new(graph, dependents, self.options.reuse_ids);
        schedule.assign_orders(graph, &topological)?;
        if self.options.inline_single_use {
            schedule.mark_inlined(graph, binding)?;
        }
        schedule.mark_unbound(graph, binding)?;
        schedule.record_last_uses(graph)?;
        schedule.assign_slots(graph, &FxHashSet::default());

        debug!(
            reachable = topological.len(),
            scheduled = schedule.order.len(),
            temporaries = schedule.temporary_count,
            array_size = schedule.array_size,
            "Analyzed operation graph"
        );

        Ok(schedule)
    }
}

fn reachable_nodes(graph: &Graph, dependents: &[Operand]) -> Result<Vec<bool>, GraphError> {
    let mut reachable = vec![false; graph.len()];
    let mut stack: Vec<NodeId> = Vec::new();

    for id in dependents.iter().filter_map(Operand::node) {
        if !graph.contains(id) {
            return Err(GraphError::UnresolvedOperand {
                node: None,
                operand: id,
            });
        }
        if !reachable[id.index()] {
            reachable[id.index()] = true;
            stack.push(id);
        }
    }

    while let Some(id) = stack.pop() {
        for used in graph.node(id).operand_nodes() {
            if !graph.contains(used) {
                return Err(GraphError::UnresolvedOperand {
                    node: Some(id),
                    operand: used,
                });
            }
            if !reachable[used.index()] {
                reachable[used.index()] = true;
                stack.push(used);
            }
        }
    }

    Ok(reachable)
}

/// Kahn's algorithm; ties are broken by creation order.
fn topological_order(graph: &Graph, reachable: &[bool]) -> Result<Vec<NodeId>, GraphError> {
    let mut in_degree = vec![0usize; graph.len()];
    let mut users: Vec<SmallVec<[NodeId; 2]>> = vec![SmallVec::new(); graph.len()];
    let mut ready = BinaryHeap::new();
    let mut total = 0;

    for (id, node) in graph.iter().filter(|(id, _)| reachable[id.index()]) {
        total += 1;
        let mut seen: SmallVec<[NodeId; 4]> = SmallVec::new();
        for used in node.operand_nodes() {
            if !seen.contains(&used) {
                seen.push(used);
                users[used.index()].push(id);
            }
        }
        in_degree[id.index()] = seen.len();
        if seen.is_empty() {
            ready.push(Reverse(id));
        }
    }

    let mut order = Vec::with_capacity(total);
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for &user in &users[id.index()] {
            in_degree[user.index()] -= 1;
            if in_degree[user.index()] == 0 {
                ready.push(Reverse(user));
            }
        }
    }

    if order.len() < total {
        let stuck = graph
            .iter()
            .map(|(id, _)| id)
            .find(|id| reachable[id.index()] && in_degree[id.index()] > 0);
        return Err(GraphError::CyclicGraph(stuck.unwrap_or_default()));
    }

    Ok(order)
}
