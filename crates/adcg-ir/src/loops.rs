//! Loop-group verification.
//!
//! A [`LoopGroup`] lists structurally similar equation instances, each
//! parameterized by a loop index (or two). The [`LoopDetector`] checks that
//! every instance evaluates the same operations on the same kinds of
//! operands, finds an index pattern for every independent variable read and
//! every dependent written, and produces a [`LoopPlan`] the emitter renders
//! as a single loop. Any mismatch yields a [`LoopFallback`] and the group
//! stays unrolled.

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::{Info, NodeId, Operand};
use crate::op::OpKind;
use crate::pattern::{self, IndexPattern, Observations, PlaneObservations};
use crate::schedule::Schedule;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::ops::Range;
use thiserror::Error;
use tracing::debug;

/// One iteration of a candidate loop: its indices and the dependent
/// positions it computes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInstance {
    pub x: usize,
    pub y: Option<usize>,
    pub dependents: SmallVec<[usize; 4]>,
}

impl LoopInstance {
    pub fn new(x: usize, dependents: impl IntoIterator<Item = usize>) -> Self {
        Self {
            x,
            y: None,
            dependents: dependents.into_iter().collect(),
        }
    }

    pub fn new_2d(x: usize, y: usize, dependents: impl IntoIterator<Item = usize>) -> Self {
        Self {
            x,
            y: Some(y),
            dependents: dependents.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopGroup {
    pub instances: Vec<LoopInstance>,
}

impl LoopGroup {
    pub fn new(instances: impl IntoIterator<Item = LoopInstance>) -> Self {
        Self {
            instances: instances.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyOperand {
    Constant(f64),
    /// Value computed earlier in the same iteration.
    Local(usize),
    /// Value computed once before the loop.
    Invariant(NodeId),
    /// Independent variable at the pattern's index.
    Independent(IndexPattern),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyNode {
    /// Node of the first instance this body node was taken from.
    pub origin: NodeId,
    pub kind: OpKind,
    pub info: Info,
    pub operands: SmallVec<[BodyOperand; 2]>,
}

/// `dependent[pattern] = value` inside the loop body.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopEquation {
    pub dependent: IndexPattern,
    pub value: BodyOperand,
}

#[derive(Debug, Clone)]
pub struct LoopPlan {
    pub x_range: Range<usize>,
    pub y_range: Option<Range<usize>>,
    pub body: Vec<BodyNode>,
    pub equations: Vec<LoopEquation>,
    pub invariants: Vec<NodeId>,
    /// Nodes of every instance that the loop body replaces.
    pub locals: FxHashSet<NodeId>,
    /// Independent variable indices read by the loop.
    pub independents: Vec<usize>,
    /// Dependent positions written by the loop.
    pub dependents: Vec<usize>,
    /// The loop is emitted right after the node with this evaluation order.
    pub anchor: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoopFallback {
    #[error("a loop needs at least two instances, got {0}")]
    TooFewInstances(usize),
    #[error("instances mix one- and two-dimensional indices")]
    MixedDimensions,
    #[error("iteration domain is not a contiguous range")]
    NonContiguousDomain,
    #[error("instances compute different numbers of dependents")]
    EquationCountMismatch,
    #[error("dependent position {0} does not exist")]
    UnknownDependent(usize),
    #[error("node {0} is shared by some but not all instances")]
    PartiallyShared(NodeId),
    #[error("node {0} cannot be evaluated inside a loop body")]
    NonScalarBody(NodeId),
    #[error("node {0} is used outside its instance")]
    EscapingValue(NodeId),
    #[error("loop invariant {0} has no variable of its own")]
    UnboundInvariant(NodeId),
    #[error("instances differ in their operation structure")]
    ShapeMismatch,
    #[error("no index pattern reproduces the {0} indices")]
    NoIndexPattern(&'static str),
    #[error("node {0} already belongs to another loop")]
    Overlap(NodeId),
    #[error("dependent position {0} is already written by another loop")]
    DependentClaimed(usize),
    #[error("the target cannot address the variables the loop touches")]
    Rejected,
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Operand descriptor used to compare instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Constant(u64),
    Local(usize),
    Invariant(NodeId),
    /// n-th independent variable read while walking the instance.
    Independent(usize),
}

#[derive(Debug, Default)]
struct Shape {
    nodes: Vec<(OpKind, Info, SmallVec<[Slot; 2]>)>,
    equations: Vec<Slot>,
    independents: Vec<usize>,
    locals: Vec<NodeId>,
    internal_uses: FxHashMap<NodeId, usize>,
    memo: FxHashMap<NodeId, usize>,
}

impl Shape {
    fn matches(&self, other: &Shape) -> bool {
        self.nodes == other.nodes
            && self.equations == other.equations
            && self.independents.len() == other.independents.len()
    }
}

pub struct LoopDetector<'a> {
    graph: &'a Graph,
    schedule: &'a Schedule,
    min_section_size: usize,
}

impl<'a> LoopDetector<'a> {
    pub fn new(graph: &'a Graph, schedule: &'a Schedule, min_section_size: usize) -> Self {
        Self {
            graph,
            schedule,
            min_section_size,
        }
    }

    /// Plans every group that verifies, in order. Groups that fail, or that
    /// claim nodes or dependents already claimed by an earlier plan, are
    /// skipped and stay unrolled.
    pub fn plan_all(&self, groups: &[LoopGroup]) -> Vec<LoopPlan> {
        self.plan_all_with(groups, |_| true)
    }

    /// Like [`LoopDetector::plan_all`], but a verified plan is only accepted,
    /// and only claims its nodes and dependents, if `accept` returns `true`.
    pub fn plan_all_with(&self, groups: &[LoopGroup], accept: impl Fn(&LoopPlan) -> bool) -> Vec<LoopPlan> {
        let mut claimed_nodes: FxHashSet<NodeId> = FxHashSet::default();
        let mut claimed_dependents: FxHashSet<usize> = FxHashSet::default();
        let mut plans = Vec::new();

        for (index, group) in groups.iter().enumerate() {
            let verified = self.plan(group).and_then(|plan| {
                if let Some(&node) = plan.locals.iter().find(|node| claimed_nodes.contains(node)) {
                    return Err(LoopFallback::Overlap(node));
                }
                if let Some(&position) = plan.dependents.iter().find(|p| claimed_dependents.contains(p)) {
                    return Err(LoopFallback::DependentClaimed(position));
                }
                if !accept(&plan) {
                    return Err(LoopFallback::Rejected);
                }
                Ok(plan)
            });

            match verified {
                Ok(plan) => {
                    debug!(
                        group = index,
                        iterations = plan.x_range.len() * plan.y_range.as_ref().map_or(1, |r| r.len()),
                        body = plan.body.len(),
                        "Accepted loop group"
                    );
                    claimed_nodes.extend(plan.locals.iter().copied());
                    claimed_dependents.extend(plan.dependents.iter().copied());
                    plans.push(plan);
                }
                Err(reason) => {
                    debug!(group = index, %reason, "Loop group falls back to unrolled emission");
                }
            }
        }

        plans
    }

    pub fn plan(&self, group: &LoopGroup) -> Result<LoopPlan, LoopFallback> {
        let count = group.instances.len();
        if count < 2 {
            return Err(LoopFallback::TooFewInstances(count));
        }

        let two_dimensional = group.instances[0].y.is_some();
        if group.instances.iter().any(|i| i.y.is_some() != two_dimensional) {
            return Err(LoopFallback::MixedDimensions);
        }

        let instances: Vec<&LoopInstance> = group
            .instances
            .iter()
            .sorted_by_key(|i| (i.x, i.y))
            .collect();
        let (x_range, y_range) = domain(&instances, two_dimensional)?;

        let equation_count = instances[0].dependents.len();
        if instances.iter().any(|i| i.dependents.len() != equation_count) {
            return Err(LoopFallback::EquationCountMismatch);
        }

        let roots = instances
            .iter()
            .map(|instance| self.roots(instance))
            .collect::<Result<Vec<_>, _>>()?;

        let invariants = self.invariants(&roots)?;

        let mut shapes = Vec::with_capacity(count);
        for (instance, roots) in instances.iter().zip(&roots) {
            let mut shape = Shape::default();
            for root in roots {
                let slot = self.slot_for(*root, &invariants, &mut shape, false)?;
                shape.equations.push(slot);
            }
            self.check_contained(instance, &shape)?;
            shapes.push(shape);
        }

        if shapes.iter().any(|shape| !shape.matches(&shapes[0])) {
            return Err(LoopFallback::ShapeMismatch);
        }

        // Only invariants the body reads need a variable; nodes behind them
        // may well be inlined into them.
        let invariants: Vec<NodeId> = shapes[0]
            .nodes
            .iter()
            .flat_map(|(_, _, slots)| slots.iter())
            .chain(&shapes[0].equations)
            .filter_map(|slot| match slot {
                Slot::Invariant(id) => Some(*id),
                _ => None,
            })
            .sorted()
            .dedup()
            .collect();
        if let Some(&invariant) = invariants.iter().find(|id| self.schedule.is_inlined(**id)) {
            return Err(LoopFallback::UnboundInvariant(invariant));
        }

        let leaf_patterns = (0..shapes[0].independents.len())
            .map(|ordinal| {
                let values = shapes.iter().map(|shape| shape.independents[ordinal]);
                self.detect(&instances, values, two_dimensional)
                    .ok_or(LoopFallback::NoIndexPattern("independent"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dependent_patterns = (0..equation_count)
            .map(|equation| {
                let values = instances.iter().map(|instance| instance.dependents[equation]);
                self.detect(&instances, values, two_dimensional)
                    .ok_or(LoopFallback::NoIndexPattern("dependent"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let to_operand = |slot: &Slot| match *slot {
            Slot::Constant(bits) => BodyOperand::Constant(f64::from_bits(bits)),
            Slot::Local(index) => BodyOperand::Local(index),
            Slot::Invariant(id) => BodyOperand::Invariant(id),
            Slot::Independent(ordinal) => BodyOperand::Independent(leaf_patterns[ordinal].clone()),
        };

        let template = &shapes[0];
        let body = template
            .nodes
            .iter()
            .zip(&template.locals)
            .map(|((kind, info, slots), origin)| BodyNode {
                origin: *origin,
                kind: *kind,
                info: info.clone(),
                operands: slots.iter().map(to_operand).collect(),
            })
            .collect();
        let equations = template
            .equations
            .iter()
            .zip(dependent_patterns)
            .map(|(slot, dependent)| LoopEquation {
                dependent,
                value: to_operand(slot),
            })
            .collect();

        let locals: FxHashSet<NodeId> = shapes.iter().flat_map(|shape| shape.locals.iter().copied()).collect();
        let anchor = locals
            .iter()
            .chain(invariants.iter())
            .map(|id| self.schedule.eval_order(*id))
            .max()
            .unwrap_or_default();

        Ok(LoopPlan {
            x_range,
            y_range,
            body,
            equations,
            invariants,
            locals,
            independents: shapes
                .iter()
                .flat_map(|shape| shape.independents.iter().copied())
                .sorted()
                .dedup()
                .collect(),
            dependents: instances
                .iter()
                .flat_map(|instance| instance.dependents.iter().copied())
                .sorted()
                .collect(),
            anchor,
        })
    }

    fn roots(&self, instance: &LoopInstance) -> Result<Vec<Operand>, LoopFallback> {
        instance
            .dependents
            .iter()
            .map(|&position| {
                self.schedule
                    .dependents()
                    .get(position)
                    .copied()
                    .ok_or(LoopFallback::UnknownDependent(position))
            })
            .collect()
    }

    /// Nodes reached from every instance. A node reached from more than one
    /// instance but not from all of them cannot be placed.
    fn invariants(&self, roots: &[Vec<Operand>]) -> Result<FxHashSet<NodeId>, LoopFallback> {
        let mut reach: FxHashMap<NodeId, usize> = FxHashMap::default();

        for instance_roots in roots {
            let mut seen: FxHashSet<NodeId> = FxHashSet::default();
            let mut stack: Vec<NodeId> = instance_roots.iter().filter_map(Operand::node).collect();

            while let Some(id) = stack.pop() {
                if self.graph.node(id).kind() == OpKind::Independent || !seen.insert(id) {
                    continue;
                }
                for used in self.graph.node(id).operand_nodes() {
                    if let Operand::Node(resolved) = self.graph.resolve_node(used)? {
                        stack.push(resolved);
                    }
                }
            }

            for id in seen {
                *reach.entry(id).or_default() += 1;
            }
        }

        let instances = roots.len();
        if let Some((&id, _)) = reach
            .iter()
            .filter(|(_, count)| **count > 1 && **count < instances)
            .min_by_key(|(id, _)| **id)
        {
            return Err(LoopFallback::PartiallyShared(id));
        }

        Ok(reach
            .into_iter()
            .filter(|(_, count)| *count == instances)
            .map(|(id, _)| id)
            .collect())
    }

    fn slot_for(
        &self,
        operand: Operand,
        invariants: &FxHashSet<NodeId>,
        shape: &mut Shape,
        from_body: bool,
    ) -> Result<Slot, LoopFallback> {
        let id = match self.graph.resolve(operand)? {
            Operand::Constant(value) => return Ok(Slot::Constant(value.to_bits())),
            Operand::Node(id) => id,
        };
        let node = self.graph.node(id);

        if let Some(index) = self.graph.independent_index(id) {
            shape.independents.push(index);
            return Ok(Slot::Independent(shape.independents.len() - 1));
        }
        if invariants.contains(&id) {
            return Ok(Slot::Invariant(id));
        }
        if from_body {
            *shape.internal_uses.entry(id).or_default() += 1;
        }
        if let Some(&local) = shape.memo.get(&id) {
            return Ok(Slot::Local(local));
        }

        if !node.kind().is_scalar() {
            return Err(LoopFallback::NonScalarBody(id));
        }
        if node.name().is_some() {
            return Err(LoopFallback::EscapingValue(id));
        }

        let mut slots = SmallVec::new();
        for used in node.operands() {
            slots.push(self.slot_for(*used, invariants, shape, true)?);
        }

        let local = shape.nodes.len();
        shape.nodes.push((node.kind(), node.info().iter().copied().collect(), slots));
        shape.locals.push(id);
        shape.memo.insert(id, local);

        Ok(Slot::Local(local))
    }

    /// Locals may only be consumed inside their own instance and may only be
    /// written to dependents the instance owns.
    fn check_contained(&self, instance: &LoopInstance, shape: &Shape) -> Result<(), LoopFallback> {
        for &id in &shape.locals {
            let internal = shape.internal_uses.get(&id).copied().unwrap_or_default();
            if internal != self.schedule.total_use_count(id) {
                return Err(LoopFallback::EscapingValue(id));
            }
            if self
                .schedule
                .dependent_positions(id)
                .iter()
                .any(|position| !instance.dependents.contains(position))
            {
                return Err(LoopFallback::EscapingValue(id));
            }
        }

        Ok(())
    }

    fn detect(
        &self,
        instances: &[&LoopInstance],
        values: impl Iterator<Item = usize>,
        two_dimensional: bool,
    ) -> Option<IndexPattern> {
        if two_dimensional {
            let mut x2y2z = PlaneObservations::new();
            for (instance, value) in instances.iter().zip(values) {
                let y = instance.y.unwrap_or_default();
                x2y2z
                    .entry(instance.x as i64)
                    .or_default()
                    .insert(y as i64, value as i64);
            }
            pattern::detect_plane_2d_with_sections(&x2y2z, self.min_section_size)
        } else {
            let x2z: Observations = instances
                .iter()
                .zip(values)
                .map(|(instance, value)| (instance.x as i64, value as i64))
                .collect();
            pattern::detect(&x2z, self.min_section_size)
        }
    }
}

/// Iteration ranges, if the instances cover a contiguous range (or a full
/// rectangle) exactly once. `instances` must be sorted by `(x, y)`.
fn domain(
    instances: &[&LoopInstance],
    two_dimensional: bool,
) -> Result<(Range<usize>, Option<Range<usize>>), LoopFallback> {
    let xs: Vec<usize> = instances.iter().map(|i| i.x).dedup().collect();
    let x_range = contiguous(&xs).ok_or(LoopFallback::NonContiguousDomain)?;

    if !two_dimensional {
        return if xs.len() == instances.len() {
            Ok((x_range, None))
        } else {
            Err(LoopFallback::NonContiguousDomain)
        };
    }

    let ys: Vec<usize> = instances
        .iter()
        .filter_map(|i| i.y)
        .sorted()
        .dedup()
        .collect();
    let y_range = contiguous(&ys).ok_or(LoopFallback::NonContiguousDomain)?;

    let distinct = instances.iter().map(|i| (i.x, i.y)).dedup().count();
    if distinct != instances.len() || distinct != xs.len() * ys.len() {
        return Err(LoopFallback::NonContiguousDomain);
    }

    Ok((x_range, Some(y_range)))
}

fn contiguous(sorted: &[usize]) -> Option<Range<usize>> {
    let first = *sorted.first()?;
    sorted
        .iter()
        .enumerate()
        .all(|(offset, &value)| value == first + offset)
        .then_some(first..first + sorted.len())
}
