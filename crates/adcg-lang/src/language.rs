//! The backend protocol shared by every target language.

use crate::error::EmitError;
use crate::name_gen::VariableNameGenerator;
use adcg_ir::{Graph, LoopPlan, NodeId, OpKind, Operand, OperandBinding, Schedule, VariableBinding};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::{SmolStr, format_smolstr};

/// A source-code backend.
///
/// The [`OperandBinding`] supertrait tells the analyzer which operand
/// positions the language can only address through a bound variable and
/// which nodes get a variable at all.
pub trait Language: OperandBinding {
    /// Whether accepted loop plans can be rendered. Languages returning
    /// `false` always receive an empty plan list.
    fn supports_loops(&self) -> bool {
        false
    }

    fn generate_source_code(&self, data: &GenerationData<'_>) -> Result<String, EmitError>;
}

/// Everything a backend needs to render one analyzed graph.
pub struct GenerationData<'a> {
    pub graph: &'a Graph,
    pub schedule: &'a Schedule,
    pub names: &'a dyn VariableNameGenerator,
    pub loops: &'a [LoopPlan],
    pub atomic_names: &'a FxHashMap<usize, SmolStr>,
}

/// How an operand reaches the consuming expression.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandValue {
    Constant(f64),
    Variable(String),
    /// Rendered in place from the node's own expression.
    Inline(NodeId),
}

impl GenerationData<'_> {
    /// External function name of an atomic call, `atomic{id}` when unnamed.
    pub fn atomic_name(&self, atomic_id: usize) -> SmolStr {
        self.atomic_names
            .get(&atomic_id)
            .cloned()
            .unwrap_or_else(|| format_smolstr!("atomic{}", atomic_id))
    }

    /// Name of the variable holding the node's value, if it has one. A named
    /// scalar node is held in a variable of that name. Array element reads
    /// name the element inside their array's block.
    pub fn variable_name(&self, id: NodeId) -> Option<String> {
        let node = self.graph.node(id);
        if let Some(name) = node.name() {
            if node.kind().is_scalar() {
                return Some(name.to_string());
            }
        }

        match self.schedule.binding(self.graph, id) {
            VariableBinding::Independent(index) => Some(self.names.independent(index)),
            VariableBinding::Dependent(position) => Some(self.names.dependent(position)),
            VariableBinding::Temporary(index) => Some(self.names.temporary(index)),
            VariableBinding::Array(start) => Some(self.names.temporary_array_element(start)),
            VariableBinding::Unbound => {
                if node.kind() != OpKind::ArrayElement {
                    return None;
                }
                let array = self.graph.resolve(node.operands()[0]).ok()?.node()?;
                match self.schedule.binding(self.graph, array) {
                    VariableBinding::Array(start) => Some(self.names.temporary_array_element(start + node.info()[0])),
                    _ => None,
                }
            }
        }
    }

    /// Resolves operand `position` of `consumer`.
    ///
    /// # Errors
    ///
    /// [`EmitError::MissingOperandBinding`] when the operand has no variable
    /// although it is not inlined, or when the position requires a named
    /// operand and the operand is a constant.
    pub fn operand_value(
        &self,
        consumer: NodeId,
        position: usize,
        requires_named: bool,
    ) -> Result<OperandValue, EmitError> {
        let missing = EmitError::MissingOperandBinding {
            node: consumer,
            operand: position,
        };
        let operand = self.graph.node(consumer).operands()[position];

        match self.graph.resolve(operand)? {
            Operand::Constant(_) if requires_named => Err(missing),
            Operand::Constant(value) => Ok(OperandValue::Constant(value)),
            Operand::Node(id) if !requires_named && self.schedule.is_inlined(id) => Ok(OperandValue::Inline(id)),
            Operand::Node(id) => self.variable_name(id).map(OperandValue::Variable).ok_or(missing),
        }
    }

    /// Dependent positions the node's value must still be copied into after
    /// it is computed: all of them except the one it is written to directly.
    pub fn pending_copies(&self, id: NodeId) -> Vec<usize> {
        let own = match self.schedule.binding(self.graph, id) {
            VariableBinding::Dependent(position) => Some(position),
            _ => None,
        };
        let claimed = self.loop_dependents();

        self.schedule
            .dependent_positions(id)
            .iter()
            .copied()
            .filter(|position| Some(*position) != own && !claimed.contains(position))
            .collect()
    }

    /// Dependents that are not computed by any node: constants and plain
    /// copies of independent variables, with their positions.
    pub fn trivial_dependents(&self) -> Vec<(usize, Operand)> {
        let claimed = self.loop_dependents();

        self.schedule
            .dependents()
            .iter()
            .enumerate()
            .filter(|(position, _)| !claimed.contains(position))
            .filter(|(_, dependent)| match dependent {
                Operand::Constant(_) => true,
                Operand::Node(id) => self.graph.independent_index(*id).is_some(),
            })
            .map(|(position, dependent)| (position, *dependent))
            .collect()
    }

    /// Named scalar nodes computed by a statement of their own, in
    /// evaluation order. Backends that declare variables declare these.
    pub fn named_variables(&self) -> Vec<(NodeId, &str)> {
        self.schedule
            .order()
            .iter()
            .filter(|id| !self.is_loop_local(**id) && !self.schedule.is_inlined(**id))
            .filter_map(|&id| {
                let node = self.graph.node(id);
                node.name().filter(|_| node.kind().is_scalar()).map(|name| (id, name))
            })
            .collect()
    }

    pub fn is_loop_local(&self, id: NodeId) -> bool {
        self.loops.iter().any(|plan| plan.locals.contains(&id))
    }

    fn loop_dependents(&self) -> FxHashSet<usize> {
        self.loops
            .iter()
            .flat_map(|plan| plan.dependents.iter().copied())
            .collect()
    }
}
