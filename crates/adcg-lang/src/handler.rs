//! The generation driver: analyze, fold loops, emit.

use crate::config::CodegenConfig;
use crate::error::EmitError;
use crate::lang_c::CLanguage;
use crate::language::{GenerationData, Language};
use crate::name_gen::VariableNameGenerator;
use adcg_ir::{Analyzer, Graph, LoopDetector, LoopGroup, LoopPlan, NodeId, OpKind, Operand, Schedule};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::debug;

/// What to generate: the dependent values, optional loop groups over them,
/// and the external names of atomic functions.
#[derive(Debug, Clone, Default)]
pub struct CodegenInput {
    pub dependents: Vec<Operand>,
    pub loops: Vec<LoopGroup>,
    pub atomic_names: FxHashMap<usize, SmolStr>,
}

impl CodegenInput {
    pub fn new(dependents: impl IntoIterator<Item = Operand>) -> Self {
        Self {
            dependents: dependents.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_loops(mut self, loops: impl IntoIterator<Item = LoopGroup>) -> Self {
        self.loops.extend(loops);
        self
    }

    pub fn with_atomic_name(mut self, atomic_id: usize, name: impl Into<SmolStr>) -> Self {
        self.atomic_names.insert(atomic_id, name.into());
        self
    }
}

/// One external function call made by the generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicCallSite {
    pub atomic_id: usize,
    pub name: SmolStr,
    pub argument_count: usize,
    pub result_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    pub source: String,
    /// Size of the temporary variable buffer.
    pub temporary_count: usize,
    /// Size of the temporary array buffer.
    pub temporary_array_size: usize,
    pub atomic_calls: Vec<AtomicCallSite>,
    pub loop_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CodeHandler {
    config: CodegenConfig,
}

impl CodeHandler {
    pub fn new(config: CodegenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodegenConfig {
        &self.config
    }

    /// The C backend configured by the `[c]` table of this handler's
    /// configuration.
    pub fn c_language(&self) -> CLanguage {
        CLanguage::new(self.config.c.clone())
    }

    /// Generates source code for `input.dependents` over `graph`.
    ///
    /// # Errors
    ///
    /// Graph errors from the analysis ([`EmitError::Graph`]) and the
    /// emission errors of `language`. Loop groups that fail verification are
    /// not errors; they are emitted unrolled.
    pub fn generate<L: Language + ?Sized>(
        &self,
        graph: &Graph,
        input: &CodegenInput,
        language: &L,
        names: &dyn VariableNameGenerator,
    ) -> Result<GeneratedSource, EmitError> {
        let mut schedule = Analyzer::new(self.config.analyzer.clone()).analyze(graph, &input.dependents, language)?;

        let plans = if self.config.detect_loops && language.supports_loops() && !input.loops.is_empty() {
            let detector = LoopDetector::new(graph, &schedule, self.config.analyzer.min_section_size);
            detector.plan_all_with(&input.loops, |plan| addressable(plan, names))
        } else {
            Vec::new()
        };

        if !plans.is_empty() {
            let mut locals: FxHashSet<NodeId> = FxHashSet::default();
            for plan in &plans {
                for &invariant in &plan.invariants {
                    schedule.set_last_usage_order(graph, invariant, plan.anchor)?;
                }
                locals.extend(plan.locals.iter().copied());
            }
            schedule.assign_slots(graph, &locals);
        }

        let source = language.generate_source_code(&GenerationData {
            graph,
            schedule: &schedule,
            names,
            loops: &plans,
            atomic_names: &input.atomic_names,
        })?;
        let atomic_calls = atomic_call_sites(graph, &schedule, &input.atomic_names)?;

        debug!(
            nodes = schedule.order().len(),
            temporaries = schedule.temporary_count(),
            array_size = schedule.array_size(),
            loops = plans.len(),
            atomic_calls = atomic_calls.len(),
            "Generated source"
        );

        Ok(GeneratedSource {
            source,
            temporary_count: schedule.temporary_count(),
            temporary_array_size: schedule.array_size(),
            atomic_calls,
            loop_count: plans.len(),
        })
    }
}

/// A loop indexes independents and dependents at runtime, so every one it
/// touches must be an element of the naming policy's arrays.
fn addressable(plan: &LoopPlan, names: &dyn VariableNameGenerator) -> bool {
    let independents = match plan.independents.first() {
        Some(&first) => plan
            .independents
            .iter()
            .all(|&index| names.is_in_same_independent_array(first, index)),
        None => true,
    };
    let dependents = plan.dependents.iter().all(|&position| names.is_in_dependent_array(position));

    if !(independents && dependents) {
        debug!(anchor = plan.anchor, "Loop touches individually named variables, emitting it unrolled");
    }
    independents && dependents
}

fn atomic_call_sites(
    graph: &Graph,
    schedule: &Schedule,
    atomic_names: &FxHashMap<usize, SmolStr>,
) -> Result<Vec<AtomicCallSite>, EmitError> {
    let array_length = |operand: Operand| -> Result<usize, EmitError> {
        Ok(match graph.resolve(operand)? {
            Operand::Node(array) => graph.node(array).operands().len(),
            Operand::Constant(_) => 0,
        })
    };

    let mut sites = Vec::new();
    for &id in schedule.order() {
        let node = graph.node(id);
        let operands = node.operands();
        let (argument_count, result_count) = match node.kind() {
            OpKind::AtomicForward => (array_length(operands[0])?, array_length(operands[1])?),
            OpKind::AtomicReverse => (
                array_length(operands[0])? + array_length(operands[1])? + array_length(operands[3])?,
                array_length(operands[2])?,
            ),
            _ => continue,
        };
        let atomic_id = node.info()[0];

        sites.push(AtomicCallSite {
            atomic_id,
            name: atomic_names
                .get(&atomic_id)
                .cloned()
                .unwrap_or_else(|| smol_str::format_smolstr!("atomic{}", atomic_id)),
            argument_count,
            result_count,
        });
    }

    Ok(sites)
}
