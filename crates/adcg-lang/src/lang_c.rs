//! C source backend.

use crate::error::EmitError;
use crate::language::{GenerationData, Language, OperandValue};
use adcg_ir::{
    BodyOperand, DefaultBinding, LoopPlan, NodeId, OpKind, Operand, OperandBinding, VariableBinding,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Arrays filled from at least this many consecutive independents are
/// filled by a copy loop.
const MIN_COPY_LOOP_LENGTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CLanguageConfig {
    pub indent_width: usize,
    /// Wraps the statements in `void name(const double *x, double *y)`.
    pub function_name: Option<String>,
    pub base_type: String,
}

impl Default for CLanguageConfig {
    fn default() -> Self {
        Self {
            indent_width: 4,
            function_name: None,
            base_type: "double".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CLanguage {
    config: CLanguageConfig,
}

impl CLanguage {
    pub fn new(config: CLanguageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CLanguageConfig {
        &self.config
    }
}

impl OperandBinding for CLanguage {
    fn requires_named_operand(&self, kind: OpKind, position: usize) -> bool {
        DefaultBinding.requires_named_operand(kind, position)
    }
}

impl Language for CLanguage {
    fn supports_loops(&self) -> bool {
        true
    }

    fn generate_source_code(&self, data: &GenerationData<'_>) -> Result<String, EmitError> {
        CEmitter {
            language: self,
            data,
            output: String::new(),
            depth: 0,
        }
        .emit()
    }
}

struct CEmitter<'a, 'b> {
    language: &'a CLanguage,
    data: &'a GenerationData<'b>,
    output: String,
    depth: usize,
}

impl CEmitter<'_, '_> {
    fn emit(mut self) -> Result<String, EmitError> {
        let language = self.language;
        let config = &language.config;
        let data = self.data;
        let names = data.names;

        if let Some(function_name) = &config.function_name {
            self.line(&format!(
                "void {}(const {} *{}, {} *{}) {{",
                function_name,
                config.base_type,
                names.independent_base(),
                config.base_type,
                names.dependent_base()
            ))?;
            self.depth += 1;
        }

        let mut declared = false;
        if data.schedule.temporary_count() > 0 {
            self.line(&format!(
                "{} {}[{}];",
                config.base_type,
                names.temporary_base(),
                data.schedule.temporary_count()
            ))?;
            declared = true;
        }
        if data.schedule.array_size() > 0 {
            self.line(&format!(
                "{} {}[{}];",
                config.base_type,
                names.temporary_array_base(),
                data.schedule.array_size()
            ))?;
            declared = true;
        }
        for (_, name) in data.named_variables() {
            self.line(&format!("{} {};", config.base_type, name))?;
            declared = true;
        }
        if declared {
            writeln!(self.output)?;
        }

        let plans: Vec<&LoopPlan> = data.loops.iter().sorted_by_key(|plan| plan.anchor).collect();
        let mut pending = plans.into_iter().peekable();

        while let Some(plan) = pending.next_if(|plan| plan.anchor == 0) {
            self.emit_loop(plan)?;
        }

        for &id in data.schedule.order() {
            self.statement(id)?;

            let order = data.schedule.eval_order(id);
            while let Some(plan) = pending.next_if(|plan| plan.anchor <= order) {
                self.emit_loop(plan)?;
            }
        }

        for plan in pending {
            self.emit_loop(plan)?;
        }

        for (position, dependent) in data.trivial_dependents() {
            let value = match dependent {
                Operand::Constant(value) => literal(value),
                Operand::Node(id) => data
                    .variable_name(id)
                    .ok_or(EmitError::MissingOperandBinding { node: id, operand: 0 })?,
            };
            self.line(&format!("{} = {};", names.dependent(position), value))?;
        }

        if config.function_name.is_some() {
            self.depth -= 1;
            self.line("}")?;
        }

        Ok(self.output)
    }

    fn statement(&mut self, id: NodeId) -> Result<(), EmitError> {
        let data = self.data;
        if data.is_loop_local(id) || data.schedule.is_inlined(id) {
            return Ok(());
        }

        let node = data.graph.node(id);
        match node.kind() {
            OpKind::ArrayCreation => self.array_fill(id)?,
            OpKind::ArrayElement => {}
            OpKind::AtomicForward => {
                let info = node.info();
                let arrays = self.array_arguments(id)?;
                self.line(&format!(
                    "{}_forward({}, {}, {});",
                    data.atomic_name(info[0]),
                    info[1],
                    info[2],
                    arrays
                ))?;
            }
            OpKind::AtomicReverse => {
                let info = node.info();
                let arrays = self.array_arguments(id)?;
                self.line(&format!("{}_reverse({}, {});", data.atomic_name(info[0]), info[1], arrays))?;
            }
            kind if kind.is_scalar() => {
                let expression = self.expression(id)?;
                if let Some(destination) = data.variable_name(id) {
                    self.line(&format!("{} = {};", destination, expression))?;
                }
            }
            kind => return Err(EmitError::UnknownOperation { node: id, kind }),
        }

        let copies = data.pending_copies(id);
        if !copies.is_empty() {
            let value = data
                .variable_name(id)
                .ok_or(EmitError::MissingOperandBinding { node: id, operand: 0 })?;
            for position in copies {
                self.line(&format!("{} = {};", data.names.dependent(position), value))?;
            }
        }

        Ok(())
    }

    fn expression(&self, id: NodeId) -> Result<String, EmitError> {
        let node = self.data.graph.node(id);
        let arguments = (0..node.operands().len())
            .map(|position| self.argument(id, position))
            .collect::<Result<Vec<_>, _>>()?;

        scalar_expression(node.kind(), &arguments).ok_or(EmitError::UnknownOperation {
            node: id,
            kind: node.kind(),
        })
    }

    fn argument(&self, id: NodeId, position: usize) -> Result<String, EmitError> {
        let kind = self.data.graph.node(id).kind();
        let requires_named = self.language.requires_named_operand(kind, position);

        Ok(match self.data.operand_value(id, position, requires_named)? {
            OperandValue::Constant(value) => literal(value),
            OperandValue::Variable(name) => name,
            OperandValue::Inline(inner) => format!("({})", self.expression(inner)?),
        })
    }

    /// `&array[start]` for every array operand of an atomic call.
    fn array_arguments(&self, id: NodeId) -> Result<String, EmitError> {
        let operands = self.data.graph.node(id).operands().len();
        let arrays = (0..operands)
            .map(|position| self.argument(id, position).map(|name| format!("&{}", name)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(arrays.join(", "))
    }

    fn array_fill(&mut self, id: NodeId) -> Result<(), EmitError> {
        let data = self.data;
        let names = data.names;
        let VariableBinding::Array(start) = data.schedule.binding(data.graph, id) else {
            return Err(EmitError::MissingOperandBinding { node: id, operand: 0 });
        };
        let length = data.graph.node(id).operands().len();

        let mut position = 0;
        while position < length {
            let run = self.independent_run(id, position);
            if run.len() >= MIN_COPY_LOOP_LENGTH {
                let index = names.loop_index(0);
                self.line(&format!(
                    "for (int {0} = 0; {0} < {1}; {0}++) {2}[{3} + {0}] = {4};",
                    index,
                    run.len(),
                    names.temporary_array_base(),
                    start + position,
                    names.independent_at(&format!("{} + {}", run[0], index))
                ))?;
                position += run.len();
            } else {
                let value = self.argument(id, position)?;
                self.line(&format!("{} = {};", names.temporary_array_element(start + position), value))?;
                position += 1;
            }
        }

        Ok(())
    }

    /// Independent indices of the longest run of consecutive independents
    /// stored from `position` on.
    fn independent_run(&self, id: NodeId, position: usize) -> Vec<usize> {
        let graph = self.data.graph;
        let operands = graph.node(id).operands();
        let independent = |operand: &Operand| {
            graph
                .resolve(*operand)
                .ok()
                .and_then(|resolved| resolved.node())
                .and_then(|node| graph.independent_index(node))
        };

        let mut run: Vec<usize> = Vec::new();
        for operand in &operands[position..] {
            let Some(index) = independent(operand) else {
                break;
            };
            if let Some(&previous) = run.last() {
                if !self.data.names.is_consecutive_in_independent_array(previous, index) {
                    break;
                }
            }
            run.push(index);
        }
        run
    }

    fn emit_loop(&mut self, plan: &LoopPlan) -> Result<(), EmitError> {
        let names = self.data.names;
        let x = names.loop_index(0);
        self.line(&format!(
            "for (int {0} = {1}; {0} < {2}; {0}++) {{",
            x, plan.x_range.start, plan.x_range.end
        ))?;
        self.depth += 1;

        let y = match &plan.y_range {
            Some(range) => {
                let y = names.loop_index(1);
                self.line(&format!("for (int {0} = {1}; {0} < {2}; {0}++) {{", y, range.start, range.end))?;
                self.depth += 1;
                Some(y)
            }
            None => None,
        };

        for (index, body) in plan.body.iter().enumerate() {
            let arguments = body
                .operands
                .iter()
                .map(|operand| self.body_operand(operand, &x, y.as_deref()))
                .collect::<Result<Vec<_>, _>>()?;
            let expression = scalar_expression(body.kind, &arguments).ok_or(EmitError::UnknownOperation {
                node: body.origin,
                kind: body.kind,
            })?;
            self.line(&format!(
                "{} {} = {};",
                self.language.config.base_type,
                names.loop_local(index),
                expression
            ))?;
        }

        for equation in &plan.equations {
            let value = self.body_operand(&equation.value, &x, y.as_deref())?;
            let destination = names.dependent_at(&equation.dependent.render(&x, y.as_deref()));
            self.line(&format!("{} = {};", destination, value))?;
        }

        if y.is_some() {
            self.depth -= 1;
            self.line("}")?;
        }
        self.depth -= 1;
        self.line("}")
    }

    fn body_operand(&self, operand: &BodyOperand, x: &str, y: Option<&str>) -> Result<String, EmitError> {
        Ok(match operand {
            BodyOperand::Constant(value) => literal(*value),
            BodyOperand::Local(index) => self.data.names.loop_local(*index),
            BodyOperand::Invariant(id) => self
                .data
                .variable_name(*id)
                .ok_or(EmitError::MissingOperandBinding { node: *id, operand: 0 })?,
            BodyOperand::Independent(pattern) => self.data.names.independent_at(&pattern.render(x, y)),
        })
    }

    fn line(&mut self, text: &str) -> Result<(), EmitError> {
        let indent = self.depth * self.language.config.indent_width;
        writeln!(self.output, "{:indent$}{}", "", text, indent = indent)?;
        Ok(())
    }
}

/// C expression of a scalar operation over already rendered arguments.
fn scalar_expression(kind: OpKind, arguments: &[String]) -> Option<String> {
    let expression = match (kind, arguments) {
        (OpKind::Add, [a, b]) => format!("{} + {}", a, b),
        (OpKind::Sub, [a, b]) => format!("{} - {}", a, b),
        (OpKind::Mul, [a, b]) => format!("{} * {}", a, b),
        (OpKind::Div, [a, b]) => format!("{} / {}", a, b),
        (OpKind::Pow, [a, b]) => format!("pow({}, {})", a, b),
        (OpKind::UnaryMinus, [a]) => format!("-{}", a),
        (OpKind::Abs, [a]) => format!("fabs({})", a),
        (OpKind::Sign, [a]) => format!("({0} > 0.0? 1.0 : ({0} < 0.0? -1.0 : 0.0))", a),
        (OpKind::CondExp(op), [left, right, if_true, if_false]) => {
            format!("({} {} {})? {} : {}", left, op.symbol(), right, if_true, if_false)
        }
        (kind, [a]) if kind.is_unary() => format!("{}({})", kind.name(), a),
        _ => return None,
    };
    Some(expression)
}

/// C literal for a double constant. Negative values are parenthesized so
/// they can follow any operator.
fn literal(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        let infinity = if value > 0.0 { "INFINITY" } else { "(-INFINITY)" };
        infinity.to_string()
    } else if value.is_sign_negative() {
        format!("({:?})", value)
    } else {
        format!("{:?}", value)
    }
}
