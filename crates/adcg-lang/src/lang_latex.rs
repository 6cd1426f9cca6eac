//! LaTeX backend rendering the computation as an `align*` block.
//!
//! Only scalar operations and conditionals have a rendering rule; arrays
//! and atomic calls raise [`EmitError::UnknownOperation`].

use crate::error::EmitError;
use crate::language::{GenerationData, Language, OperandValue};
use adcg_ir::{CompareOp, DefaultBinding, NodeId, OpKind, Operand, OperandBinding};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct LatexLanguage;

impl OperandBinding for LatexLanguage {
    fn requires_named_operand(&self, kind: OpKind, position: usize) -> bool {
        DefaultBinding.requires_named_operand(kind, position)
    }
}

impl Language for LatexLanguage {
    fn generate_source_code(&self, data: &GenerationData<'_>) -> Result<String, EmitError> {
        let mut output = String::new();
        writeln!(output, "\\begin{{align*}}")?;

        for &id in data.schedule.order() {
            if data.schedule.is_inlined(id) {
                continue;
            }
            let kind = data.graph.node(id).kind();
            if !kind.is_scalar() {
                return Err(EmitError::UnknownOperation { node: id, kind });
            }

            let expression = self.expression(data, id)?;
            if let Some(destination) = data.variable_name(id) {
                writeln!(output, "{} &= {} \\\\", destination, expression)?;
                for position in data.pending_copies(id) {
                    writeln!(output, "{} &= {} \\\\", data.names.dependent(position), destination)?;
                }
            }
        }

        for (position, dependent) in data.trivial_dependents() {
            let value = match dependent {
                Operand::Constant(value) => number(value),
                Operand::Node(id) => data
                    .variable_name(id)
                    .ok_or(EmitError::MissingOperandBinding { node: id, operand: 0 })?,
            };
            writeln!(output, "{} &= {} \\\\", data.names.dependent(position), value)?;
        }

        writeln!(output, "\\end{{align*}}")?;
        Ok(output)
    }
}

impl LatexLanguage {
    fn expression(&self, data: &GenerationData<'_>, id: NodeId) -> Result<String, EmitError> {
        let node = data.graph.node(id);
        let arguments = (0..node.operands().len())
            .map(|position| {
                let requires_named = self.requires_named_operand(node.kind(), position);
                Ok(match data.operand_value(id, position, requires_named)? {
                    OperandValue::Constant(value) => number(value),
                    OperandValue::Variable(name) => name,
                    OperandValue::Inline(inner) => format!("\\left({}\\right)", self.expression(data, inner)?),
                })
            })
            .collect::<Result<Vec<_>, EmitError>>()?;

        let expression = match (node.kind(), arguments.as_slice()) {
            (OpKind::Add, [a, b]) => format!("{} + {}", a, b),
            (OpKind::Sub, [a, b]) => format!("{} - {}", a, b),
            (OpKind::Mul, [a, b]) => format!("{} \\cdot {}", a, b),
            (OpKind::Div, [a, b]) => format!("\\frac{{{}}}{{{}}}", a, b),
            (OpKind::Pow, [a, b]) => format!("{{{}}}^{{{}}}", a, b),
            (OpKind::UnaryMinus, [a]) => format!("-{}", a),
            (OpKind::Abs, [a]) => format!("\\left|{}\\right|", a),
            (OpKind::Sqrt, [a]) => format!("\\sqrt{{{}}}", a),
            (OpKind::Sign, [a]) => format!("\\operatorname{{sgn}}\\left({}\\right)", a),
            (OpKind::CondExp(op), [left, right, if_true, if_false]) => format!(
                "\\begin{{cases}} {} & \\text{{if }} {} {} {} \\\\ {} & \\text{{otherwise}} \\end{{cases}}",
                if_true,
                left,
                relation(op),
                right,
                if_false
            ),
            (kind, [a]) => match function(kind) {
                Some(function) => format!("{}\\left({}\\right)", function, a),
                None => return Err(EmitError::UnknownOperation { node: id, kind }),
            },
            (kind, _) => return Err(EmitError::UnknownOperation { node: id, kind }),
        };

        Ok(expression)
    }
}

fn function(kind: OpKind) -> Option<&'static str> {
    Some(match kind {
        OpKind::Acos => "\\arccos",
        OpKind::Asin => "\\arcsin",
        OpKind::Atan => "\\arctan",
        OpKind::Cos => "\\cos",
        OpKind::Cosh => "\\cosh",
        OpKind::Exp => "\\exp",
        OpKind::Log => "\\ln",
        OpKind::Sin => "\\sin",
        OpKind::Sinh => "\\sinh",
        OpKind::Tan => "\\tan",
        OpKind::Tanh => "\\tanh",
        _ => return None,
    })
}

fn relation(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Lt => "<",
        CompareOp::Le => "\\le",
        CompareOp::Eq => "=",
        CompareOp::Ge => "\\ge",
        CompareOp::Gt => ">",
        CompareOp::Ne => "\\ne",
    }
}

fn number(value: f64) -> String {
    if value.is_nan() {
        "\\mathrm{NaN}".to_string()
    } else if value.is_infinite() {
        let infinity = if value > 0.0 { "\\infty" } else { "\\left(-\\infty\\right)" };
        infinity.to_string()
    } else if value.is_sign_negative() {
        format!("\\left({}\\right)", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name_gen::LatexNameGenerator;
    use adcg_ir::{Analyzer, AnalyzerOptions, Graph};
    use rstest::rstest;
    use rustc_hash::FxHashMap;

    fn generate(graph: &Graph, dependents: &[Operand]) -> Result<String, EmitError> {
        let schedule = Analyzer::new(AnalyzerOptions::default()).analyze(graph, dependents, &LatexLanguage)?;
        LatexLanguage.generate_source_code(&GenerationData {
            graph,
            schedule: &schedule,
            names: &LatexNameGenerator,
            loops: &[],
            atomic_names: &FxHashMap::default(),
        })
    }

    #[rstest]
    #[case(2.0, "2")]
    #[case(0.25, "0.25")]
    #[case(-3.0, "\\left(-3\\right)")]
    #[case(f64::INFINITY, "\\infty")]
    fn test_number(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(number(value), expected);
    }

    #[test]
    fn test_scalar_statements() {
        let mut graph = Graph::new();
        let x0 = graph.add_independent();
        let x1 = graph.add_independent();
        let t = graph.binary(OpKind::Div, x0, x1).unwrap();
        let y0 = graph.unary(OpKind::Log, t).unwrap();
        let y1 = graph.binary(OpKind::Pow, t, 2.0).unwrap();

        let source = generate(&graph, &[y0.into(), y1.into(), 4.0.into()]).unwrap();

        assert_eq!(
            source,
            concat!(
                "\\begin{align*}\n",
                "v_{0} &= \\frac{x_{0}}{x_{1}} \\\\\n",
                "y_{0} &= \\ln\\left(v_{0}\\right) \\\\\n",
                "y_{1} &= {v_{0}}^{2} \\\\\n",
                "y_{2} &= 4 \\\\\n",
                "\\end{align*}\n",
            )
        );
    }

    #[test]
    fn test_named_nodes() {
        let mut graph = Graph::new();
        let x0 = graph.add_independent();
        let x1 = graph.add_independent();
        let q = graph.binary(OpKind::Div, x0, x1).unwrap();
        graph.set_name(q, "q").unwrap();
        let y = graph.unary(OpKind::Log, q).unwrap();

        let source = generate(&graph, &[y.into()]).unwrap();

        assert_eq!(
            source,
            concat!(
                "\\begin{align*}\n",
                "q &= \\frac{x_{0}}{x_{1}} \\\\\n",
                "y_{0} &= \\ln\\left(q\\right) \\\\\n",
                "\\end{align*}\n",
            )
        );
    }

    #[test]
    fn test_conditional() {
        let mut graph = Graph::new();
        let x0 = graph.add_independent();
        let c = graph.cond_exp(CompareOp::Le, x0, 0.0, 0.0, x0).unwrap();

        let source = generate(&graph, &[c.into()]).unwrap();

        assert!(source.contains(
            "y_{0} &= \\begin{cases} 0 & \\text{if } x_{0} \\le 0 \\\\ x_{0} & \\text{otherwise} \\end{cases} \\\\"
        ));
    }

    #[test]
    fn test_arrays_have_no_rule() {
        let mut graph = Graph::new();
        let x0 = graph.add_independent();
        let array = graph.array([Operand::Node(x0)]).unwrap();
        let element = graph.array_element(array, None, 0).unwrap();
        let y = graph.unary(OpKind::Exp, element).unwrap();

        assert_eq!(
            generate(&graph, &[y.into()]).unwrap_err(),
            EmitError::UnknownOperation {
                node: array,
                kind: OpKind::ArrayCreation
            }
        );
    }
}
