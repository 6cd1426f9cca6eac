//! Graph inspection utilities.

use crate::graph::Graph;
use crate::schedule::Schedule;
use std::fmt::{self, Write};

/// Dumps every node of the graph, one per line, with its scheduling data
/// when a schedule is given.
///
/// Output format:
/// ```text
/// === Graph Dump ===
/// Total nodes: 3 (2 independent)
///
/// 0000 independent[0]
/// 0001 independent[1]
/// 0002 n0 * n1  [order: 1, uses: 0, last use: 0, slot: 3]
/// ```
pub fn dump_graph(graph: &Graph, schedule: Option<&Schedule>) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = write_graph(&mut output, graph, schedule);
    output
}

fn write_graph(output: &mut String, graph: &Graph, schedule: Option<&Schedule>) -> fmt::Result {
    writeln!(output, "=== Graph Dump ===")?;
    writeln!(
        output,
        "Total nodes: {} ({} independent)",
        graph.len(),
        graph.independents().len()
    )?;
    if let Some(schedule) = schedule {
        writeln!(
            output,
            "Scheduled: {}, temporaries: {}, array size: {}",
            schedule.order().len(),
            schedule.temporary_count(),
            schedule.array_size()
        )?;
    }
    writeln!(output)?;

    for (id, node) in graph.iter() {
        match graph.independent_index(id) {
            Some(index) => write!(output, "{:04} independent[{}]", id.id(), index)?,
            None => write!(output, "{:04} {}", id.id(), node)?,
        }

        if let Some(schedule) = schedule {
            let entry = schedule.entry(id);
            if entry.eval_order > 0 {
                write!(
                    output,
                    "  [order: {}, uses: {}, last use: {}, slot: {}",
                    entry.eval_order, entry.total_use_count, entry.last_use_order, entry.variable_slot
                )?;
                if let Some(consumer) = entry.inlined_into {
                    write!(output, ", inlined into {}", consumer)?;
                }
                write!(output, "]")?;
            }
        }

        writeln!(output)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerOptions;
    use crate::node::Operand;
    use crate::op::OpKind;
    use crate::schedule::{Analyzer, DefaultBinding};

    #[test]
    fn test_dump_graph() {
        let mut graph = Graph::new();
        let x0 = graph.add_independent();
        let x1 = graph.add_independent();
        graph.binary(OpKind::Mul, x0, x1).unwrap();

        let dump = dump_graph(&graph, None);

        assert!(dump.contains("=== Graph Dump ==="));
        assert!(dump.contains("Total nodes: 3 (2 independent)"));
        assert!(dump.contains("0001 independent[1]"));
        assert!(dump.contains("0002 n0 * n1"));
        assert!(!dump.contains("order:"));
    }

    #[test]
    fn test_dump_graph_with_schedule() {
        let mut graph = Graph::new();
        let x0 = graph.add_independent();
        let y = graph.unary(OpKind::Cos, x0).unwrap();
        let unused = graph.unary(OpKind::Sin, x0).unwrap();
        let schedule = Analyzer::new(AnalyzerOptions::default())
            .analyze(&graph, &[Operand::Node(y)], &DefaultBinding)
            .unwrap();

        let dump = dump_graph(&graph, Some(&schedule));
        let lines: Vec<&str> = dump.lines().collect();

        assert!(dump.contains("Scheduled: 1, temporaries: 0, array size: 0"));
        assert!(lines.contains(&"0001 cos( n0 )  [order: 1, uses: 0, last use: 0, slot: 2]"));
        assert!(lines.iter().any(|line| line.starts_with(&format!("{:04}", unused.id())) && !line.contains("order")));
    }
}
