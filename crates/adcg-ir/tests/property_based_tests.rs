//! Property-based tests for graph scheduling and index-pattern detection.
use adcg_ir::pattern::{self, Observations, PlaneObservations};
use adcg_ir::{
    Analyzer, AnalyzerOptions, DefaultBinding, Graph, IndexPattern, LinearPattern, NodeId, OpKind, Operand, Schedule,
    VariableBinding,
};
use proptest::prelude::*;
use rustc_hash::FxHashMap;

/// One recorded operation: `(operation, left, right, right is a constant)`.
type Step = (u8, usize, usize, bool);

#[derive(Debug, Clone)]
struct Recipe {
    independents: usize,
    steps: Vec<Step>,
    dependents: Vec<usize>,
}

impl Recipe {
    fn build(&self) -> (Graph, Vec<Operand>) {
        let mut graph = Graph::new();
        let mut ids: Vec<NodeId> = (0..self.independents).map(|_| graph.add_independent()).collect();

        for &(operation, left, right, constant) in &self.steps {
            let left = ids[left % ids.len()];
            let right: Operand = if constant {
                Operand::Constant(2.0)
            } else {
                ids[right % ids.len()].into()
            };
            let id = match operation % 4 {
                0 => graph.unary(OpKind::Sin, left),
                1 => graph.unary(OpKind::Exp, left),
                2 => graph.binary(OpKind::Add, left, right),
                _ => graph.binary(OpKind::Mul, left, right),
            }
            .unwrap();
            ids.push(id);
        }

        let dependents = self
            .dependents
            .iter()
            .map(|&index| ids[index % ids.len()].into())
            .collect();
        (graph, dependents)
    }
}

mod strategies {
    use super::*;

    pub fn recipe() -> impl Strategy<Value = Recipe> {
        (
            1usize..5,
            prop::collection::vec((any::<u8>(), any::<usize>(), any::<usize>(), any::<bool>()), 1..40),
            prop::collection::vec(any::<usize>(), 1..6),
        )
            .prop_map(|(independents, steps, dependents)| Recipe {
                independents,
                steps,
                dependents,
            })
    }

    /// `floor((x - x_offset) / dx) * dy + b` with small coefficients.
    pub fn linear() -> impl Strategy<Value = LinearPattern> {
        (-5i64..5, -6i64..6, 1i64..5, -20i64..20).prop_map(|(x_offset, dy, dx, b)| LinearPattern {
            x_offset,
            dy,
            dx,
            b,
        })
    }

    pub fn domain() -> impl Strategy<Value = (i64, i64)> {
        (-3i64..3, 1i64..12)
    }
}

fn analyze(graph: &Graph, dependents: &[Operand], reuse_ids: bool) -> Schedule {
    let options = AnalyzerOptions {
        reuse_ids,
        ..AnalyzerOptions::default()
    };
    Analyzer::new(options).analyze(graph, dependents, &DefaultBinding).unwrap()
}

fn operand_nodes(graph: &Graph, id: NodeId) -> Vec<NodeId> {
    graph
        .node(id)
        .operands()
        .iter()
        .filter_map(|operand| graph.resolve(*operand).unwrap().node())
        .filter(|used| graph.independent_index(*used).is_none())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every operand is evaluated before, and kept live until, its consumer.
    #[test]
    fn schedule_respects_dependencies(recipe in strategies::recipe()) {
        let (graph, dependents) = recipe.build();
        let schedule = analyze(&graph, &dependents, true);

        for &id in schedule.order() {
            let order = schedule.eval_order(id);
            prop_assert!(order > 0);
            for used in operand_nodes(&graph, id) {
                prop_assert!(schedule.eval_order(used) < order);
                prop_assert!(schedule.last_use_order(used) >= order);
            }
        }
    }

    /// Evaluation orders are exactly 1..=n along the schedule.
    #[test]
    fn schedule_orders_are_dense(recipe in strategies::recipe()) {
        let (graph, dependents) = recipe.build();
        let schedule = analyze(&graph, &dependents, true);

        for (position, &id) in schedule.order().iter().enumerate() {
            prop_assert_eq!(schedule.eval_order(id), position + 1);
        }
    }

    /// Two nodes sharing a temporary never have overlapping live ranges.
    #[test]
    fn temporaries_never_overlap(recipe in strategies::recipe()) {
        let (graph, dependents) = recipe.build();
        let schedule = analyze(&graph, &dependents, true);

        let mut by_slot: FxHashMap<usize, Vec<(usize, usize)>> = FxHashMap::default();
        for &id in schedule.order() {
            if let VariableBinding::Temporary(slot) = schedule.binding(&graph, id) {
                let entry = schedule.entry(id);
                by_slot.entry(slot).or_default().push((entry.eval_order, entry.live_end()));
            }
        }

        for ranges in by_slot.values_mut() {
            ranges.sort_unstable();
            for pair in ranges.windows(2) {
                prop_assert!(pair[0].1 < pair[1].0, "overlapping live ranges {:?}", pair);
            }
        }
    }

    /// Dependent-only nodes write straight into one of their own positions.
    #[test]
    fn dependent_slots_match_positions(recipe in strategies::recipe()) {
        let (graph, dependents) = recipe.build();
        let schedule = analyze(&graph, &dependents, true);

        for &id in schedule.order() {
            if let VariableBinding::Dependent(position) = schedule.binding(&graph, id) {
                prop_assert!(schedule.dependent_positions(id).contains(&position));
                prop_assert_eq!(schedule.total_use_count(id), 0);
            }
        }
    }

    /// Recycling never needs more temporaries than fresh allocation.
    #[test]
    fn reuse_never_grows_temporaries(recipe in strategies::recipe()) {
        let (graph, dependents) = recipe.build();
        let recycled = analyze(&graph, &dependents, true);
        let fresh = analyze(&graph, &dependents, false);

        prop_assert!(recycled.temporary_count() <= fresh.temporary_count());
    }

    /// A detected pattern reproduces every sample of a floor-linear sequence.
    #[test]
    fn linear_detection_is_exact(linear in strategies::linear(), (start, len) in strategies::domain()) {
        let observations: Observations = (start..start + len).map(|x| (x, linear.evaluate(x))).collect();
        let detected = pattern::detect(&observations, 2);

        prop_assert!(detected.is_some());
        prop_assert!(detected.unwrap().fits(&observations));
    }

    /// Detection never returns a pattern that misses a sample.
    #[test]
    fn detection_never_approximates(values in prop::collection::vec(-10i64..10, 1..12)) {
        let observations: Observations = values.iter().enumerate().map(|(x, &y)| (x as i64, y)).collect();

        if let Some(detected) = pattern::detect(&observations, 2) {
            prop_assert!(detected.fits(&observations));
        }
    }

    /// A plane whose value does not depend on `y` keeps only its first axis.
    #[test]
    fn plane_collapses_constant_second_axis(linear in strategies::linear(), rows in 2i64..6, columns in 1i64..6) {
        let mut samples = PlaneObservations::new();
        for x in 0..rows {
            for y in 0..columns {
                samples.entry(x).or_default().insert(y, linear.evaluate(x));
            }
        }

        let detected = pattern::detect_plane_2d(&samples);
        prop_assert!(detected.is_some());
        let detected = detected.unwrap();
        prop_assert!(detected.fits_plane(&samples));
        prop_assert!(matches!(&detected, IndexPattern::Plane2D(plane) if plane.y.is_none()));
    }
}
