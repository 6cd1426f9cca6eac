use adcg_ir::pattern::{self, Observations, PlaneObservations};
use adcg_ir::{Analyzer, AnalyzerOptions, DefaultBinding, Graph, LoopDetector, LoopGroup, LoopInstance, OpKind, Operand};

fn main() {
    divan::main();
}

/// `y = sin(x0 * x1 + ...)` chain of `n` multiply-add steps.
fn chain(n: usize) -> (Graph, Vec<Operand>) {
    let mut graph = Graph::with_capacity(n * 2 + 2);
    let x0 = graph.add_independent();
    let x1 = graph.add_independent();
    let mut current = x0;

    for _ in 0..n {
        let product = graph.binary(OpKind::Mul, current, x1).unwrap();
        current = graph.binary(OpKind::Add, product, 1.0).unwrap();
    }

    let y = graph.unary(OpKind::Sin, current).unwrap();
    (graph, vec![y.into()])
}

/// `y[2i] = cos(x[2i])`, `y[2i + 1] = x[2i + 1] * x[2i]`
fn interleaved(pairs: usize) -> (Graph, Vec<Operand>) {
    let mut graph = Graph::with_capacity(pairs * 4);
    let xs: Vec<_> = (0..pairs * 2).map(|_| graph.add_independent()).collect();
    let mut dependents: Vec<Operand> = Vec::with_capacity(pairs * 2);

    for pair in 0..pairs {
        dependents.push(graph.unary(OpKind::Cos, xs[pair * 2]).unwrap().into());
        dependents.push(graph.binary(OpKind::Mul, xs[pair * 2 + 1], xs[pair * 2]).unwrap().into());
    }

    (graph, dependents)
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn analyze_chain(bencher: divan::Bencher, n: usize) {
    let (graph, dependents) = chain(n);
    let analyzer = Analyzer::new(AnalyzerOptions::default());

    bencher.bench(|| analyzer.analyze(&graph, &dependents, &DefaultBinding).unwrap());
}

#[divan::bench(args = [100, 1_000])]
fn analyze_interleaved(bencher: divan::Bencher, pairs: usize) {
    let (graph, dependents) = interleaved(pairs);
    let analyzer = Analyzer::new(AnalyzerOptions::default());

    bencher.bench(|| analyzer.analyze(&graph, &dependents, &DefaultBinding).unwrap());
}

#[divan::bench(args = [100, 1_000])]
fn plan_loop(bencher: divan::Bencher, pairs: usize) {
    let (graph, dependents) = interleaved(pairs);
    let schedule = Analyzer::new(AnalyzerOptions::default())
        .analyze(&graph, &dependents, &DefaultBinding)
        .unwrap();
    let group = LoopGroup::new((0..pairs).map(|i| LoopInstance::new(i, [2 * i, 2 * i + 1])));

    bencher.bench(|| LoopDetector::new(&graph, &schedule, 2).plan(&group).unwrap());
}

#[divan::bench(args = [64, 1_024])]
fn detect_staircase(n: i64) -> Option<adcg_ir::IndexPattern> {
    let observations: Observations = (0..n).map(|x| (x, (x + 1) / 3 * 5 + 2)).collect();
    pattern::detect(&observations, 2)
}

#[divan::bench(args = [64, 1_024])]
fn detect_sections(n: i64) -> Option<adcg_ir::IndexPattern> {
    let observations: Observations = (0..n)
        .map(|x| (x, if x < n / 2 { 3 * x } else { 1_000 - x }))
        .collect();
    pattern::detect(&observations, 2)
}

#[divan::bench(args = [8, 32])]
fn detect_plane(n: i64) -> Option<adcg_ir::IndexPattern> {
    let mut samples = PlaneObservations::new();
    for x in 0..n {
        for y in 0..n {
            samples.entry(x).or_default().insert(y, x * n + 2 * y);
        }
    }
    pattern::detect_plane_2d(&samples)
}
