//! Confluent rewriting into a canonical form.
//!
//! Parallel and choice operators are flattened into their parent, which
//! leaves `merge(...)` markers behind. A marker `M` points at the vertex it
//! stands for with a `d` edge; coalescing moves every other edge of `M` onto
//! that vertex and deletes `M` once only the `d` edge is left.

use log::{debug, trace};

use crate::engine::{self, Graph, Rule};
use crate::error::{Error, Result};

/// Rewrite steps one confluent rewrite may take before it is reported as
/// diverging.
pub const DEFAULT_STEP_BUDGET: usize = 100_000;

const FLATTEN_PAR: &str = r#"rule [
    ruleID "flatten par"
    left [
        node [ id 1 label "t(par)" ]
        node [ id 2 label "t(p)" ]
        node [ id 3 label "t(p)" ]
        edge [ source 0 target 1 label "-" ]
        edge [ source 1 target 2 label "-" ]
        edge [ source 1 target 3 label "-" ]
    ]
    context [
        node [ id 0 label "t(p)" ]
    ]
    right [
        node [ id 2 label "merge(t(p))" ]
        node [ id 3 label "merge(t(p))" ]
        edge [ source 2 target 0 label "d" ]
        edge [ source 3 target 0 label "d" ]
    ]
]"#;

const FLATTEN_SUM: &str = r#"rule [
    ruleID "flatten sum"
    left [
        node [ id 1 label "t(sum)" ]
        node [ id 2 label "t(s)" ]
        node [ id 3 label "t(s)" ]
        edge [ source 0 target 1 label "-" ]
        edge [ source 1 target 2 label "-" ]
        edge [ source 1 target 3 label "-" ]
    ]
    context [
        node [ id 0 label "t(s)" ]
    ]
    right [
        node [ id 2 label "merge(t(s))" ]
        node [ id 3 label "merge(t(s))" ]
        edge [ source 2 target 0 label "d" ]
        edge [ source 3 target 0 label "d" ]
    ]
]"#;

const MARKER: &str = r#"
        node [ id 0 label "merge(_A)" ]
        node [ id 1 label "_B" ]
        node [ id 2 label "_C" ]
        edge [ source 0 target 2 label "d" ]"#;

/// Coalescing rules for a marker `0` standing for `2`, and a neighbour `1`.
/// `{out}` edges leave the marker, `{in}` edges enter it.
fn coalesce_rules() -> Vec<String> {
    let mut rules = Vec::new();
    for (dir, mark, target) in [
        ("out", "source 0 target 1", "source 2 target 1"),
        ("in", "source 1 target 0", "source 1 target 2"),
    ] {
        rules.push(format!(
            r#"rule [
    ruleID "merge move {dir}"
    left [ edge [ {mark} label "_X" ] ]
    context [{MARKER}
    ]
    right [ edge [ {target} label "_X" ] ]
]"#
        ));
        rules.push(format!(
            r#"rule [
    ruleID "merge dedupe {dir}"
    left [ edge [ {mark} label "_X" ] ]
    context [{MARKER}
        edge [ {target} label "_X" ]
    ]
]"#
        ));
        for (moved, kept) in [("arg", "sync"), ("sync", "arg")] {
            rules.push(format!(
                r#"rule [
    ruleID "merge {moved} onto {kept} {dir}"
    left [
        edge [ {mark} label "{moved}" ]
        edge [ {target} label "{kept}" ]
    ]
    context [{MARKER}
    ]
    right [ edge [ {target} label "arg-sync" ] ]
]"#
            ));
        }
    }
    rules
}

const MERGE_DELETE: &str = r#"rule [
    ruleID "merge delete"
    left [
        node [ id 1 label "merge(_A)" ]
        edge [ source 1 target 0 label "d" ]
    ]
    context [
        node [ id 0 label "_B" ]
    ]
]"#;

#[derive(Debug, Clone)]
pub struct Normalizer {
    flatten: Vec<Rule>,
    merge: Vec<Rule>,
    step_budget: usize,
}

impl Normalizer {
    pub fn new(step_budget: usize) -> Result<Self> {
        let flatten = [FLATTEN_PAR, FLATTEN_SUM]
            .into_iter()
            .map(Rule::from_gml)
            .collect::<Result<Vec<_>>>()?;
        let mut merge = coalesce_rules()
            .iter()
            .map(|text| Rule::from_gml(text))
            .collect::<Result<Vec<_>>>()?;
        merge.push(Rule::from_gml(MERGE_DELETE)?);

        Ok(Self {
            flatten,
            merge,
            step_budget,
        })
    }

    /// The merge coalescing family, in application order.
    pub fn merge_rules(&self) -> &[Rule] {
        &self.merge
    }

    pub fn step_budget(&self) -> usize {
        self.step_budget
    }

    /// Rewrites every graph with `rules` until none of them applies,
    /// committing to the first match each time.
    pub fn apply_confluent(&self, graphs: Vec<Graph>, rules: &[Rule]) -> Result<Vec<Graph>> {
        graphs
            .into_iter()
            .map(|graph| self.rewrite(graph, rules, false))
            .collect()
    }

    /// Coalesces all merge markers.
    pub fn merge(&self, graph: Graph) -> Result<Graph> {
        self.rewrite(graph, &self.merge, false)
    }

    /// Flattens parallel and choice operators, then coalesces.
    pub fn normal_form(&self, graph: Graph) -> Result<Graph> {
        let flat = self.rewrite(graph, &self.flatten, true)?;
        let normal = self.merge(flat)?;
        debug!(
            "normal form: {} vertices, {} edges",
            normal.vertex_count(),
            normal.edge_count()
        );
        Ok(normal)
    }

    /// Whether `graph` is left unchanged, up to isomorphism, by
    /// [`Normalizer::normal_form`].
    pub fn is_normal(&self, graph: &Graph) -> Result<bool> {
        Ok(self.normal_form(graph.clone())?.is_isomorphic(graph))
    }

    pub(crate) fn rewrite(&self, graph: Graph, rules: &[Rule], merge_each: bool) -> Result<Graph> {
        let mut graph = graph;
        let mut steps = 0;

        loop {
            let mut progressed = false;
            for rule in rules {
                while let Some(next) = step(&graph, rule) {
                    steps += 1;
                    if steps > self.step_budget {
                        return Err(Error::Divergence {
                            rule: rule.name().to_string(),
                            steps,
                        });
                    }
                    trace!("{}: step {steps}", rule.name());
                    graph = next.root_component();
                    if merge_each {
                        graph = self.merge(graph)?;
                    }
                    progressed = true;
                }
            }
            if !progressed {
                return Ok(graph);
            }
        }
    }
}

fn step(graph: &Graph, rule: &Rule) -> Option<Graph> {
    engine::apply(std::slice::from_ref(graph), rule, Some(1))
        .pop()
        .map(|d| d.target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::engine::Label;
    use crate::term::Process;

    fn normalizer() -> Normalizer {
        Normalizer::new(DEFAULT_STEP_BUDGET).unwrap()
    }

    fn normal(p: &Process) -> Graph {
        normalizer().normal_form(encode(&p.term()).unwrap()).unwrap()
    }

    fn no_markers(g: &Graph) -> bool {
        g.vertices().all(|(_, l)| l.symbol() != Some("merge"))
    }

    #[test]
    fn rule_texts_are_well_formed() {
        let n = normalizer();
        assert_eq!(n.flatten.len(), 2);
        assert_eq!(n.merge.len(), 9);
    }

    #[test]
    fn parallel_operators_flatten_into_the_root() {
        let a = Process::new().output("x", "y").unwrap();
        let b = Process::new().input("x", "z").unwrap();
        let c = Process::new().output("y", "y").unwrap();
        let g = normal(&((a | b) | c));

        assert!(no_markers(&g));
        assert_eq!(g.count_label(&Label::from("t(par)")), 0);
        let root = g.root().unwrap();
        let (top, _) = g.successors(root).next().unwrap();
        assert_eq!(g.successors(top).count(), 3);
    }

    #[test]
    fn nesting_of_parallel_composition_is_forgotten() {
        let a = || Process::new().output("x", "y").unwrap();
        let b = || Process::new().input("x", "z").unwrap();
        let c = || Process::new().call("A", crate::term::names("x")).unwrap();
        let left = normal(&((a() | b()) | c()));
        let right = normal(&(a() | (c() | b())));
        assert!(left.is_isomorphic(&right));
    }

    #[test]
    fn choices_flatten_into_one_guard() {
        let a = Process::new().output("x", "y").unwrap();
        let b = Process::new().input("x", "z").unwrap();
        let c = Process::new().output("y", "x").unwrap();
        let g = normal(&(((a + b).unwrap() + c).unwrap()));

        assert_eq!(g.count_label(&Label::from("t(sum)")), 0);
        assert_eq!(g.count_label(&Label::from("t(s)")), 1);
        assert!(no_markers(&g));
    }

    #[test]
    fn normal_forms_are_fixed_points() {
        let a = Process::new().output("x", "y").unwrap();
        let b = Process::new().input("x", "z").unwrap().output("z", "z").unwrap();
        let c = (Process::new().output("y", "x").unwrap() + Process::new().input("y", "w").unwrap())
            .unwrap();
        let g = normal(&((a | b) | c));
        let n = normalizer();
        assert!(n.is_normal(&g).unwrap());
        assert!(n.normal_form(g.clone()).unwrap().is_isomorphic(&g));
    }

    #[test]
    fn coalescing_does_not_depend_on_the_match_order() {
        // A marker standing for `v(x)` with one outgoing and two incoming
        // edges, one of which meets an existing edge to `v(x)`.
        let text = r#"graph [
            node [ id 0 label "go" ]
            node [ id 1 label "t(p)" ]
            node [ id 2 label "t(out)" ]
            node [ id 3 label "t(in)" ]
            node [ id 4 label "merge(v(*))" ]
            node [ id 5 label "v(x)" ]
            node [ id 6 label "ptr" ]
            edge [ source 0 target 1 label "-" ]
            edge [ source 1 target 2 label "-" ]
            edge [ source 1 target 3 label "-" ]
            edge [ source 2 target 4 label "sync" ]
            edge [ source 2 target 5 label "arg" ]
            edge [ source 3 target 4 label "sync" ]
            edge [ source 6 target 4 label "-" ]
            edge [ source 3 target 6 label "0" ]
            edge [ source 4 target 5 label "d" ]
        ]"#;
        let graph = Graph::from_gml(text).unwrap();
        let n = normalizer();

        let forward = n.rewrite(graph.clone(), &n.merge, false).unwrap();
        let mut reversed: Vec<Rule> = n.merge.clone();
        let delete = reversed.pop().unwrap();
        reversed.reverse();
        reversed.push(delete);
        let backward = n.rewrite(graph, &reversed, false).unwrap();

        assert!(forward.is_isomorphic(&backward));
        assert_eq!(forward.count_label(&Label::from("merge(v(*))")), 0);
        let out = forward.vertices().find(|(_, l)| **l == Label::from("t(out)")).unwrap().0;
        let x = forward.vertices().find(|(_, l)| **l == Label::from("v(x)")).unwrap().0;
        assert_eq!(forward.edge_label(out, x), Some(&Label::from("arg-sync")));
    }

    #[test]
    fn unguarded_rewriting_reports_divergence() {
        // Relabels back and forth forever.
        let flip = Rule::from_gml(
            r#"rule [ ruleID "flip"
                left [ node [ id 0 label "a" ] ] right [ node [ id 0 label "b" ] ] ]"#,
        )
        .unwrap();
        let flop = Rule::from_gml(
            r#"rule [ ruleID "flop"
                left [ node [ id 0 label "b" ] ] right [ node [ id 0 label "a" ] ] ]"#,
        )
        .unwrap();
        let mut graph = Graph::new();
        graph.add_vertex(Label::from("a"));

        let n = Normalizer::new(10).unwrap();
        let result = n.apply_confluent(vec![graph], &[flip, flop]);
        assert!(matches!(result, Err(Error::Divergence { steps: 11, .. })));
    }
}
