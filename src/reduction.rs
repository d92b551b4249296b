//! Breadth-first exploration of the states a process can reach.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info, trace, warn};

use crate::decode::decode;
use crate::derivation::{DerivationGraph, State, StateId, Transition, TransitionKind};
use crate::encode::encode;
use crate::engine::{self, Graph, Rule};
use crate::error::Result;
use crate::normalize::{DEFAULT_STEP_BUDGET, Normalizer};
use crate::recursive::RecursiveProcessTable;
use crate::term::Process;

/// Synchronization of an input and an output on the same channel. The
/// guards of both are garbage collected, their continuations merge into the
/// top-level process and the received name merges into the sent one.
const REDUCTION: &str = r#"rule [
    ruleID "reduction"
    left [
        node [ id 2 label "t(s)" ]
        node [ id 3 label "t(s)" ]
        node [ id 4 label "t(in)" ]
        node [ id 5 label "t(p)" ]
        node [ id 6 label "v(_Z)" ]
        node [ id 8 label "t(out)" ]
        node [ id 9 label "t(p)" ]
        edge [ source 1 target 2 label "-" ]
        edge [ source 1 target 3 label "-" ]
        edge [ source 2 target 4 label "-" ]
        edge [ source 4 target 5 label "-" ]
        edge [ source 4 target 6 label "arg" ]
        edge [ source 4 target 7 label "sync" ]
        edge [ source 3 target 8 label "-" ]
        edge [ source 8 target 7 label "sync" ]
        edge [ source 8 target 10 label "arg" ]
        edge [ source 8 target 9 label "-" ]
    ]
    context [
        node [ id 0 label "go" ]
        node [ id 1 label "t(p)" ]
        node [ id 7 label "v(_X)" ]
        node [ id 10 label "v(_Y)" ]
        edge [ source 0 target 1 label "-" ]
    ]
    right [
        node [ id 2 label "gc" ]
        node [ id 3 label "gc" ]
        node [ id 5 label "merge(t(p))" ]
        node [ id 6 label "merge(v(_Z))" ]
        node [ id 9 label "merge(t(p))" ]
        edge [ source 5 target 1 label "d" ]
        edge [ source 9 target 1 label "d" ]
        edge [ source 6 target 10 label "d" ]
    ]
]"#;

/// As [`REDUCTION`], for an output sending its own channel.
const REDUCTION_SELF: &str = r#"rule [
    ruleID "reduction (arg-sync)"
    left [
        node [ id 2 label "t(s)" ]
        node [ id 3 label "t(s)" ]
        node [ id 4 label "t(in)" ]
        node [ id 5 label "t(p)" ]
        node [ id 6 label "v(_Z)" ]
        node [ id 8 label "t(out)" ]
        node [ id 9 label "t(p)" ]
        edge [ source 1 target 2 label "-" ]
        edge [ source 1 target 3 label "-" ]
        edge [ source 2 target 4 label "-" ]
        edge [ source 4 target 5 label "-" ]
        edge [ source 4 target 6 label "arg" ]
        edge [ source 4 target 7 label "sync" ]
        edge [ source 3 target 8 label "-" ]
        edge [ source 8 target 7 label "arg-sync" ]
        edge [ source 8 target 9 label "-" ]
    ]
    context [
        node [ id 0 label "go" ]
        node [ id 1 label "t(p)" ]
        node [ id 7 label "v(_X)" ]
        edge [ source 0 target 1 label "-" ]
    ]
    right [
        node [ id 2 label "gc" ]
        node [ id 3 label "gc" ]
        node [ id 5 label "merge(t(p))" ]
        node [ id 6 label "merge(v(_Z))" ]
        node [ id 9 label "merge(t(p))" ]
        edge [ source 5 target 1 label "d" ]
        edge [ source 9 target 1 label "d" ]
        edge [ source 6 target 7 label "d" ]
    ]
]"#;

const GARBAGE: [&str; 3] = [
    r#"rule [
    ruleID "gc term"
    left [
        node [ id 1 label "t(_X)" ]
        edge [ source 0 target 1 label "_Y" ]
    ]
    context [ node [ id 0 label "gc" ] ]
    right [ node [ id 1 label "gc" ] ]
]"#,
    r#"rule [
    ruleID "gc pointer"
    left [
        node [ id 1 label "ptr" ]
        edge [ source 0 target 1 label "_Y" ]
    ]
    context [ node [ id 0 label "gc" ] ]
    right [ node [ id 1 label "gc" ] ]
]"#,
    r#"rule [
    ruleID "gc name"
    left [ edge [ source 0 target 1 label "_Y" ] ]
    context [
        node [ id 0 label "gc" ]
        node [ id 1 label "v(_X)" ]
    ]
]"#,
];

/// The pointer left behind by an expanded call marks its argument name.
const BIND_ARGUMENT: &str = r#"rule [
    ruleID "bind argument"
    left [ edge [ source 0 target 1 label "-" ] ]
    context [
        node [ id 0 label "merge(ptr)" ]
        node [ id 1 label "v(_X)" ]
    ]
    right [ edge [ source 0 target 1 label "d" ] ]
]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExploreConfig {
    /// Exploration rounds; `None` explores until no new state appears.
    pub max_iter: Option<usize>,
    /// Rewrite steps one normalization may take.
    pub step_budget: usize,
    /// Re-normalize every new state and warn when it changes.
    pub confirm_normal_form: bool,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            max_iter: None,
            step_budget: DEFAULT_STEP_BUDGET,
            confirm_normal_form: true,
        }
    }
}

/// States found so far, indexed by fingerprint. Graphs with equal
/// fingerprints are told apart by isomorphism.
#[derive(Debug, Default)]
struct Visited {
    graphs: Vec<Graph>,
    index: HashMap<u64, Vec<usize>>,
}

impl Visited {
    /// The index of `graph`, and whether it is new.
    fn insert(&mut self, graph: Graph) -> (usize, bool) {
        let bucket = self.index.entry(graph.fingerprint()).or_default();
        if let Some(&known) = bucket.iter().find(|&&i| self.graphs[i].is_isomorphic(&graph)) {
            return (known, false);
        }
        bucket.push(self.graphs.len());
        self.graphs.push(graph);
        (self.graphs.len() - 1, true)
    }

    fn find(&self, graph: &Graph) -> Option<usize> {
        self.index
            .get(&graph.fingerprint())?
            .iter()
            .copied()
            .find(|&i| self.graphs[i].is_isomorphic(graph))
    }

    fn len(&self) -> usize {
        self.graphs.len()
    }
}

#[derive(Debug)]
struct Pending {
    source: usize,
    target: usize,
    kind: TransitionKind,
    rule: String,
}

pub struct ReductionEngine<'a> {
    table: &'a RecursiveProcessTable,
    config: ExploreConfig,
    normalizer: Normalizer,
    reductions: Vec<Rule>,
    garbage: Vec<Rule>,
    call_cleanup: Vec<Rule>,
    initial: Graph,
}

impl<'a> ReductionEngine<'a> {
    /// Encodes and normalizes `process`, whose calls must agree with
    /// `table`.
    pub fn new(
        process: &Process,
        table: &'a RecursiveProcessTable,
        config: ExploreConfig,
    ) -> Result<Self> {
        let term = process.term();
        table.check_calls(&term)?;

        let normalizer = Normalizer::new(config.step_budget)?;
        let initial = normalizer.normal_form(encode(&term)?)?;
        info!(
            "initial state of '{term}': {} vertices, {} edges",
            initial.vertex_count(),
            initial.edge_count()
        );

        let reductions = vec![Rule::from_gml(REDUCTION)?, Rule::from_gml(REDUCTION_SELF)?];
        let garbage = GARBAGE
            .into_iter()
            .map(Rule::from_gml)
            .collect::<Result<Vec<_>>>()?;
        let mut call_cleanup = vec![Rule::from_gml(BIND_ARGUMENT)?];
        call_cleanup.extend(normalizer.merge_rules().iter().cloned());

        Ok(Self {
            table,
            config,
            normalizer,
            reductions,
            garbage,
            call_cleanup,
            initial,
        })
    }

    /// The normalized encoding of the process under study.
    pub fn initial(&self) -> &Graph {
        &self.initial
    }

    pub fn config(&self) -> &ExploreConfig {
        &self.config
    }

    pub fn calc(&self) -> Result<DerivationGraph> {
        let mut visited = Visited::default();
        let (initial, _) = visited.insert(self.initial.clone());
        let mut frontier = vec![initial];
        let mut pending = Vec::new();
        let mut round = 0;

        while !frontier.is_empty() {
            if self.config.max_iter.is_some_and(|max| round >= max) {
                debug!("stopping after {round} round(s), {} state(s) unexplored", frontier.len());
                break;
            }
            round += 1;

            let mut next = Vec::new();
            for source in frontier {
                let graph = visited.graphs[source].clone();

                for rule in &self.reductions {
                    for d in engine::apply(std::slice::from_ref(&graph), rule, None) {
                        let target = self.after_reduction(d.target)?;
                        let step = Pending {
                            source,
                            target: 0,
                            kind: TransitionKind::Reduction,
                            rule: d.rule,
                        };
                        self.record(&mut visited, &mut next, &mut pending, step, target)?;
                    }
                }

                if let Some(target) = self.expand_calls(&graph)? {
                    let step = Pending {
                        source,
                        target: 0,
                        kind: TransitionKind::CallExpansion,
                        rule: TransitionKind::CallExpansion.to_string(),
                    };
                    self.record(&mut visited, &mut next, &mut pending, step, target)?;
                }
            }

            debug!(
                "round {round}: {} new state(s), {} in total",
                next.len(),
                visited.len()
            );
            frontier = next;
        }

        let dg = self.rebuild(&visited, pending)?;
        info!(
            "{} state(s), {} transition(s), {} terminal",
            dg.state_count(),
            dg.transition_count(),
            dg.terminal_states().count()
        );
        Ok(dg)
    }

    fn record(
        &self,
        visited: &mut Visited,
        next: &mut Vec<usize>,
        pending: &mut Vec<Pending>,
        mut step: Pending,
        target: Graph,
    ) -> Result<()> {
        if self.config.confirm_normal_form && !self.normalizer.is_normal(&target)? {
            warn!("state reached by '{}' is not in normal form", step.rule);
        }
        let (id, new) = visited.insert(target);
        trace!("{} -> {id} by {}{}", step.source, step.rule, if new { " (new)" } else { "" });
        if new {
            next.push(id);
        }
        step.target = id;
        pending.push(step);
        Ok(())
    }

    fn after_reduction(&self, graph: Graph) -> Result<Graph> {
        let merged = self.normalizer.merge(graph.root_component())?;
        let collected = self.normalizer.rewrite(merged, &self.garbage, false)?;
        self.normalizer.normal_form(collected)
    }

    /// Expands every top-level call; `None` when nothing changes.
    fn expand_calls(&self, graph: &Graph) -> Result<Option<Graph>> {
        if self.table.is_empty() {
            return Ok(None);
        }
        let expanded = self
            .normalizer
            .rewrite(graph.clone(), self.table.rules(), false)?;
        let bound = self.normalizer.rewrite(expanded, &self.call_cleanup, false)?;
        let normal = self.normalizer.normal_form(bound)?;
        if normal.is_isomorphic(graph) {
            Ok(None)
        } else {
            Ok(Some(normal))
        }
    }

    /// Replays each recorded pair as the literal rule from its source to
    /// its target, keeping one transition per pair.
    fn rebuild(&self, visited: &Visited, pending: Vec<Pending>) -> Result<DerivationGraph> {
        let state = |graph: &Graph| {
            let term = match decode(graph) {
                Ok(term) => Some(term),
                Err(e) => {
                    debug!("state does not decode: {e}");
                    None
                }
            };
            State {
                graph: graph.clone(),
                term,
            }
        };

        let mut dg = DerivationGraph::new(state(&visited.graphs[0]));
        let mut ids: Vec<StateId> = vec![dg.initial()];
        for graph in &visited.graphs[1..] {
            ids.push(dg.add_state(state(graph)));
        }

        let mut seen = BTreeSet::new();
        for step in pending {
            if !seen.insert((step.source, step.target)) {
                continue;
            }
            let source = &visited.graphs[step.source];
            let rule = Rule::from_graphs(source, &visited.graphs[step.target], &step.rule)?;
            let Some(d) = engine::apply(std::slice::from_ref(source), &rule, Some(1)).pop() else {
                warn!("transition {} -> {} does not replay", step.source, step.target);
                continue;
            };
            let Some(target) = visited.find(&d.target) else {
                warn!("transition {} -> {} leads to an unknown state", step.source, step.target);
                continue;
            };
            dg.add_transition(
                ids[step.source],
                ids[target],
                Transition {
                    kind: step.kind,
                    rule: step.rule,
                },
            );
        }
        Ok(dg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::term::names;

    fn explore(p: &Process, table: &RecursiveProcessTable, max_iter: Option<usize>) -> DerivationGraph {
        let config = ExploreConfig {
            max_iter,
            ..ExploreConfig::default()
        };
        ReductionEngine::new(p, table, config).unwrap().calc().unwrap()
    }

    fn term_of(dg: &DerivationGraph, id: StateId) -> String {
        dg.state(id).term.as_ref().unwrap().to_string()
    }

    #[test]
    fn a_single_synchronization() {
        let p = Process::new().input("x", "z").unwrap().output("z", "w").unwrap()
            | Process::new().output("x", "y").unwrap();
        let dg = explore(&p, &RecursiveProcessTable::new(), None);

        assert_eq!(dg.state_count(), 2);
        assert_eq!(dg.transition_count(), 1);
        let (target, transition) = dg.successors(dg.initial()).next().unwrap();
        assert_eq!(transition.kind, TransitionKind::Reduction);
        assert_eq!(transition.rule, "reduction");
        assert_eq!(dg.out_degree(target), 0);
        assert_eq!(term_of(&dg, target), "out(y, w).0");
    }

    #[test]
    fn sending_a_channel_over_itself() {
        let p = Process::new().input("x", "z").unwrap().output("z", "z").unwrap()
            | Process::new().output("x", "x").unwrap();
        let dg = explore(&p, &RecursiveProcessTable::new(), None);

        assert_eq!(dg.transition_count(), 1);
        let (target, transition) = dg.successors(dg.initial()).next().unwrap();
        assert_eq!(transition.rule, "reduction (arg-sync)");
        assert_eq!(term_of(&dg, target), "out(x, x).0");
    }

    #[test]
    fn choices_discard_the_other_branch() {
        let choice = (Process::new().input("x", "y").unwrap()
            + Process::new().input("a", "b").unwrap().output("b", "b").unwrap())
        .unwrap();
        let p = choice | Process::new().output("x", "w").unwrap();
        let dg = explore(&p, &RecursiveProcessTable::new(), None);

        assert_eq!(dg.transition_count(), 1);
        let terminal: Vec<_> = dg.terminal_states().collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(term_of(&dg, terminal[0]), "0");
    }

    #[test]
    fn deadlocked_processes_are_terminal() {
        let mut table = RecursiveProcessTable::new();
        let body = Process::new().input("y", "z").unwrap().call("A", names("z")).unwrap();
        table.add("A", names("y"), body).unwrap();

        let p = Process::new().input("x", "y").unwrap().call("A", names("y")).unwrap()
            | Process::new().output("w", "v").unwrap();
        let dg = explore(&p, &table, Some(5));

        assert_eq!(dg.state_count(), 1);
        assert_eq!(dg.terminal_states().count(), 1);
    }

    #[test]
    fn no_rounds_leave_only_the_initial_state() {
        let p = Process::new().input("x", "z").unwrap()
            | Process::new().output("x", "y").unwrap();
        let dg = explore(&p, &RecursiveProcessTable::new(), Some(0));
        assert_eq!(dg.state_count(), 1);
        assert_eq!(dg.transition_count(), 0);
    }

    #[test]
    fn calls_expand_into_their_definitions() {
        let mut table = RecursiveProcessTable::new();
        table
            .add("A", names("x"), Process::new().output("x", "x").unwrap())
            .unwrap();

        let p = Process::new().call("A", names("a")).unwrap()
            | Process::new().input("a", "b").unwrap();
        let dg = explore(&p, &table, None);

        assert_eq!(dg.state_count(), 3);
        assert_eq!(dg.transition_count(), 2);
        let (expanded, transition) = dg.successors(dg.initial()).next().unwrap();
        assert_eq!(transition.kind, TransitionKind::CallExpansion);
        assert_eq!(dg.out_degree(expanded), 1);
        let terminal: Vec<_> = dg.terminal_states().collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(term_of(&dg, terminal[0]), "0");
    }

    #[test]
    fn calls_forward_to_other_definitions() {
        let mut table = RecursiveProcessTable::new();
        table
            .add("G", names("x"), Process::new().output("x", "x").unwrap())
            .unwrap();
        table
            .add("F", names("x"), Process::new().call("G", names("x")).unwrap())
            .unwrap();

        let p = Process::new().call("F", names("a")).unwrap()
            | Process::new().input("a", "b").unwrap();
        let dg = explore(&p, &table, None);

        assert!(dg.transitions().any(|(_, _, t)| t.kind == TransitionKind::Reduction));
        let terminal: Vec<_> = dg.terminal_states().collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(term_of(&dg, terminal[0]), "0");
    }

    #[test]
    fn calls_on_restricted_names() {
        let mut table = RecursiveProcessTable::new();
        table
            .add("A", names("x"), Process::new().output("x", "x").unwrap())
            .unwrap();

        let p = Process::new()
            .restrict("a")
            .unwrap()
            .par(
                Process::new().call("A", names("a")).unwrap(),
                Process::new().input("a", "b").unwrap(),
            )
            .unwrap();
        let dg = explore(&p, &table, None);

        assert_eq!(dg.state_count(), 3);
        assert_eq!(dg.transition_count(), 2);
        let terminal: Vec<_> = dg.terminal_states().collect();
        assert_eq!(term_of(&dg, terminal[0]), "0");
    }

    #[test]
    fn recursion_unfolds_one_guard_at_a_time() {
        // A forwarder relaying on `a` forever, fed by one sender.
        let mut table = RecursiveProcessTable::new();
        let body = Process::new()
            .input("a", "m")
            .unwrap()
            .output("a", "m")
            .unwrap()
            .call("F", names("a"))
            .unwrap();
        table.add("F", names("a"), body).unwrap();

        let p = Process::new().call("F", names("a")).unwrap()
            | Process::new().output("a", "b").unwrap();
        let first = explore(&p, &table, Some(6));
        let second = explore(&p, &table, Some(6));

        assert_eq!(first.state_count(), second.state_count());
        assert_eq!(first.transition_count(), second.transition_count());
        assert!(first.state_count() > 2);
    }

    #[test]
    fn arity_mismatches_fail_before_encoding() {
        let mut table = RecursiveProcessTable::new();
        table.add("A", names("x"), Process::new()).unwrap();
        let p = Process::new().call("A", names("x y")).unwrap();
        assert!(matches!(
            ReductionEngine::new(&p, &table, ExploreConfig::default()),
            Err(Error::Term(_))
        ));
    }

    #[test]
    fn unguarded_recursion_diverges() {
        let mut table = RecursiveProcessTable::with_step_budget(50);
        let loops = Process::new().call("L", names("x")).unwrap()
            | Process::new().output("x", "x").unwrap();
        table.add("L", names("x"), loops).unwrap();

        let p = Process::new().call("L", names("x")).unwrap();
        let config = ExploreConfig {
            step_budget: 50,
            ..ExploreConfig::default()
        };
        let engine = ReductionEngine::new(&p, &table, config).unwrap();
        assert!(matches!(engine.calc(), Err(Error::Divergence { .. })));
    }
}
