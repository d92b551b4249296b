//! The execution space of a process: canonical states and the transitions
//! found between them.

use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::engine::Graph;
use crate::term::Term;

pub type StateId = NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// A synchronization between an input and an output.
    Reduction,
    /// Top-level calls replaced by their definitions.
    CallExpansion,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::Reduction => write!(f, "reduction"),
            TransitionKind::CallExpansion => write!(f, "call"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub graph: Graph,
    /// The state read back as a term, when it decodes.
    pub term: Option<Term>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub rule: String,
}

#[derive(Debug, Clone)]
pub struct DerivationGraph {
    inner: DiGraph<State, Transition>,
    initial: StateId,
}

impl DerivationGraph {
    pub(crate) fn new(initial: State) -> Self {
        let mut inner = DiGraph::new();
        let initial = inner.add_node(initial);
        Self { inner, initial }
    }

    pub(crate) fn add_state(&mut self, state: State) -> StateId {
        self.inner.add_node(state)
    }

    /// Records `source → target`; a pair that already has a transition
    /// keeps its first one.
    pub(crate) fn add_transition(
        &mut self,
        source: StateId,
        target: StateId,
        transition: Transition,
    ) -> bool {
        if self.has_transition(source, target) {
            return false;
        }
        self.inner.add_edge(source, target, transition);
        true
    }

    pub fn initial(&self) -> StateId {
        self.initial
    }

    pub fn state_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn transition_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.inner[id]
    }

    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.inner.node_indices().map(move |id| (id, &self.inner[id]))
    }

    pub fn transitions(&self) -> impl Iterator<Item = (StateId, StateId, &Transition)> {
        self.inner
            .edge_references()
            .map(|e| (e.source(), e.target(), e.weight()))
    }

    pub fn successors(&self, id: StateId) -> impl Iterator<Item = (StateId, &Transition)> {
        self.inner
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
    }

    pub fn out_degree(&self, id: StateId) -> usize {
        self.inner.edges_directed(id, Direction::Outgoing).count()
    }

    pub fn has_transition(&self, source: StateId, target: StateId) -> bool {
        self.inner.find_edge(source, target).is_some()
    }

    /// States without outgoing transitions: finished or deadlocked
    /// processes, or states the exploration stopped at.
    pub fn terminal_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.inner
            .node_indices()
            .filter(move |&id| self.out_degree(id) == 0)
    }

    /// The state and transition labels as plain strings.
    pub fn labelled(&self) -> DiGraph<String, String> {
        self.inner.map(
            |id, state| match &state.term {
                Some(term) => term.to_string(),
                None => format!("state {}", id.index()),
            },
            |_, transition| transition.rule.clone(),
        )
    }
}
