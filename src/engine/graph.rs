use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use super::label::Label;

pub type VertexId = NodeIndex;

/// Label of the synthetic root every encoded state hangs off.
pub const ROOT: &str = "go";

/// A directed graph with term labels and at most one edge per ordered pair
/// of vertices.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: DiGraph<Label, Label>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, label: Label) -> VertexId {
        self.inner.add_node(label)
    }

    /// Inserts an edge unless one already connects `source` to `target`.
    pub fn add_edge(&mut self, source: VertexId, target: VertexId, label: Label) -> bool {
        if self.inner.find_edge(source, target).is_some() {
            return false;
        }
        self.inner.add_edge(source, target, label);
        true
    }

    pub fn vertex_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Label)> {
        self.inner
            .node_indices()
            .map(move |v| (v, &self.inner[v]))
    }

    pub fn edges(&self) -> impl Iterator<Item = (VertexId, VertexId, &Label)> {
        self.inner
            .edge_indices()
            .filter_map(move |e| {
                let (s, t) = self.inner.edge_endpoints(e)?;
                Some((s, t, &self.inner[e]))
            })
    }

    pub fn label(&self, v: VertexId) -> &Label {
        &self.inner[v]
    }

    pub fn edge_label(&self, source: VertexId, target: VertexId) -> Option<&Label> {
        self.inner
            .find_edge(source, target)
            .map(|e| &self.inner[e])
    }

    /// Outgoing edges of `v` as `(target, label)` pairs.
    pub fn successors(&self, v: VertexId) -> impl Iterator<Item = (VertexId, &Label)> {
        self.neighbours(v, Direction::Outgoing)
    }

    /// Incoming edges of `v` as `(source, label)` pairs.
    pub fn predecessors(&self, v: VertexId) -> impl Iterator<Item = (VertexId, &Label)> {
        self.neighbours(v, Direction::Incoming)
    }

    pub(crate) fn neighbours(
        &self,
        v: VertexId,
        dir: Direction,
    ) -> impl Iterator<Item = (VertexId, &Label)> {
        use petgraph::visit::EdgeRef;

        self.inner.edges_directed(v, dir).map(move |e| {
            let other = match dir {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            };
            (other, e.weight())
        })
    }

    pub fn degree(&self, v: VertexId, dir: Direction) -> usize {
        self.inner.edges_directed(v, dir).count()
    }

    pub fn count_label(&self, label: &Label) -> usize {
        self.inner.node_weights().filter(|l| *l == label).count()
    }

    /// The `go` vertex, if the graph has one.
    pub fn root(&self) -> Option<VertexId> {
        let go = Label::atom(ROOT);
        self.inner.node_indices().find(|&v| self.inner[v] == go)
    }

    /// The weakly connected component holding the root.
    ///
    /// Graphs without a root are returned unchanged.
    pub fn root_component(&self) -> Graph {
        let Some(root) = self.root() else {
            return self.clone();
        };

        let mut seen = vec![false; self.inner.node_count()];
        let mut queue = VecDeque::from([root]);
        seen[root.index()] = true;
        while let Some(v) = queue.pop_front() {
            for u in self.inner.neighbors_undirected(v) {
                if !seen[u.index()] {
                    seen[u.index()] = true;
                    queue.push_back(u);
                }
            }
        }

        if seen.iter().all(|s| *s) {
            return self.clone();
        }

        let mut result = Graph::new();
        let mut map = HashMap::new();
        for v in self.inner.node_indices().filter(|v| seen[v.index()]) {
            map.insert(v, result.add_vertex(self.inner[v].clone()));
        }
        for (s, t, label) in self.edges() {
            if let (Some(&s), Some(&t)) = (map.get(&s), map.get(&t)) {
                result.add_edge(s, t, label.clone());
            }
        }
        result
    }

    /// A hash that is invariant under isomorphism.
    ///
    /// Equal fingerprints are necessary, not sufficient, for isomorphism.
    pub fn fingerprint(&self) -> u64 {
        let mut signatures: Vec<String> = self
            .inner
            .node_indices()
            .map(|v| {
                let mut out: Vec<String> = self
                    .successors(v)
                    .map(|(t, l)| format!("{l}>{}", self.inner[t]))
                    .collect();
                let mut inc: Vec<String> = self
                    .predecessors(v)
                    .map(|(s, l)| format!("{l}<{}", self.inner[s]))
                    .collect();
                out.sort();
                inc.sort();
                format!("{}[{}][{}]", self.inner[v], out.join(";"), inc.join(";"))
            })
            .collect();
        signatures.sort();

        let mut hasher = DefaultHasher::new();
        signatures.hash(&mut hasher);
        hasher.finish()
    }

    pub fn is_isomorphic(&self, other: &Graph) -> bool {
        self.vertex_count() == other.vertex_count()
            && self.edge_count() == other.edge_count()
            && self.fingerprint() == other.fingerprint()
            && petgraph::algo::is_isomorphic_matching(
                &self.inner,
                &other.inner,
                |a, b| a == b,
                |a, b| a == b,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(labels: &[&str]) -> Graph {
        let mut g = Graph::new();
        let vs: Vec<_> = labels.iter().map(|l| g.add_vertex(Label::from(*l))).collect();
        for w in vs.windows(2) {
            g.add_edge(w[0], w[1], Label::atom("-"));
        }
        g
    }

    #[test]
    fn rejects_parallel_edges() {
        let mut g = chain(&["go", "t(p)"]);
        let (s, t) = (NodeIndex::new(0), NodeIndex::new(1));
        assert!(!g.add_edge(s, t, Label::atom("d")));
        assert!(g.add_edge(t, s, Label::atom("d")));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn root_component_drops_detached_vertices() {
        let mut g = chain(&["go", "t(p)", "t(s)"]);
        let lone = g.add_vertex(Label::from("gc"));
        let name = g.add_vertex(Label::from("v(x)"));
        g.add_edge(lone, name, Label::atom("-"));

        let rooted = g.root_component();
        assert_eq!(rooted.vertex_count(), 3);
        assert_eq!(rooted.edge_count(), 2);
        assert_eq!(rooted.count_label(&Label::from("gc")), 0);
    }

    #[test]
    fn isomorphism_ignores_vertex_order() {
        let a = chain(&["go", "t(p)", "t(s)"]);

        let mut b = Graph::new();
        let s = b.add_vertex(Label::from("t(s)"));
        let p = b.add_vertex(Label::from("t(p)"));
        let go = b.add_vertex(Label::from("go"));
        b.add_edge(go, p, Label::atom("-"));
        b.add_edge(p, s, Label::atom("-"));

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.is_isomorphic(&b));
        assert!(!a.is_isomorphic(&chain(&["go", "t(s)", "t(p)"])));
    }
}
