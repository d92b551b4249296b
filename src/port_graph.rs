//! Graphs with input and output ports, the unit of structural composition
//! while a term is encoded.

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::engine::ROOT;
use crate::error::{Error, Result};

pub type PortId = NodeIndex;

/// Default edge label.
pub const PLAIN: &str = "-";

#[derive(Debug, Clone, Default)]
pub struct PortGraph {
    graph: DiGraph<String, String>,
    inputs: BTreeSet<PortId>,
    outputs: BTreeSet<PortId>,
}

impl PortGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, label: impl Into<String>, input: bool, output: bool) -> PortId {
        let v = self.graph.add_node(label.into());
        if input {
            self.inputs.insert(v);
        }
        if output {
            self.outputs.insert(v);
        }
        v
    }

    /// Adds an edge. An edge already joining `source` to `target` keeps
    /// both roles: its label becomes the sorted labels joined by `-`.
    pub fn add_edge(&mut self, source: PortId, target: PortId, label: &str) {
        match self.graph.find_edge(source, target) {
            Some(e) => {
                let mut labels = [self.graph[e].as_str(), label];
                labels.sort_unstable();
                self.graph[e] = labels.join("-");
            }
            None => {
                self.graph.add_edge(source, target, label.to_string());
            }
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = (PortId, &str)> + '_ {
        self.graph
            .node_indices()
            .map(move |v| (v, self.graph[v].as_str()))
    }

    pub fn label(&self, v: PortId) -> &str {
        &self.graph[v]
    }

    pub fn edge_label(&self, source: PortId, target: PortId) -> Option<&str> {
        self.graph
            .find_edge(source, target)
            .map(|e| self.graph[e].as_str())
    }

    pub fn is_input(&self, v: PortId) -> bool {
        self.inputs.contains(&v)
    }

    pub fn is_output(&self, v: PortId) -> bool {
        self.outputs.contains(&v)
    }

    pub fn inputs(&self) -> impl Iterator<Item = PortId> + '_ {
        self.inputs.iter().copied()
    }

    pub fn outputs(&self) -> impl Iterator<Item = PortId> + '_ {
        self.outputs.iter().copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn ports_by_label(&self, ports: &BTreeSet<PortId>) -> HashMap<String, Vec<PortId>> {
        let mut by_label: HashMap<String, Vec<PortId>> = HashMap::new();
        for &v in ports {
            by_label.entry(self.graph[v].clone()).or_default().push(v);
        }
        by_label
    }

    /// `lhs << rhs`: `rhs` runs first and `lhs` continues from its inputs.
    ///
    /// Each output of `lhs` is identified with the most recent input of
    /// `rhs` carrying the same label. Repeated labels are consumed like a
    /// stack, the last one being shared once the others are used up.
    pub fn compose_sequential(lhs: PortGraph, rhs: PortGraph) -> Result<PortGraph> {
        if lhs.is_empty() {
            return Ok(rhs);
        }
        if rhs.is_empty() {
            return Ok(lhs);
        }

        let mut available = rhs.ports_by_label(&rhs.inputs);
        let mut res = rhs;
        let mut map = HashMap::with_capacity(lhs.vertex_count());

        for v in lhs.graph.node_indices() {
            let label = &lhs.graph[v];
            if lhs.is_output(v) {
                let candidates = available.get_mut(label).ok_or_else(|| {
                    Error::compose(format!("no input port '{label}' to continue from"))
                })?;
                let Some(&port) = candidates.last() else {
                    return Err(Error::compose(format!("no input port '{label}' left")));
                };
                if candidates.len() > 1 {
                    candidates.pop();
                }
                map.insert(v, port);
            } else {
                map.insert(v, res.add_vertex(label.clone(), lhs.is_input(v), false));
            }
        }

        for e in lhs.graph.edge_indices() {
            if let Some((s, t)) = lhs.graph.edge_endpoints(e) {
                res.add_edge(map[&s], map[&t], &lhs.graph[e]);
            }
        }

        res.inputs = lhs.inputs.iter().map(|v| map[v]).collect();
        Ok(res)
    }

    /// `lhs | rhs`: vertices of `rhs` labelled like an output of `lhs` are
    /// wired onto that output, which also becomes an input; the rest of
    /// `rhs` is copied alongside.
    pub fn compose_parallel(lhs: PortGraph, rhs: PortGraph) -> PortGraph {
        let out_names: HashMap<String, PortId> = lhs
            .ports_by_label(&lhs.outputs)
            .into_iter()
            .filter_map(|(label, ports)| Some((label, *ports.first()?)))
            .collect();

        let mut res = lhs;
        let mut map = HashMap::with_capacity(rhs.vertex_count());
        for v in rhs.graph.node_indices() {
            let label = &rhs.graph[v];
            match out_names.get(label) {
                Some(&port) => {
                    res.inputs.insert(port);
                    map.insert(v, port);
                }
                None => {
                    let copy = res.add_vertex(label.clone(), rhs.is_input(v), rhs.is_output(v));
                    map.insert(v, copy);
                }
            }
        }

        for e in rhs.graph.edge_indices() {
            if let Some((s, t)) = rhs.graph.edge_endpoints(e) {
                res.add_edge(map[&s], map[&t], &rhs.graph[e]);
            }
        }

        res
    }

    /// Isomorphism that also respects the input and output flags.
    pub fn is_isomorphic(&self, other: &PortGraph) -> bool {
        petgraph::algo::is_isomorphic_matching(
            &self.flagged(),
            &other.flagged(),
            |a, b| a == b,
            |a, b| a == b,
        )
    }

    fn flagged(&self) -> DiGraph<(String, bool, bool), String> {
        self.graph.map(
            |v, label| (label.clone(), self.is_input(v), self.is_output(v)),
            |_, label| label.clone(),
        )
    }

    /// GML text of the graph with a `go` root wired to its only input.
    ///
    /// `relabel` maps each vertex label to its external form.
    pub fn to_gml_rooted(&self, relabel: impl Fn(&str) -> String) -> Result<String> {
        let mut inputs = self.inputs();
        let (Some(entry), None) = (inputs.next(), inputs.next()) else {
            return Err(Error::compose(format!(
                "an encoded process needs exactly one entry port, found {}",
                self.inputs.len()
            )));
        };

        let mut lines = vec!["graph [".to_string()];
        for v in self.graph.node_indices() {
            lines.push(format!(
                "    node [ id {} label \"{}\" ]",
                v.index(),
                relabel(&self.graph[v])
            ));
        }
        let root = self.graph.node_count();
        lines.push(format!("    node [ id {root} label \"{ROOT}\" ]"));
        lines.push(format!(
            "    edge [ source {root} target {} label \"{PLAIN}\" ]",
            entry.index()
        ));
        for e in self.graph.edge_indices() {
            if let Some((s, t)) = self.graph.edge_endpoints(e) {
                lines.push(format!(
                    "    edge [ source {} target {} label \"{}\" ]",
                    s.index(),
                    t.index(),
                    self.graph[e]
                ));
            }
        }
        lines.push("]".to_string());
        Ok(lines.join("\n"))
    }
}

impl std::ops::Shl for PortGraph {
    type Output = Result<PortGraph>;

    fn shl(self, rhs: PortGraph) -> Result<PortGraph> {
        PortGraph::compose_sequential(self, rhs)
    }
}

impl std::ops::BitOr for PortGraph {
    type Output = PortGraph;

    fn bitor(self, rhs: PortGraph) -> PortGraph {
        PortGraph::compose_parallel(self, rhs)
    }
}
