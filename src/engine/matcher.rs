//! Enumeration of rule matches.
//!
//! A match is an injective map from the vertices of `left ∪ context` into
//! the host graph that unifies every vertex and edge label under one set of
//! variable bindings and maps every pattern edge onto a host edge of the
//! same direction.

use std::ops::ControlFlow;

use petgraph::Direction;

use super::graph::{Graph, VertexId};
use super::label::Bindings;
use super::rule::Rule;

#[derive(Debug, Clone)]
pub(crate) struct Match {
    /// Host vertex per rule vertex; `None` for vertices created by the rule.
    pub(crate) image: Vec<Option<VertexId>>,
    pub(crate) bindings: Bindings,
}

/// Search order over the pattern vertices, computed per host graph.
struct Plan {
    order: Vec<usize>,
    /// An already placed neighbour to draw candidates from, with the
    /// direction of the host edges to follow from its image.
    anchors: Vec<Option<(usize, Direction)>>,
    /// Pattern edges whose last endpoint is placed at each position.
    checks: Vec<Vec<usize>>,
    out_degree: Vec<usize>,
    in_degree: Vec<usize>,
}

impl Plan {
    fn new(rule: &Rule, host: &Graph) -> Plan {
        let n = rule.vertices.len();
        let pattern: Vec<usize> = (0..n).filter(|&i| rule.vertices[i].lhs.is_some()).collect();
        let left_edges: Vec<usize> = (0..rule.edges.len())
            .filter(|&e| rule.edges[e].lhs.is_some())
            .collect();

        let candidates: Vec<usize> = (0..n)
            .map(|i| match &rule.vertices[i].lhs {
                Some(lhs) => host
                    .vertices()
                    .filter(|(_, l)| lhs.unify(l, &mut Bindings::new()))
                    .count(),
                None => 0,
            })
            .collect();

        let mut out_degree = vec![0; n];
        let mut in_degree = vec![0; n];
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &e in &left_edges {
            let edge = &rule.edges[e];
            out_degree[edge.source] += 1;
            in_degree[edge.target] += 1;
            incident[edge.source].push(e);
            if edge.target != edge.source {
                incident[edge.target].push(e);
            }
        }

        let mut placed = vec![false; n];
        let mut position = vec![usize::MAX; n];
        let mut order = Vec::with_capacity(pattern.len());
        while order.len() < pattern.len() {
            let connected = |i: usize| {
                incident[i].iter().any(|&e| {
                    let edge = &rule.edges[e];
                    placed[edge.source] || placed[edge.target]
                })
            };
            let pick = pattern
                .iter()
                .copied()
                .filter(|&i| !placed[i] && connected(i))
                .min_by_key(|&i| candidates[i])
                .or_else(|| {
                    pattern
                        .iter()
                        .copied()
                        .filter(|&i| !placed[i])
                        .min_by_key(|&i| candidates[i])
                });
            let Some(next) = pick else { break };
            placed[next] = true;
            position[next] = order.len();
            order.push(next);
        }

        let mut anchors = Vec::with_capacity(order.len());
        let mut checks = vec![Vec::new(); order.len()];
        for (k, &p) in order.iter().enumerate() {
            let anchor = incident[p].iter().find_map(|&e| {
                let edge = &rule.edges[e];
                if edge.source == p && edge.target != p && position[edge.target] < k {
                    Some((edge.target, Direction::Incoming))
                } else if edge.target == p && edge.source != p && position[edge.source] < k {
                    Some((edge.source, Direction::Outgoing))
                } else {
                    None
                }
            });
            anchors.push(anchor);
        }
        for &e in &left_edges {
            let edge = &rule.edges[e];
            let last = position[edge.source].max(position[edge.target]);
            checks[last].push(e);
        }

        Plan {
            order,
            anchors,
            checks,
            out_degree,
            in_degree,
        }
    }
}

struct Search<'a> {
    rule: &'a Rule,
    host: &'a Graph,
    plan: Plan,
    image: Vec<Option<VertexId>>,
    used: Vec<bool>,
    bindings: Bindings,
}

impl Search<'_> {
    fn extend<F>(&mut self, k: usize, visit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&Match) -> ControlFlow<()>,
    {
        if k == self.plan.order.len() {
            return visit(&Match {
                image: self.image.clone(),
                bindings: self.bindings.clone(),
            });
        }

        let (rule, host) = (self.rule, self.host);
        let p = self.plan.order[k];
        let candidates: Vec<VertexId> = match self.plan.anchors[k] {
            Some((other, dir)) => match self.image[other] {
                Some(anchor) => host.neighbours(anchor, dir).map(|(v, _)| v).collect(),
                None => Vec::new(),
            },
            None => host.vertices().map(|(v, _)| v).collect(),
        };
        let Some(lhs) = rule.vertices[p].lhs.as_ref() else {
            return ControlFlow::Continue(());
        };

        for h in candidates {
            if self.used[h.index()]
                || host.degree(h, Direction::Outgoing) < self.plan.out_degree[p]
                || host.degree(h, Direction::Incoming) < self.plan.in_degree[p]
            {
                continue;
            }

            let snapshot = self.bindings.clone();
            if !lhs.unify(host.label(h), &mut self.bindings) {
                continue;
            }
            self.image[p] = Some(h);
            self.used[h.index()] = true;

            if self.edges_agree(k) {
                self.extend(k + 1, visit)?;
            }

            self.image[p] = None;
            self.used[h.index()] = false;
            self.bindings = snapshot;
        }

        ControlFlow::Continue(())
    }

    fn edges_agree(&mut self, k: usize) -> bool {
        let (rule, host) = (self.rule, self.host);
        for &e in &self.plan.checks[k] {
            let edge = &rule.edges[e];
            let (Some(s), Some(t), Some(lhs)) =
                (self.image[edge.source], self.image[edge.target], edge.lhs.as_ref())
            else {
                return false;
            };
            match host.edge_label(s, t) {
                Some(label) if lhs.unify(label, &mut self.bindings) => {}
                _ => return false,
            }
        }
        true
    }
}

impl Rule {
    /// Calls `visit` for each match of the rule in `host` until it breaks.
    pub(crate) fn for_each_match<F>(&self, host: &Graph, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(&Match) -> ControlFlow<()>,
    {
        let mut search = Search {
            rule: self,
            host,
            plan: Plan::new(self, host),
            image: vec![None; self.vertices.len()],
            used: vec![false; host.vertex_count()],
            bindings: Bindings::new(),
        };
        search.extend(0, &mut visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(rule: &str, graph: &str) -> usize {
        let rule = Rule::from_gml(rule).unwrap();
        let graph = Graph::from_gml(graph).unwrap();
        let mut n = 0;
        let _ = rule.for_each_match(&graph, |_| {
            n += 1;
            ControlFlow::Continue(())
        });
        n
    }

    const STAR: &str = r#"graph [
        node [ id 0 label "t(p)" ]
        node [ id 1 label "t(s)" ]
        node [ id 2 label "t(s)" ]
        node [ id 3 label "v(x)" ]
        edge [ source 0 target 1 label "-" ]
        edge [ source 0 target 2 label "-" ]
        edge [ source 1 target 3 label "sync" ]
    ]"#;

    #[test]
    fn matches_respect_direction() {
        let forward = r#"rule [ context [
            node [ id 0 label "t(p)" ] node [ id 1 label "t(s)" ]
            edge [ source 0 target 1 label "-" ] ] ]"#;
        let backward = r#"rule [ context [
            node [ id 0 label "t(p)" ] node [ id 1 label "t(s)" ]
            edge [ source 1 target 0 label "-" ] ] ]"#;
        assert_eq!(count(forward, STAR), 2);
        assert_eq!(count(backward, STAR), 0);
    }

    #[test]
    fn variables_bind_across_vertices() {
        let same = r#"rule [ context [
            node [ id 0 label "_A" ] node [ id 1 label "_A" ]
            edge [ source 0 target 1 label "_E" ] ] ]"#;
        assert_eq!(count(same, STAR), 0);

        let any = r#"rule [ context [
            node [ id 0 label "_A" ] node [ id 1 label "_B" ]
            edge [ source 0 target 1 label "sync" ] ] ]"#;
        assert_eq!(count(any, STAR), 1);
    }

    #[test]
    fn matches_are_injective() {
        let pair = r#"rule [ context [
            node [ id 0 label "t(s)" ] node [ id 1 label "t(s)" ] ] ]"#;
        assert_eq!(count(pair, STAR), 2);
    }
}
