use std::collections::{HashMap, HashSet};

use super::graph::{Graph, VertexId};
use super::label::Label;
use super::matcher::Match;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Context,
    Right,
}

impl Side {
    pub fn keyword(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Context => "context",
            Side::Right => "right",
        }
    }
}

/// A vertex of the rule span. `lhs` is its label in `left ∪ context`,
/// `rhs` its label in `right ∪ context`.
#[derive(Debug, Clone)]
pub(crate) struct RuleVertex {
    pub(crate) id: i64,
    pub(crate) lhs: Option<Label>,
    pub(crate) rhs: Option<Label>,
    pub(crate) context: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuleEdge {
    pub(crate) source: usize,
    pub(crate) target: usize,
    pub(crate) lhs: Option<Label>,
    pub(crate) rhs: Option<Label>,
    pub(crate) context: bool,
}

/// A double-pushout style rewrite rule.
///
/// Vertices and edges only on the left are deleted, only on the right are
/// created, in the context are kept, and on both the left and the right are
/// relabelled.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    pub(crate) vertices: Vec<RuleVertex>,
    pub(crate) edges: Vec<RuleEdge>,
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The literal rule rewriting all of `left` into all of `right`.
    ///
    /// Right-hand vertex ids are offset past the left-hand ones.
    pub fn from_graphs(left: &Graph, right: &Graph, name: impl Into<String>) -> Result<Rule> {
        let mut builder = RuleBuilder::default();
        builder.name(name);
        let offset = left.vertex_count() as i64;

        for (side, graph, shift) in [(Side::Left, left, 0), (Side::Right, right, offset)] {
            for (v, label) in graph.vertices() {
                builder.vertex(side, v.index() as i64 + shift, label.clone())?;
            }
            for (s, t, label) in graph.edges() {
                builder.edge(
                    side,
                    s.index() as i64 + shift,
                    t.index() as i64 + shift,
                    label.clone(),
                )?;
            }
        }

        builder.build()
    }

    pub fn vertices_on(&self, side: Side) -> impl Iterator<Item = (i64, &Label)> {
        self.vertices.iter().filter_map(move |v| {
            let label = match side {
                Side::Left if !v.context => v.lhs.as_ref(),
                Side::Context if v.context => v.lhs.as_ref(),
                Side::Right if !v.context => v.rhs.as_ref(),
                _ => None,
            }?;
            Some((v.id, label))
        })
    }

    pub fn edges_on(&self, side: Side) -> impl Iterator<Item = (i64, i64, &Label)> {
        self.edges.iter().filter_map(move |e| {
            let label = match side {
                Side::Left if !e.context => e.lhs.as_ref(),
                Side::Context if e.context => e.lhs.as_ref(),
                Side::Right if !e.context => e.rhs.as_ref(),
                _ => None,
            }?;
            Some((self.vertices[e.source].id, self.vertices[e.target].id, label))
        })
    }

    /// Builds the rewritten graph for `m`, or `None` when the match violates
    /// the dangling condition or would create a parallel edge.
    pub(crate) fn realize(&self, host: &Graph, m: &Match) -> Option<Graph> {
        let image = |i: usize| m.image[i];

        let deleted: HashSet<VertexId> = self
            .vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.lhs.is_some() && v.rhs.is_none())
            .filter_map(|(i, _)| image(i))
            .collect();

        let matched_edges: HashMap<(VertexId, VertexId), &RuleEdge> = self
            .edges
            .iter()
            .filter(|e| e.lhs.is_some())
            .filter_map(|e| Some(((image(e.source)?, image(e.target)?), e)))
            .collect();

        for (s, t, _) in host.edges() {
            if (deleted.contains(&s) || deleted.contains(&t)) && !matched_edges.contains_key(&(s, t)) {
                return None;
            }
        }

        let relabel: HashMap<VertexId, Label> = self
            .vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.context && v.lhs.is_some())
            .filter_map(|(i, v)| Some((image(i)?, v.rhs.as_ref()?.substitute(&m.bindings))))
            .collect();

        let mut result = Graph::new();
        let mut map: HashMap<VertexId, VertexId> = HashMap::new();
        for (v, label) in host.vertices() {
            if deleted.contains(&v) {
                continue;
            }
            let label = relabel.get(&v).cloned().unwrap_or_else(|| label.clone());
            map.insert(v, result.add_vertex(label));
        }

        let mut created: HashMap<usize, VertexId> = HashMap::new();
        for (i, v) in self.vertices.iter().enumerate() {
            if let (None, Some(rhs)) = (&v.lhs, &v.rhs) {
                created.insert(i, result.add_vertex(rhs.substitute(&m.bindings)));
            }
        }

        for (s, t, label) in host.edges() {
            let (Some(&rs), Some(&rt)) = (map.get(&s), map.get(&t)) else {
                continue;
            };
            let label = match matched_edges.get(&(s, t)) {
                Some(e) => match (&e.rhs, e.context) {
                    (None, _) => continue,
                    (Some(_), true) => label.clone(),
                    (Some(rhs), false) => rhs.substitute(&m.bindings),
                },
                None => label.clone(),
            };
            result.add_edge(rs, rt, label);
        }

        let endpoint = |i: usize| -> Option<VertexId> {
            match image(i) {
                Some(h) => map.get(&h).copied(),
                None => created.get(&i).copied(),
            }
        };
        for e in self.edges.iter().filter(|e| e.lhs.is_none()) {
            let (Some(s), Some(t), Some(rhs)) = (endpoint(e.source), endpoint(e.target), &e.rhs)
            else {
                return None;
            };
            if !result.add_edge(s, t, rhs.substitute(&m.bindings)) {
                return None;
            }
        }

        Some(result)
    }
}

#[derive(Debug, Default)]
pub(crate) struct RuleBuilder {
    name: Option<String>,
    vertices: Vec<RuleVertex>,
    ids: HashMap<i64, usize>,
    pending: Vec<(Side, i64, i64, Label)>,
}

impl RuleBuilder {
    pub(crate) fn name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub(crate) fn vertex(&mut self, side: Side, id: i64, label: Label) -> Result<()> {
        let idx = *self.ids.entry(id).or_insert_with(|| {
            self.vertices.push(RuleVertex {
                id,
                lhs: None,
                rhs: None,
                context: false,
            });
            self.vertices.len() - 1
        });
        let v = &mut self.vertices[idx];

        match side {
            Side::Left if v.lhs.is_none() => v.lhs = Some(label),
            Side::Right if v.rhs.is_none() => v.rhs = Some(label),
            Side::Context if v.lhs.is_none() && v.rhs.is_none() => {
                v.lhs = Some(label.clone());
                v.rhs = Some(label);
                v.context = true;
            }
            _ => {
                return Err(Error::Rule(format!(
                    "vertex {id} is declared more than once on the {} side",
                    side.keyword()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn edge(&mut self, side: Side, source: i64, target: i64, label: Label) -> Result<()> {
        self.pending.push((side, source, target, label));
        Ok(())
    }

    pub(crate) fn build(self) -> Result<Rule> {
        let name = self.name.unwrap_or_else(|| "rule".to_string());
        let mut edges: Vec<RuleEdge> = Vec::new();
        let mut keys: HashMap<(usize, usize), usize> = HashMap::new();

        for (side, s, t, label) in self.pending {
            let (Some(&source), Some(&target)) = (self.ids.get(&s), self.ids.get(&t)) else {
                return Err(Error::Rule(format!(
                    "{name}: edge {s} -> {t} refers to an undeclared vertex"
                )));
            };
            let idx = *keys.entry((source, target)).or_insert_with(|| {
                edges.push(RuleEdge {
                    source,
                    target,
                    lhs: None,
                    rhs: None,
                    context: false,
                });
                edges.len() - 1
            });
            let e = &mut edges[idx];
            match side {
                Side::Left if e.lhs.is_none() => e.lhs = Some(label),
                Side::Right if e.rhs.is_none() => e.rhs = Some(label),
                Side::Context if e.lhs.is_none() && e.rhs.is_none() => {
                    e.lhs = Some(label.clone());
                    e.rhs = Some(label);
                    e.context = true;
                }
                _ => {
                    return Err(Error::Rule(format!(
                        "{name}: edge {s} -> {t} is declared more than once on the {} side",
                        side.keyword()
                    )));
                }
            }
        }

        for e in &edges {
            let (src, tgt) = (&self.vertices[e.source], &self.vertices[e.target]);
            if e.lhs.is_some() && (src.lhs.is_none() || tgt.lhs.is_none()) {
                return Err(Error::Rule(format!(
                    "{name}: left edge {} -> {} needs both endpoints on the left",
                    src.id, tgt.id
                )));
            }
            if e.rhs.is_some() && (src.rhs.is_none() || tgt.rhs.is_none()) {
                return Err(Error::Rule(format!(
                    "{name}: right edge {} -> {} needs both endpoints on the right",
                    src.id, tgt.id
                )));
            }
        }

        Ok(Rule {
            name,
            vertices: self.vertices,
            edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_vertices_cannot_be_redeclared() {
        let text = r#"rule [
            left [ node [ id 0 label "a" ] ]
            context [ node [ id 0 label "a" ] ]
        ]"#;
        assert!(matches!(Rule::from_gml(text), Err(Error::Rule(_))));
    }

    #[test]
    fn edges_need_endpoints_on_their_side() {
        let text = r#"rule [
            left [ node [ id 0 label "a" ] ]
            context [ node [ id 1 label "b" ] ]
            right [ edge [ source 0 target 1 label "-" ] ]
        ]"#;
        assert!(matches!(Rule::from_gml(text), Err(Error::Rule(_))));
    }

    #[test]
    fn literal_rules_keep_both_sides() {
        let left = Graph::from_gml(r#"graph [ node [ id 0 label "go" ] ]"#).unwrap();
        let right = Graph::from_gml(
            r#"graph [ node [ id 0 label "go" ] node [ id 1 label "t(p)" ]
               edge [ source 0 target 1 label "-" ] ]"#,
        )
        .unwrap();
        let rule = Rule::from_graphs(&left, &right, "step").unwrap();
        assert_eq!(rule.vertices_on(Side::Left).count(), 1);
        assert_eq!(rule.vertices_on(Side::Right).count(), 2);
        assert_eq!(
            rule.edges_on(Side::Right).collect::<Vec<_>>(),
            vec![(1, 2, &Label::atom("-"))]
        );
    }
}
