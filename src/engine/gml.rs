//! Reading and writing the GML subset used for graphs and rules.
//!
//! ```text
//! graph [
//!     node [ id 0 label "go" ]
//!     node [ id 1 label "t(p)" ]
//!     edge [ source 0 target 1 label "-" ]
//! ]
//! ```
//!
//! Rules wrap the same elements in `left`, `context` and `right` sections.

use std::collections::HashMap;
use std::fmt;

use pest::Parser;
use pest::iterators::Pair;

use super::graph::Graph;
use super::label::Label;
use super::rule::{Rule, RuleBuilder, Side};
use crate::error::{Error, Result};

mod parser {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "../grammar/gml.pest"]
    pub struct GmlParser;
}

use parser::{GmlParser, Rule as Gml};

#[derive(Debug, Default)]
struct Section {
    nodes: Vec<(i64, String)>,
    edges: Vec<(i64, i64, String)>,
}

fn text_of(pair: Pair<Gml>) -> String {
    pair.into_inner()
        .next()
        .and_then(|text| text.into_inner().next())
        .map(|inner| inner.as_str().to_string())
        .unwrap_or_default()
}

fn int_of(pair: Pair<Gml>) -> Result<i64> {
    let int = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::Parse("missing integer".into()))?;
    int.as_str()
        .parse()
        .map_err(|e| Error::Parse(format!("bad integer '{}': {e}", int.as_str())))
}

fn read_section(pair: Pair<Gml>) -> Result<Section> {
    let mut section = Section::default();

    for element in pair.into_inner() {
        match element.as_rule() {
            Gml::Node => {
                let (mut id, mut label) = (None, None);
                for attr in element.into_inner() {
                    match attr.as_rule() {
                        Gml::Id => id = Some(int_of(attr)?),
                        Gml::Label => label = Some(text_of(attr)),
                        _ => {}
                    }
                }
                let id = id.ok_or_else(|| Error::Parse("node without id".into()))?;
                let label =
                    label.ok_or_else(|| Error::Parse(format!("node {id} without label")))?;
                section.nodes.push((id, label));
            }
            Gml::Edge => {
                let (mut source, mut target, mut label) = (None, None, None);
                for attr in element.into_inner() {
                    match attr.as_rule() {
                        Gml::Source => source = Some(int_of(attr)?),
                        Gml::Target => target = Some(int_of(attr)?),
                        Gml::Label => label = Some(text_of(attr)),
                        _ => {}
                    }
                }
                match (source, target, label) {
                    (Some(s), Some(t), Some(l)) => section.edges.push((s, t, l)),
                    _ => return Err(Error::Parse("edge needs source, target and label".into())),
                }
            }
            _ => {}
        }
    }

    Ok(section)
}

impl Graph {
    pub fn from_gml(text: &str) -> Result<Graph> {
        let file = GmlParser::parse(Gml::GraphFile, text)
            .map_err(|e| Error::Parse(format!("GML graph: {e}")))?
            .next()
            .ok_or_else(|| Error::Parse("empty GML graph".into()))?;
        let body = file
            .into_inner()
            .next()
            .ok_or_else(|| Error::Parse("empty GML graph".into()))?;
        let section = read_section(body)?;

        let mut graph = Graph::new();
        let mut ids = HashMap::new();
        for (id, label) in section.nodes {
            let v = graph.add_vertex(Label::parse(&label)?);
            if ids.insert(id, v).is_some() {
                return Err(Error::Parse(format!("duplicate node id {id}")));
            }
        }
        for (s, t, label) in section.edges {
            let (Some(&sv), Some(&tv)) = (ids.get(&s), ids.get(&t)) else {
                return Err(Error::Parse(format!("edge {s} -> {t} refers to a missing node")));
            };
            if !graph.add_edge(sv, tv, Label::parse(&label)?) {
                return Err(Error::Parse(format!("duplicate edge {s} -> {t}")));
            }
        }

        Ok(graph)
    }

    pub fn to_gml(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph [")?;
        for (v, label) in self.vertices() {
            writeln!(f, "    node [ id {} label \"{label}\" ]", v.index())?;
        }
        for (s, t, label) in self.edges() {
            writeln!(
                f,
                "    edge [ source {} target {} label \"{label}\" ]",
                s.index(),
                t.index()
            )?;
        }
        write!(f, "]")
    }
}

impl Rule {
    pub fn from_gml(text: &str) -> Result<Rule> {
        let file = GmlParser::parse(Gml::RuleFile, text)
            .map_err(|e| Error::Parse(format!("GML rule: {e}")))?
            .next()
            .ok_or_else(|| Error::Parse("empty GML rule".into()))?;
        let body = file
            .into_inner()
            .next()
            .ok_or_else(|| Error::Parse("empty GML rule".into()))?;

        let mut builder = RuleBuilder::default();
        for part in body.into_inner() {
            let side = match part.as_rule() {
                Gml::RuleId => {
                    builder.name(text_of(part));
                    continue;
                }
                Gml::Left => Side::Left,
                Gml::Context => Side::Context,
                Gml::Right => Side::Right,
                _ => continue,
            };
            let section = read_section(part)?;
            for (id, label) in section.nodes {
                builder.vertex(side, id, Label::parse(&label)?)?;
            }
            for (s, t, label) in section.edges {
                builder.edge(side, s, t, Label::parse(&label)?)?;
            }
        }

        builder.build()
    }

    pub fn to_gml(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rule [")?;
        writeln!(f, "    ruleID \"{}\"", self.name())?;
        for side in [Side::Left, Side::Context, Side::Right] {
            writeln!(f, "    {} [", side.keyword())?;
            for (id, label) in self.vertices_on(side) {
                writeln!(f, "        node [ id {id} label \"{label}\" ]")?;
            }
            for (s, t, label) in self.edges_on(side) {
                writeln!(f, "        edge [ source {s} target {t} label \"{label}\" ]")?;
            }
            writeln!(f, "    ]")?;
        }
        write!(f, "]")
    }
}
