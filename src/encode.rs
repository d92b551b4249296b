//! Encoding of process terms into port graphs and engine graphs.

use std::collections::BTreeMap;

use log::trace;

use crate::engine::Graph;
use crate::error::{Error, Result};
use crate::gadgets::{self, GUARD, PROCESS};
use crate::port_graph::PortGraph;
use crate::term::{Name, Term};

/// Nesting level of every name in scope.
pub type Scope = BTreeMap<Name, u32>;

/// Hands out nesting levels for names bound during one encoding.
#[derive(Debug, Default)]
pub struct FreshNameAllocator {
    last: u32,
}

impl FreshNameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> u32 {
        self.last += 1;
        self.last
    }
}

pub struct Encoder<'a> {
    names: &'a mut FreshNameAllocator,
}

impl<'a> Encoder<'a> {
    pub fn new(names: &'a mut FreshNameAllocator) -> Self {
        Self { names }
    }

    pub fn encode(&mut self, term: &Term, scope: &Scope) -> Result<PortGraph> {
        match term {
            Term::Null => Ok(gadgets::null() | gadgets::new(&in_scope(scope))),
            Term::Out(x, y, p) => {
                let (x, y) = (qualify(scope, x)?, qualify(scope, y)?);
                let rest = self.encode(p, scope)? | gadgets::id([&x]) | gadgets::id([&y]);
                gadgets::action("out", &x, &y) << rest
            }
            Term::In(x, y, p) => {
                let x = qualify(scope, x)?;
                let (y, inner) = self.bind(scope, y);
                let rest = self.encode(p, &inner)? | gadgets::id([&x, &y]);
                gadgets::action("in", &x, &y) << rest
            }
            Term::Restrict(y, p) => {
                let (_, inner) = self.bind(scope, y);
                self.encode(p, &inner)
            }
            Term::Sum(p, q) => {
                let operands = self.encode(p, scope)? | self.encode(q, scope)?;
                gadgets::binary("sum", GUARD) << operands
            }
            Term::Par(p, q) => {
                let operands = self.encode(p, scope)? | self.encode(q, scope)?;
                gadgets::binary("par", PROCESS) << operands
            }
            Term::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| qualify(scope, a))
                    .collect::<Result<Vec<_>>>()?;
                let unused: Vec<Name> = in_scope(scope)
                    .into_iter()
                    .filter(|n| args.iter().all(|a| a.ident() != n.ident()))
                    .collect();
                Ok(gadgets::call(name, &args) | gadgets::new(&unused))
            }
            Term::Coerce(p) => gadgets::coerce() << self.encode(p, scope)?,
        }
    }

    /// Opens a fresh nesting level for `y`.
    fn bind(&mut self, scope: &Scope, y: &Name) -> (Name, Scope) {
        let level = self.names.fresh();
        let mut inner = scope.clone();
        inner.insert(y.clone(), level);
        (y.at(level), inner)
    }
}

fn qualify(scope: &Scope, name: &Name) -> Result<Name> {
    scope
        .get(name)
        .map(|&level| name.at(level))
        .ok_or_else(|| Error::term(format!("name '{name}' is not in scope")))
}

fn in_scope(scope: &Scope) -> Vec<Name> {
    scope.iter().map(|(name, &level)| name.at(level)).collect()
}

/// Free names keep their identifier, bound ones become the anonymous
/// `v(*)` so that alpha-equivalent terms encode alike.
fn external_label(label: &str) -> String {
    let Some((ident, level)) = label
        .strip_prefix("v(")
        .and_then(|rest| rest.strip_suffix(')'))
        .and_then(|inner| inner.rsplit_once(','))
    else {
        return label.to_string();
    };
    if level == "0" {
        format!("v({ident})")
    } else {
        "v(*)".to_string()
    }
}

/// Encodes `term` into its port graph, every free name at nesting level 0.
pub fn encode_ports(term: &Term) -> Result<PortGraph> {
    let scope: Scope = term.free_names().into_iter().map(|n| (n, 0)).collect();
    let mut names = FreshNameAllocator::new();
    Encoder::new(&mut names).encode(term, &scope)
}

/// Hands a port graph to the engine, rooted at a `go` vertex.
pub fn externalize(ports: &PortGraph) -> Result<Graph> {
    let text = ports.to_gml_rooted(external_label)?;
    trace!("externalized port graph:\n{text}");
    Ok(Graph::from_gml(&text)?.root_component())
}

/// Encodes `term` into an engine graph (not yet normalized).
pub fn encode(term: &Term) -> Result<Graph> {
    externalize(&encode_ports(term)?)
}
