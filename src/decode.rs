//! Reads a normalized state graph back into a process term.

use std::collections::{BTreeSet, HashMap};

use crate::engine::{Graph, Label, VertexId};
use crate::error::{Error, Result};
use crate::term::{Name, Term};

enum Vertex<'a> {
    Process,
    Guard,
    Out,
    In,
    Call(&'a str),
}

fn classify(label: &Label) -> Option<Vertex<'_>> {
    if label.symbol() != Some("t") {
        return None;
    }
    match label.args() {
        [Label::Atom(op)] => match op.as_str() {
            "p" => Some(Vertex::Process),
            "s" => Some(Vertex::Guard),
            "out" => Some(Vertex::Out),
            "in" => Some(Vertex::In),
            _ => None,
        },
        [call @ Label::App(_, _)] if call.symbol() == Some("call") => match call.args() {
            [Label::Atom(name)] => Some(Vertex::Call(name)),
            _ => None,
        },
        _ => None,
    }
}

/// `Some(ident)` for a free name `v(x)`, `None` for a bound `v(*)`.
fn name_ident(label: &Label) -> Option<Option<&str>> {
    if label.symbol() != Some("v") {
        return None;
    }
    match label.args() {
        [Label::Atom(ident)] if ident == "*" => Some(None),
        [Label::Atom(ident)] => Some(Some(ident)),
        _ => None,
    }
}

struct Decoder<'g> {
    graph: &'g Graph,
    free: BTreeSet<&'g str>,
    bound: HashMap<VertexId, Name>,
    counter: usize,
}

impl<'g> Decoder<'g> {
    fn new(graph: &'g Graph) -> Self {
        let free = graph
            .vertices()
            .filter_map(|(_, l)| name_ident(l).flatten())
            .collect();
        Self {
            graph,
            free,
            bound: HashMap::new(),
            counter: 0,
        }
    }

    fn fresh(&mut self, v: VertexId) -> Name {
        let name = loop {
            self.counter += 1;
            let ident = format!("n{}", self.counter);
            if !self.free.contains(ident.as_str()) {
                break Name::new(ident);
            }
        };
        self.bound.insert(v, name.clone());
        name
    }

    fn name(&mut self, v: VertexId) -> Result<Name> {
        let graph = self.graph;
        match name_ident(graph.label(v)) {
            Some(Some(ident)) => Ok(Name::new(ident)),
            Some(None) => match self.bound.get(&v) {
                Some(name) => Ok(name.clone()),
                None => Ok(self.fresh(v)),
            },
            None => Err(unexpected(graph, v, "a name")),
        }
    }

    fn children(&self, v: VertexId) -> Vec<VertexId> {
        let mut children: Vec<VertexId> = self.graph.successors(v).map(|(c, _)| c).collect();
        children.sort();
        children
    }

    fn process(&mut self, v: VertexId) -> Result<Term> {
        let graph = self.graph;
        let mut parts = Vec::new();
        for child in self.children(v) {
            let part = match classify(graph.label(child)) {
                Some(Vertex::Guard) => Term::Coerce(Box::new(self.choice(child)?)),
                Some(Vertex::Call(name)) => self.call(child, name)?,
                _ => return Err(unexpected(graph, child, "a guard or a call")),
            };
            parts.push(part);
        }
        Ok(fold(parts, Term::Par).unwrap_or(Term::Null))
    }

    fn choice(&mut self, v: VertexId) -> Result<Term> {
        let mut operands = Vec::new();
        for child in self.children(v) {
            operands.push(self.action(child)?);
        }
        fold(operands, Term::Sum).ok_or_else(|| {
            Error::Decode(format!("guard {} has no action", v.index()))
        })
    }

    fn action(&mut self, v: VertexId) -> Result<Term> {
        let graph = self.graph;
        let input = match classify(graph.label(v)) {
            Some(Vertex::In) => true,
            Some(Vertex::Out) => false,
            _ => return Err(unexpected(graph, v, "an action")),
        };

        let (mut channel, mut object, mut next) = (None, None, None);
        for (target, label) in graph.successors(v) {
            match label.symbol() {
                Some("sync") => channel = Some(target),
                Some("arg") => object = Some(target),
                Some("arg-sync") => (channel, object) = (Some(target), Some(target)),
                Some("-") => next = Some(target),
                _ => {
                    return Err(Error::Decode(format!(
                        "action {} has an edge labelled '{label}'",
                        v.index()
                    )));
                }
            }
        }
        let missing = |what: &str| Error::Decode(format!("action {} has no {what}", v.index()));
        let channel = channel.ok_or_else(|| missing("channel"))?;
        let object = object.ok_or_else(|| missing("argument"))?;
        let next = next.ok_or_else(|| missing("continuation"))?;

        let x = self.name(channel)?;
        let y = self.name(object)?;
        let p = Box::new(self.process(next)?);
        Ok(if input {
            Term::In(x, y, p)
        } else {
            Term::Out(x, y, p)
        })
    }

    fn call(&mut self, v: VertexId, name: &str) -> Result<Term> {
        let graph = self.graph;
        let mut pointers: Vec<(usize, VertexId)> = Vec::new();
        for (ptr, label) in graph.successors(v) {
            let position = label
                .symbol()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::Decode(format!("call {} has an unnumbered pointer", v.index())))?;
            pointers.push((position, ptr));
        }
        pointers.sort();

        let mut args = Vec::with_capacity(pointers.len());
        for (i, (position, ptr)) in pointers.into_iter().enumerate() {
            if i != position {
                return Err(Error::Decode(format!("call {} skips argument {i}", v.index())));
            }
            let target = graph
                .successors(ptr)
                .next()
                .map(|(t, _)| t)
                .ok_or_else(|| Error::Decode(format!("pointer {} points nowhere", ptr.index())))?;
            args.push(self.name(target)?);
        }
        Ok(Term::Call(name.to_string(), args))
    }
}

fn unexpected(graph: &Graph, v: VertexId, expected: &str) -> Error {
    Error::Decode(format!(
        "expected {expected} at vertex {}, found '{}'",
        v.index(),
        graph.label(v)
    ))
}

fn fold(terms: Vec<Term>, op: fn(Box<Term>, Box<Term>) -> Term) -> Option<Term> {
    terms.into_iter().reduce(|acc, t| op(Box::new(acc), Box::new(t)))
}

/// Decodes the process rooted at the `go` vertex of `graph`.
///
/// Bound names get fresh identifiers `n1`, `n2`, ... that avoid the free
/// names of the graph. Bound names no input binds are restricted at the top.
pub fn decode(graph: &Graph) -> Result<Term> {
    let root = graph
        .root()
        .ok_or_else(|| Error::Decode("the graph has no root".into()))?;
    let top = graph
        .successors(root)
        .next()
        .map(|(v, _)| v)
        .ok_or_else(|| Error::Decode("the root has no process".into()))?;

    let received: BTreeSet<VertexId> = graph
        .vertices()
        .filter(|(_, l)| matches!(classify(l), Some(Vertex::In)))
        .flat_map(|(v, _)| graph.successors(v))
        .filter(|(_, l)| l.symbol() == Some("arg"))
        .map(|(t, _)| t)
        .collect();

    let mut decoder = Decoder::new(graph);
    let restricted: Vec<Name> = graph
        .vertices()
        .filter(|(v, l)| name_ident(l) == Some(None) && !received.contains(v))
        .map(|(v, _)| decoder.fresh(v))
        .collect();

    let body = decoder.process(top)?;
    Ok(restricted
        .into_iter()
        .rev()
        .fold(body, |p, y| Term::Restrict(y, Box::new(p))))
}
