//! Port-graph fragments, one per primitive of the calculus.

use std::collections::BTreeMap;

use crate::port_graph::{PLAIN, PortGraph};
use crate::term::Name;

pub const PROCESS: &str = "t(p)";
pub const GUARD: &str = "t(s)";
pub const POINTER: &str = "ptr";

pub fn op_label(op: &str) -> String {
    format!("t({op})")
}

pub fn call_label(name: &str) -> String {
    format!("t(call({name}))")
}

/// A call site: the call vertex points at one `ptr` per argument, the edge
/// labelled with the argument position, and each `ptr` at its name.
pub fn call(name: &str, args: &[Name]) -> PortGraph {
    let mut g = PortGraph::new();
    let p = g.add_vertex(PROCESS, true, false);
    let site = g.add_vertex(call_label(name), false, false);
    g.add_edge(p, site, PLAIN);

    let mut names = BTreeMap::new();
    for arg in args {
        let label = arg.vertex_label();
        if !names.contains_key(&label) {
            let v = g.add_vertex(label.clone(), false, true);
            names.insert(label, v);
        }
    }
    for (i, arg) in args.iter().enumerate() {
        let ptr = g.add_vertex(POINTER, false, false);
        g.add_edge(site, ptr, &i.to_string());
        g.add_edge(ptr, names[&arg.vertex_label()], PLAIN);
    }
    g
}

/// An action `op` on channel `x` carrying `y`, guarded by a `t(s)` port
/// and continued by a `t(p)` port.
pub fn action(op: &str, x: &Name, y: &Name) -> PortGraph {
    let mut g = PortGraph::new();
    let s = g.add_vertex(GUARD, true, false);
    let v = g.add_vertex(op_label(op), false, false);
    let vx = g.add_vertex(x.vertex_label(), false, true);
    let vy = if x == y && x.nesting() == y.nesting() {
        vx
    } else {
        g.add_vertex(y.vertex_label(), false, true)
    };
    let p = g.add_vertex(PROCESS, false, true);

    g.add_edge(s, v, PLAIN);
    g.add_edge(v, p, PLAIN);
    g.add_edge(v, vx, "sync");
    g.add_edge(v, vy, "arg");
    g
}

/// `t(p) → t(s)`: turns a process port into a guard port.
pub fn coerce() -> PortGraph {
    let mut g = PortGraph::new();
    let p = g.add_vertex(PROCESS, true, false);
    let s = g.add_vertex(GUARD, false, true);
    g.add_edge(p, s, PLAIN);
    g
}

/// Names passed through unchanged.
pub fn id<'a>(names: impl IntoIterator<Item = &'a Name>) -> PortGraph {
    let mut g = PortGraph::new();
    for name in names {
        g.add_vertex(name.vertex_label(), true, true);
    }
    g
}

/// Names introduced as dangling outputs.
pub fn new<'a>(names: impl IntoIterator<Item = &'a Name>) -> PortGraph {
    let mut g = PortGraph::new();
    for name in names {
        g.add_vertex(name.vertex_label(), false, true);
    }
    g
}

/// The terminated process.
pub fn null() -> PortGraph {
    let mut g = PortGraph::new();
    g.add_vertex(PROCESS, true, false);
    g
}

/// A binary operator over two ports of type `port`.
pub fn binary(op: &str, port: &str) -> PortGraph {
    let mut g = PortGraph::new();
    let top = g.add_vertex(port, true, false);
    let left = g.add_vertex(port, false, true);
    let right = g.add_vertex(port, false, true);
    let v = g.add_vertex(op_label(op), false, false);
    g.add_edge(top, v, PLAIN);
    g.add_edge(v, left, PLAIN);
    g.add_edge(v, right, PLAIN);
    g
}
