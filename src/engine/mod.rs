//! A small directed graph rewriting engine.
//!
//! Graphs carry term labels, rules are written in GML and applied with
//! [`apply`], which enumerates matches and realizes the rewritten graphs.

mod gml;
mod graph;
mod label;
mod matcher;
mod rule;

use std::ops::ControlFlow;

use log::trace;

pub use graph::{Graph, ROOT, VertexId};
pub use label::{Bindings, Label};
pub use rule::{Rule, Side};
pub(crate) use rule::RuleBuilder;

/// One rewrite step: `graphs[source]` rewritten by `rule` into `target`.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub source: usize,
    pub rule: String,
    pub target: Graph,
}

/// Applies `rule` to every graph in `graphs`.
///
/// Results of one source graph are deduplicated up to isomorphism. With a
/// `limit`, at most that many derivations are produced per source graph.
pub fn apply(graphs: &[Graph], rule: &Rule, limit: Option<usize>) -> Vec<Derivation> {
    let mut derivations = Vec::new();

    for (source, host) in graphs.iter().enumerate() {
        let mut found: Vec<Graph> = Vec::new();
        let _ = rule.for_each_match(host, |m| {
            if limit.is_some_and(|limit| found.len() >= limit) {
                return ControlFlow::Break(());
            }
            if let Some(target) = rule.realize(host, m) {
                if !found.iter().any(|g| g.is_isomorphic(&target)) {
                    found.push(target);
                }
            }
            if limit.is_some_and(|limit| found.len() >= limit) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        trace!("{}: {} result(s) on graph {source}", rule.name(), found.len());
        derivations.extend(found.into_iter().map(|target| Derivation {
            source,
            rule: rule.name().to_string(),
            target,
        }));
    }

    derivations
}
