//! Named process definitions and the rules that expand their call sites.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, warn};

use crate::encode::encode;
use crate::engine::{Graph, Label, ROOT, Rule, RuleBuilder, Side, VertexId};
use crate::error::{Error, Result};
use crate::gadgets::{POINTER, PROCESS, call_label};
use crate::normalize::{DEFAULT_STEP_BUDGET, Normalizer};
use crate::term::{Definition, Name, Process, Term, check_ident};

#[derive(Debug, Clone)]
struct Entry {
    definition: Definition,
    rule: Rule,
}

/// Definitions by name, each compiled into a call-expansion rule when it is
/// added.
#[derive(Debug, Clone)]
pub struct RecursiveProcessTable {
    entries: BTreeMap<String, Entry>,
    rules: Vec<Rule>,
    step_budget: usize,
}

impl Default for RecursiveProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RecursiveProcessTable {
    pub fn new() -> Self {
        Self::with_step_budget(DEFAULT_STEP_BUDGET)
    }

    /// A table normalizing definition bodies within `step_budget` rewrites.
    pub fn with_step_budget(step_budget: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            rules: Vec::new(),
            step_budget,
        }
    }

    pub fn add(&mut self, name: impl Into<String>, args: Vec<Name>, body: Process) -> Result<()> {
        self.add_definition(Definition {
            name: name.into(),
            args,
            body,
        })
    }

    pub fn add_definition(&mut self, definition: Definition) -> Result<()> {
        let name = definition.name.as_str();
        if self.entries.contains_key(name) {
            return Err(Error::term(format!("'{name}' is already defined")));
        }

        check_ident(name)?;
        let mut formals = BTreeSet::new();
        for arg in &definition.args {
            check_ident(arg.ident())?;
            if !formals.insert(arg) {
                return Err(Error::term(format!(
                    "'{name}' names its argument '{arg}' twice"
                )));
            }
        }

        let body = definition.body.term();
        if let Some(free) = body.free_names().iter().find(|n| !formals.contains(n)) {
            return Err(Error::term(format!(
                "'{name}' uses '{free}', which is not one of its arguments"
            )));
        }

        let arity = definition.args.len();
        for (callee, n) in body.calls() {
            let expected = if callee == name {
                Some(arity)
            } else {
                self.arity(callee)
            };
            check_arity(callee, n, expected)?;
        }
        for entry in self.entries.values() {
            for (callee, n) in entry.definition.body.term().calls() {
                if callee == name {
                    check_arity(callee, n, Some(arity))?;
                }
            }
        }

        let normalizer = Normalizer::new(self.step_budget)?;
        let graph = normalizer.normal_form(encode(&body)?)?;
        let rule = call_rule(name, &definition.args, &graph)?;
        debug!("defined {definition}");

        self.rules.push(rule.clone());
        self.entries
            .insert(definition.name.clone(), Entry { definition, rule });
        Ok(())
    }

    /// The call-expansion rules, one per definition.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.entries.get(name).map(|e| &e.definition)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.entries.get(name).map(|e| &e.rule)
    }

    pub fn arity(&self, name: &str) -> Option<usize> {
        self.get(name).map(|d| d.args.len())
    }

    pub fn step_budget(&self) -> usize {
        self.step_budget
    }

    /// Checks every call site of `term` against the table. Calls to names
    /// that are not defined are only reported: they never expand.
    pub fn check_calls(&self, term: &Term) -> Result<()> {
        for (callee, n) in term.calls() {
            match self.arity(callee) {
                Some(expected) => check_arity(callee, n, Some(expected))?,
                None => warn!("'{callee}' is called but never defined"),
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_arity(callee: &str, found: usize, expected: Option<usize>) -> Result<()> {
    match expected {
        Some(expected) if expected != found => Err(Error::term(format!(
            "'{callee}' takes {expected} argument(s) but is called with {found}"
        ))),
        _ => Ok(()),
    }
}

/// The rule replacing a top-level call of `name` by a copy of `body`.
///
/// The call vertex and its numbered pointer edges are consumed; each pointer
/// becomes a `merge(ptr)` marker that the body's uses of the matching
/// formal argument are wired into.
fn call_rule(name: &str, args: &[Name], body: &Graph) -> Result<Rule> {
    let plain = Label::atom("-");
    let mut rule = RuleBuilder::default();
    rule.name(format!("call {name}"));

    rule.vertex(Side::Context, 0, Label::atom(ROOT))?;
    rule.vertex(Side::Context, 1, Label::parse(PROCESS)?)?;
    rule.edge(Side::Context, 0, 1, plain.clone())?;
    rule.vertex(Side::Left, 2, Label::parse(&call_label(name))?)?;
    rule.edge(Side::Left, 1, 2, plain)?;

    let mut formals = HashMap::new();
    for (i, arg) in args.iter().enumerate() {
        let ptr = 3 + i as i64;
        rule.vertex(Side::Left, ptr, Label::atom(POINTER))?;
        rule.vertex(Side::Right, ptr, Label::app("merge", vec![Label::atom(POINTER)]))?;
        rule.edge(Side::Left, 2, ptr, Label::atom(i.to_string()))?;
        formals.insert(Label::app("v", vec![Label::atom(arg.ident())]), ptr);
    }

    let root = body
        .root()
        .ok_or_else(|| Error::Rule(format!("body of '{name}' has no root")))?;
    let entry = body
        .successors(root)
        .next()
        .map(|(v, _)| v)
        .ok_or_else(|| Error::Rule(format!("body of '{name}' has no process vertex")))?;

    let mut ids: HashMap<VertexId, i64> = HashMap::from([(root, 0), (entry, 1)]);
    let mut next = 3 + args.len() as i64;
    for (v, label) in body.vertices() {
        if ids.contains_key(&v) {
            continue;
        }
        let id = match formals.get(label) {
            Some(&ptr) => ptr,
            None => {
                rule.vertex(Side::Right, next, label.clone())?;
                next += 1;
                next - 1
            }
        };
        ids.insert(v, id);
    }

    for (s, t, label) in body.edges() {
        if s == root && t == entry {
            continue;
        }
        rule.edge(Side::Right, ids[&s], ids[&t], label.clone())?;
    }

    rule.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::names;

    fn forwarder() -> Process {
        Process::new()
            .input("x", "z")
            .unwrap()
            .output("y", "z")
            .unwrap()
            .call("F", names("x y"))
            .unwrap()
    }

    #[test]
    fn definitions_compile_to_call_rules() {
        let mut table = RecursiveProcessTable::new();
        table.add("F", names("x y"), forwarder()).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.arity("F"), Some(2));
        let rule = table.rule("F").unwrap();
        assert_eq!(rule.name(), "call F");

        let left: Vec<_> = rule.vertices_on(Side::Left).map(|(_, l)| l.to_string()).collect();
        assert_eq!(left, vec!["t(call(F))", "ptr", "ptr"]);
        let markers = rule
            .vertices_on(Side::Right)
            .filter(|(_, l)| l.to_string() == "merge(ptr)")
            .count();
        assert_eq!(markers, 2);
        assert!(
            rule.vertices_on(Side::Right)
                .any(|(_, l)| l.to_string() == "t(call(F))")
        );
    }

    #[test]
    fn arity_is_checked_in_both_directions() {
        let mut table = RecursiveProcessTable::new();
        let calls_g = Process::new().call("G", names("a b")).unwrap();
        table.add("F", names("a b"), calls_g).unwrap();

        let g = Process::new().output("a", "a").unwrap();
        assert!(matches!(table.add("G", names("a"), g), Err(Error::Term(_))));

        let wrong = Process::new().call("F", names("x y z")).unwrap();
        assert!(matches!(table.check_calls(&wrong.term()), Err(Error::Term(_))));
        let right = Process::new().call("F", names("x y")).unwrap();
        assert!(table.check_calls(&right.term()).is_ok());
        let undefined = Process::new().call("H", names("x")).unwrap();
        assert!(table.check_calls(&undefined.term()).is_ok());
    }

    #[test]
    fn recursive_calls_must_agree_with_the_definition() {
        let mut table = RecursiveProcessTable::new();
        let body = Process::new().input("x", "y").unwrap().call("A", names("x y")).unwrap();
        assert!(matches!(table.add("A", names("x"), body), Err(Error::Term(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn malformed_definitions_are_rejected() {
        let mut table = RecursiveProcessTable::new();
        let body = Process::new().output("x", "y").unwrap();
        assert!(matches!(
            table.add("A", names("x x"), body.clone()),
            Err(Error::Term(_))
        ));
        assert!(matches!(table.add("A", names("x"), body.clone()), Err(Error::Term(_))));

        table.add("A", names("x y"), body.clone()).unwrap();
        assert!(matches!(table.add("A", names("x y"), body), Err(Error::Term(_))));
    }

    #[test]
    fn bodies_may_be_a_single_call() {
        let mut table = RecursiveProcessTable::new();
        let calls_g = Process::new().call("G", names("x")).unwrap();
        table.add("F", names("x"), calls_g).unwrap();
        let rule = table.rule("F").unwrap();
        assert!(
            rule.vertices_on(Side::Right)
                .any(|(_, l)| l.to_string() == "t(call(G))")
        );
    }

    #[test]
    fn formals_must_be_identifiers() {
        let mut table = RecursiveProcessTable::new();
        let body = Process::new().output("x", "x").unwrap();
        let formals = vec![Name::new("_x")];
        assert!(matches!(table.add("A", formals, body.clone()), Err(Error::Term(_))));
        assert!(matches!(table.add("_A", names("x"), body), Err(Error::Term(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn unused_arguments_still_take_a_pointer() {
        let mut table = RecursiveProcessTable::new();
        table.add("Z", names("x"), Process::new()).unwrap();
        let rule = table.rule("Z").unwrap();
        assert_eq!(rule.vertices_on(Side::Left).count(), 2);
        assert_eq!(rule.edges_on(Side::Right).count(), 0);
    }
}
