//! Term-structured labels.
//!
//! Vertex and edge labels are first-order terms such as `t(call(A))` or
//! `merge(v(*))`. Identifiers starting with `_` are variables; they only
//! appear in rule patterns and are bound by one-sided unification against
//! the (ground) labels of a host graph.

use std::collections::HashMap;
use std::fmt;

use pest::Parser;
use pest::iterators::Pair;

use crate::error::{Error, Result};

mod parser {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "../grammar/label.pest"]
    pub struct LabelParser;
}

use parser::{LabelParser, Rule};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Atom(String),
    App(String, Vec<Label>),
    Var(String),
}

pub type Bindings = HashMap<String, Label>;

impl Label {
    pub fn parse(text: &str) -> Result<Self> {
        let file = LabelParser::parse(Rule::LabelFile, text)
            .map_err(|e| Error::Parse(format!("label '{text}': {e}")))?
            .next()
            .ok_or_else(|| Error::Parse(format!("label '{text}' is empty")))?;

        let term = file
            .into_inner()
            .next()
            .ok_or_else(|| Error::Parse(format!("label '{text}' is empty")))?;

        Ok(build(term))
    }

    pub fn atom(symbol: impl Into<String>) -> Self {
        Label::Atom(symbol.into())
    }

    pub fn app(symbol: impl Into<String>, args: Vec<Label>) -> Self {
        Label::App(symbol.into(), args)
    }

    /// The outermost symbol, `None` for variables.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Label::Atom(s) | Label::App(s, _) => Some(s),
            Label::Var(_) => None,
        }
    }

    pub fn args(&self) -> &[Label] {
        match self {
            Label::App(_, args) => args,
            _ => &[],
        }
    }

    /// Unifies this pattern with a ground `host` label, extending `bindings`.
    ///
    /// On failure `bindings` is left exactly as it was.
    pub fn unify(&self, host: &Label, bindings: &mut Bindings) -> bool {
        let mut bound = Vec::new();
        if self.unify_into(host, bindings, &mut bound) {
            return true;
        }
        for var in bound {
            bindings.remove(&var);
        }
        false
    }

    fn unify_into(&self, host: &Label, bindings: &mut Bindings, bound: &mut Vec<String>) -> bool {
        match self {
            Label::Var(var) => match bindings.get(var) {
                Some(value) => value == host,
                None => {
                    bindings.insert(var.clone(), host.clone());
                    bound.push(var.clone());
                    true
                }
            },
            Label::Atom(a) => matches!(host, Label::Atom(b) if a == b),
            Label::App(f, args) => match host {
                Label::App(g, host_args) if f == g && args.len() == host_args.len() => args
                    .iter()
                    .zip(host_args)
                    .all(|(p, h)| p.unify_into(h, bindings, bound)),
                _ => false,
            },
        }
    }

    /// Replaces bound variables; unbound ones are kept as they are.
    pub fn substitute(&self, bindings: &Bindings) -> Label {
        match self {
            Label::Var(var) => bindings.get(var).cloned().unwrap_or_else(|| self.clone()),
            Label::Atom(_) => self.clone(),
            Label::App(f, args) => {
                Label::App(f.clone(), args.iter().map(|a| a.substitute(bindings)).collect())
            }
        }
    }
}

fn build(pair: Pair<Rule>) -> Label {
    let pair = match pair.as_rule() {
        Rule::Term => match pair.into_inner().next() {
            Some(inner) => inner,
            None => return Label::atom(""),
        },
        _ => pair,
    };

    match pair.as_rule() {
        Rule::Variable => Label::Var(pair.as_str().to_string()),
        Rule::Application => {
            let mut inner = pair.into_inner();
            let symbol = inner.next().map(|s| s.as_str().to_string()).unwrap_or_default();
            Label::App(symbol, inner.map(build).collect())
        }
        _ => Label::Atom(pair.as_str().to_string()),
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Atom(s) | Label::Var(s) => write!(f, "{s}"),
            Label::App(symbol, args) => {
                write!(f, "{symbol}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for Label {
    /// Builds a label from trusted, well-formed text; malformed text becomes
    /// a single atom.
    fn from(text: &str) -> Self {
        Label::parse(text).unwrap_or_else(|_| Label::atom(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_terms() {
        let label = Label::parse("t(call(A))").unwrap();
        assert_eq!(
            label,
            Label::app("t", vec![Label::app("call", vec![Label::atom("A")])])
        );
        assert_eq!(label.to_string(), "t(call(A))");
    }

    #[test]
    fn parses_atoms_with_dashes_and_variables() {
        assert_eq!(Label::parse("arg-sync").unwrap(), Label::atom("arg-sync"));
        assert_eq!(Label::parse("-").unwrap(), Label::atom("-"));
        assert_eq!(Label::parse("_X").unwrap(), Label::Var("_X".into()));
        assert_eq!(
            Label::parse("merge(v(*))").unwrap().to_string(),
            "merge(v(*))"
        );
    }

    #[test]
    fn unification_binds_consistently() {
        let pattern = Label::parse("merge(_A)").unwrap();
        let mut bindings = Bindings::new();
        assert!(pattern.unify(&Label::parse("merge(t(p))").unwrap(), &mut bindings));
        assert_eq!(bindings["_A"], Label::parse("t(p)").unwrap());

        let again = Label::parse("_A").unwrap();
        assert!(again.unify(&Label::parse("t(p)").unwrap(), &mut bindings));
        assert!(!again.unify(&Label::parse("t(s)").unwrap(), &mut bindings));
    }

    #[test]
    fn failed_unification_rolls_back() {
        let pattern = Label::parse("f(_A,b)").unwrap();
        let mut bindings = Bindings::new();
        assert!(!pattern.unify(&Label::parse("f(a,c)").unwrap(), &mut bindings));
        assert!(bindings.is_empty());
    }

    #[test]
    fn substitution_fills_bound_variables() {
        let mut bindings = Bindings::new();
        bindings.insert("_Z".into(), Label::atom("x"));
        let label = Label::parse("merge(v(_Z))").unwrap().substitute(&bindings);
        assert_eq!(label.to_string(), "merge(v(x))");
    }
}
