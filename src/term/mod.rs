//! The process calculus: names, terms and their textual form.

mod builder;
mod parser;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};

pub use builder::{Process, names};
pub use parser::{Definition, Program, parse_program};

/// A channel name.
///
/// Names compare by identifier only; `nesting` tells apart the scopes a name
/// has been bound in while a term is being encoded.
#[derive(Debug, Clone)]
pub struct Name {
    ident: String,
    nesting: u32,
}

impl Name {
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            nesting: 0,
        }
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn nesting(&self) -> u32 {
        self.nesting
    }

    #[must_use]
    pub fn at(&self, nesting: u32) -> Self {
        Self {
            ident: self.ident.clone(),
            nesting,
        }
    }

    /// Port-graph label of the name at its nesting level, `v(x,n)`.
    pub(crate) fn vertex_label(&self) -> String {
        format!("v({},{})", self.ident, self.nesting)
    }
}

/// Identifiers start with a letter, followed by letters, digits, `_` or
/// `'`. A leading `_` would read as a pattern variable inside graph labels.
pub(crate) fn check_ident(ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\'');
    if valid {
        Ok(())
    } else {
        Err(Error::term(format!("'{ident}' is not a valid identifier")))
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.ident == other.ident
    }
}

impl Eq for Name {}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ident.cmp(&other.ident)
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ident.hash(state);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ident)
    }
}

impl From<&str> for Name {
    fn from(ident: &str) -> Self {
        Name::new(ident)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Null,
    Out(Name, Name, Box<Term>),
    In(Name, Name, Box<Term>),
    Restrict(Name, Box<Term>),
    Sum(Box<Term>, Box<Term>),
    Par(Box<Term>, Box<Term>),
    Call(String, Vec<Name>),
    /// Adapts a process port to a guarded-choice port; prints as its body.
    Coerce(Box<Term>),
}

impl Term {
    pub fn free_names(&self) -> BTreeSet<Name> {
        match self {
            Term::Null => BTreeSet::new(),
            Term::Out(x, y, p) => {
                let mut names = p.free_names();
                names.insert(x.clone());
                names.insert(y.clone());
                names
            }
            Term::In(x, y, p) => {
                let mut names = p.free_names();
                names.remove(y);
                names.insert(x.clone());
                names
            }
            Term::Restrict(y, p) => {
                let mut names = p.free_names();
                names.remove(y);
                names
            }
            Term::Sum(p, q) | Term::Par(p, q) => {
                let mut names = p.free_names();
                names.extend(q.free_names());
                names
            }
            Term::Call(_, args) => args.iter().cloned().collect(),
            Term::Coerce(p) => p.free_names(),
        }
    }

    /// Every call site in the term as `(name, arity)`.
    pub fn calls(&self) -> Vec<(&str, usize)> {
        let mut calls = Vec::new();
        self.collect_calls(&mut calls);
        calls
    }

    fn collect_calls<'a>(&'a self, calls: &mut Vec<(&'a str, usize)>) {
        match self {
            Term::Null => {}
            Term::Out(_, _, p) | Term::In(_, _, p) | Term::Restrict(_, p) | Term::Coerce(p) => {
                p.collect_calls(calls);
            }
            Term::Sum(p, q) | Term::Par(p, q) => {
                p.collect_calls(calls);
                q.collect_calls(calls);
            }
            Term::Call(name, args) => calls.push((name, args.len())),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Term::Par(..) => 0,
            Term::Sum(..) => 1,
            Term::Coerce(p) => p.precedence(),
            _ => 2,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "(")?;
            self.fmt_at(f, 0)?;
            return write!(f, ")");
        }

        match self {
            Term::Null => write!(f, "0"),
            Term::Out(x, y, p) => {
                write!(f, "out({x}, {y}).")?;
                p.fmt_at(f, 2)
            }
            Term::In(x, y, p) => {
                write!(f, "in({x}, {y}).")?;
                p.fmt_at(f, 2)
            }
            Term::Restrict(y, p) => {
                write!(f, "new({y}).")?;
                p.fmt_at(f, 2)
            }
            Term::Sum(p, q) => {
                p.fmt_at(f, 1)?;
                write!(f, " + ")?;
                q.fmt_at(f, 1)
            }
            Term::Par(p, q) => {
                p.fmt_at(f, 0)?;
                write!(f, " | ")?;
                q.fmt_at(f, 0)
            }
            Term::Call(name, args) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Term::Coerce(p) => p.fmt_at(f, min),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}
