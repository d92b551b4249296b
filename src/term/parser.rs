//! Reader for process files: a list of definitions followed by the process
//! under study.
//!
//! ```text
//! A(x) := in(x, y).A(y);
//! out(a, b) | A(a)
//! ```

use std::fmt;

use pest::Parser;
use pest::iterators::Pair;

use super::{Name, Process};
use crate::error::{Error, Result};

mod grammar {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "../grammar/process.pest"]
    pub struct ProcessParser;
}

use grammar::{ProcessParser, Rule};

/// `name(args) := body;`
#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    pub args: Vec<Name>,
    pub body: Process,
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<&str> = self.args.iter().map(Name::ident).collect();
        write!(f, "{}({}) := {}", self.name, args.join(", "), self.body)
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub definitions: Vec<Definition>,
    pub process: Process,
}

pub fn parse_program(text: &str) -> Result<Program> {
    let program = ProcessParser::parse(Rule::Program, text)
        .map_err(|e| Error::Parse(format!("process file: {e}")))?
        .next()
        .ok_or_else(|| Error::Parse("empty process file".into()))?;

    let mut definitions = Vec::new();
    let mut process = None;
    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::Definition => definitions.push(build_definition(pair)?),
            Rule::Process => process = Some(build_process(pair)?),
            _ => {}
        }
    }

    Ok(Program {
        definitions,
        process: process.ok_or_else(|| Error::Parse("missing process".into()))?,
    })
}

fn missing(what: &str) -> Error {
    Error::Parse(format!("process file: missing {what}"))
}

fn build_definition(pair: Pair<Rule>) -> Result<Definition> {
    let mut inner = pair.into_inner();
    let name = inner.next().ok_or_else(|| missing("definition name"))?;
    let mut args = Vec::new();
    let mut body = None;
    for part in inner {
        match part.as_rule() {
            Rule::Names => args = names_of(part),
            Rule::Process => body = Some(build_process(part)?),
            _ => {}
        }
    }

    Ok(Definition {
        name: name.as_str().to_string(),
        args,
        body: body.ok_or_else(|| missing("definition body"))?,
    })
}

fn names_of(pair: Pair<Rule>) -> Vec<Name> {
    pair.into_inner().map(|ident| Name::new(ident.as_str())).collect()
}

fn channel_pair(pair: Pair<Rule>) -> Result<(Name, Name)> {
    let mut idents = pair.into_inner();
    match (idents.next(), idents.next()) {
        (Some(x), Some(y)) => Ok((Name::new(x.as_str()), Name::new(y.as_str()))),
        _ => Err(missing("channel names")),
    }
}

fn build_process(pair: Pair<Rule>) -> Result<Process> {
    let mut choices = pair.into_inner().map(build_choice);
    let first = choices.next().ok_or_else(|| missing("process"))??;
    choices.try_fold(first, |acc, next| Ok(acc | next?))
}

fn build_choice(pair: Pair<Rule>) -> Result<Process> {
    let mut sequences = pair.into_inner().map(build_sequence);
    let first = sequences.next().ok_or_else(|| missing("choice operand"))??;
    sequences.try_fold(first, |acc, next| acc + next?)
}

fn build_sequence(pair: Pair<Rule>) -> Result<Process> {
    let mut p = Process::new();
    let mut closed = false;
    for action in pair.into_inner() {
        if closed {
            return Err(Error::term(format!(
                "cannot append '{}' after '0'",
                action.as_str()
            )));
        }
        p = match action.as_rule() {
            Rule::Input => {
                let (x, y) = channel_pair(action)?;
                p.input(x, y)?
            }
            Rule::Output => {
                let (x, y) = channel_pair(action)?;
                p.output(x, y)?
            }
            Rule::Restrict => {
                let y = action.into_inner().next().ok_or_else(|| missing("name"))?;
                p.restrict(y.as_str())?
            }
            Rule::Call => {
                let mut inner = action.into_inner();
                let name = inner.next().ok_or_else(|| missing("process name"))?;
                let args = inner.next().map(names_of).unwrap_or_default();
                p.call(name.as_str(), args)?
            }
            Rule::Group => {
                let group = action.into_inner().next().ok_or_else(|| missing("group"))?;
                p.process(build_process(group)?)?
            }
            Rule::Null => {
                closed = true;
                p
            }
            _ => p,
        };
    }
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_process() {
        let program = parse_program("in(x, z).out(z, w) | out(x, y)").unwrap();
        assert!(program.definitions.is_empty());
        assert_eq!(
            program.process.to_string(),
            "in(x, z).out(z, w).0 | out(x, y).0"
        );
    }

    #[test]
    fn reads_definitions_before_the_process() {
        let program = parse_program(
            "// a forwarder
             A(x, y) := in(x, z).out(y, z).A(x, y);
             new(a).(out(a, b) | A(a, c))",
        )
        .unwrap();
        assert_eq!(program.definitions.len(), 1);
        let def = &program.definitions[0];
        assert_eq!(def.name, "A");
        assert_eq!(def.args, vec![Name::new("x"), Name::new("y")]);
        assert_eq!(def.to_string(), "A(x, y) := in(x, z).out(y, z).A(x, y)");
        assert_eq!(program.process.to_string(), "new(a).(out(a, b).0 | A(a, c))");
    }

    #[test]
    fn choice_binds_tighter_than_parallel() {
        let program = parse_program("in(x, y) + out(x, x) | 0").unwrap();
        assert_eq!(program.process.to_string(), "in(x, y).0 + out(x, x).0 | 0");
    }

    #[test]
    fn identifiers_may_start_with_keywords() {
        let program = parse_program("index(input, newer)").unwrap();
        assert_eq!(program.process.to_string(), "index(input, newer)");
    }

    #[test]
    fn builder_errors_surface_as_term_errors() {
        assert!(matches!(parse_program("A(x).out(x, y)"), Err(Error::Term(_))));
        assert!(matches!(parse_program("A(x) + out(x, y)"), Err(Error::Term(_))));
        assert!(matches!(parse_program("out(x y)"), Err(Error::Parse(_))));
        assert!(matches!(
            parse_program("out(x, y).0.in(a, b)"),
            Err(Error::Term(_))
        ));
        assert_eq!(
            parse_program("out(x, y).0").unwrap().process.to_string(),
            "out(x, y).0"
        );
    }

    #[test]
    fn identifiers_start_with_a_letter() {
        assert!(matches!(
            parse_program("A(_x) := out(_x, _x); A(a)"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(parse_program("out(_x, y)"), Err(Error::Parse(_))));
        let program = parse_program("A(x_1, y') := out(x_1, y'); A(a, b)").unwrap();
        assert_eq!(program.definitions[0].args, vec![Name::new("x_1"), Name::new("y'")]);
    }
}
