use std::fmt;
use std::ops::{Add, BitOr};

use super::{Name, Term, check_ident};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Step {
    Coerce,
    Out(Name, Name),
    In(Name, Name),
    Restrict(Name),
}

/// Builds a process as a sequence of prefixes closed by at most one
/// terminal construct (a call, a parallel composition or a choice).
///
/// ```
/// use epim::Process;
///
/// let p = Process::new().input("x", "z")?.output("z", "w")?;
/// let q = Process::new().output("x", "y")?;
/// assert_eq!((p | q).to_string(), "in(x, z).out(z, w).0 | out(x, y).0");
/// # Ok::<(), epim::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Process {
    steps: Vec<Step>,
    tail: Option<Term>,
}

impl Process {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&mut self, step: Step) -> Result<()> {
        self.ensure_open()?;
        self.steps.push(step);
        Ok(())
    }

    fn prefix(&mut self, step: Step) -> Result<()> {
        match &step {
            Step::Out(x, y) | Step::In(x, y) => {
                check_ident(x.ident())?;
                check_ident(y.ident())?;
            }
            Step::Restrict(y) => check_ident(y.ident())?,
            Step::Coerce => {}
        }
        self.append(step)
    }

    fn ensure_open(&self) -> Result<()> {
        match &self.tail {
            Some(tail) => Err(Error::term(format!(
                "cannot append to the end of '{}', '{tail}' is terminal",
                self.term()
            ))),
            None => Ok(()),
        }
    }

    pub fn output(mut self, x: impl Into<Name>, y: impl Into<Name>) -> Result<Self> {
        self.append(Step::Coerce)?;
        self.prefix(Step::Out(x.into(), y.into()))?;
        Ok(self)
    }

    pub fn input(mut self, x: impl Into<Name>, y: impl Into<Name>) -> Result<Self> {
        self.append(Step::Coerce)?;
        self.prefix(Step::In(x.into(), y.into()))?;
        Ok(self)
    }

    pub fn restrict(mut self, y: impl Into<Name>) -> Result<Self> {
        self.prefix(Step::Restrict(y.into()))?;
        Ok(self)
    }

    pub fn call<N: Into<Name>>(
        mut self,
        name: impl Into<String>,
        args: impl IntoIterator<Item = N>,
    ) -> Result<Self> {
        self.ensure_open()?;
        let name = name.into();
        let args: Vec<Name> = args.into_iter().map(Into::into).collect();
        check_ident(&name)?;
        for arg in &args {
            check_ident(arg.ident())?;
        }
        self.tail = Some(Term::Call(name, args));
        Ok(self)
    }

    pub fn par(mut self, p1: Process, p2: Process) -> Result<Self> {
        self.ensure_open()?;
        self.tail = Some(Term::Par(Box::new(p1.term()), Box::new(p2.term())));
        Ok(self)
    }

    /// Guarded choice. Both operands must start with an input or output
    /// (or be a choice themselves).
    pub fn sum(mut self, p1: Process, p2: Process) -> Result<Self> {
        self.ensure_open()?;
        let (p1, p2) = (p1.into_choice_operand()?, p2.into_choice_operand()?);
        self.steps.push(Step::Coerce);
        self.tail = Some(Term::Sum(Box::new(p1), Box::new(p2)));
        Ok(self)
    }

    /// Continues this process with all of `p`.
    pub fn process(mut self, p: Process) -> Result<Self> {
        self.ensure_open()?;
        self.steps.extend(p.steps);
        self.tail = p.tail;
        Ok(self)
    }

    fn into_choice_operand(mut self) -> Result<Term> {
        if !matches!(self.steps.first(), Some(Step::Coerce)) {
            return Err(Error::term(format!(
                "choice operand '{}' must start with an input or an output",
                self.term()
            )));
        }
        self.steps.remove(0);
        Ok(self.term())
    }

    pub fn term(&self) -> Term {
        let end = self.tail.clone().unwrap_or(Term::Null);
        self.steps.iter().rev().fold(end, |p, step| {
            let p = Box::new(p);
            match step {
                Step::Coerce => Term::Coerce(p),
                Step::Out(x, y) => Term::Out(x.clone(), y.clone(), p),
                Step::In(x, y) => Term::In(x.clone(), y.clone(), p),
                Step::Restrict(y) => Term::Restrict(y.clone(), p),
            }
        })
    }

    pub fn free_names(&self) -> Vec<Name> {
        self.term().free_names().into_iter().collect()
    }
}

impl BitOr for Process {
    type Output = Process;

    fn bitor(self, rhs: Process) -> Process {
        Process {
            steps: Vec::new(),
            tail: Some(Term::Par(Box::new(self.term()), Box::new(rhs.term()))),
        }
    }
}

impl Add for Process {
    type Output = Result<Process>;

    fn add(self, rhs: Process) -> Result<Process> {
        Process::new().sum(self, rhs)
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.term())
    }
}

/// Splits a whitespace separated list into names: `names("x y z")`.
pub fn names(text: &str) -> Vec<Name> {
    text.split_whitespace().map(Name::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_coerced() {
        let p = Process::new().restrict("y").unwrap().output("x", "y").unwrap();
        let expected = Term::Restrict(
            "y".into(),
            Box::new(Term::Coerce(Box::new(Term::Out(
                "x".into(),
                "y".into(),
                Box::new(Term::Null),
            )))),
        );
        assert_eq!(p.term(), expected);
        assert_eq!(p.to_string(), "new(y).out(x, y).0");
    }

    #[test]
    fn nothing_follows_a_terminal_construct() {
        let p = Process::new().call("A", names("x")).unwrap();
        assert!(matches!(p.clone().output("x", "y"), Err(Error::Term(_))));
        assert!(matches!(
            p.clone().par(Process::new(), Process::new()),
            Err(Error::Term(_))
        ));
        assert!(matches!(p.call("B", names("x")), Err(Error::Term(_))));
    }

    #[test]
    fn names_are_checked_when_added() {
        assert!(matches!(Process::new().output("_x", "y"), Err(Error::Term(_))));
        assert!(matches!(Process::new().input("x", "_y"), Err(Error::Term(_))));
        assert!(matches!(Process::new().restrict("_y"), Err(Error::Term(_))));
        assert!(matches!(Process::new().call("_A", names("x")), Err(Error::Term(_))));
        assert!(matches!(Process::new().call("A", names("x _y")), Err(Error::Term(_))));
    }

    #[test]
    fn choice_operands_lose_their_coercion() {
        let a = Process::new().input("x", "y").unwrap();
        let b = Process::new().output("x", "z").unwrap();
        let sum = (a + b).unwrap();
        let Term::Coerce(inner) = sum.term() else {
            panic!("a choice starts with a coercion");
        };
        let Term::Sum(left, right) = *inner else {
            panic!("expected a choice");
        };
        assert!(matches!(*left, Term::In(..)));
        assert!(matches!(*right, Term::Out(..)));
    }

    #[test]
    fn choice_operands_must_be_guarded() {
        let a = Process::new().input("x", "y").unwrap();
        let call = Process::new().call("A", names("x")).unwrap();
        assert!(matches!(a.clone() + call, Err(Error::Term(_))));
        assert!(matches!(a + Process::new(), Err(Error::Term(_))));

        let nested = (Process::new().output("a", "b").unwrap()
            + Process::new().output("c", "d").unwrap())
        .unwrap();
        let guarded = Process::new().input("e", "f").unwrap();
        assert!((nested + guarded).is_ok());
    }

    #[test]
    fn processes_concatenate() {
        let tail = Process::new().output("y", "w").unwrap().call("A", names("w")).unwrap();
        let p = Process::new().input("x", "y").unwrap().process(tail).unwrap();
        assert_eq!(p.to_string(), "in(x, y).out(y, w).A(w)");
        let names: Vec<String> = p.free_names().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["w", "x"]);
    }
}
