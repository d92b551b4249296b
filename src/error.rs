use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Sequential composition found no input port for an output of the
    /// continuation, or the encoded term has more than one entry point.
    #[error("Compose error: {0}")]
    Compose(String),

    /// Invalid process construction: appending after a terminal prefix,
    /// a malformed choice operand or a call with the wrong arity.
    #[error("Term error: {0}")]
    Term(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid rule: {0}")]
    Rule(String),

    #[error("Rule '{rule}' still applies after {steps} rewrite steps")]
    Divergence { rule: String, steps: usize },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn term(message: impl Into<String>) -> Self {
        Error::Term(message.into())
    }

    pub(crate) fn compose(message: impl Into<String>) -> Self {
        Error::Compose(message.into())
    }
}
