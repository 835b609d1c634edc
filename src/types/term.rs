use serde::{Deserialize, Serialize};

/// Structured term tree exchanged with the reasoning engine.
///
/// The marshaling layer treats terms as opaque shapes: literals carry a raw
/// payload with no type tag, ordered sequences may appear as literal lists,
/// and everything else is a functor application. Variables occur only in
/// expression-evaluation traffic and never decode to a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// Explicit null term (absent nullable value)
    Null,
    Literal(Literal),
    /// Literal-list term for naturally ordered sequences
    List(Vec<Term>),
    Application { functor: String, args: Vec<Term> },
    Variable(String),
}

/// Raw literal payload, untagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
}

impl Term {
    pub fn application<S: Into<String>>(functor: S, args: Vec<Term>) -> Self {
        Term::Application {
            functor: functor.into(),
            args,
        }
    }

    pub fn string<S: Into<String>>(s: S) -> Self {
        Term::Literal(Literal::Str(s.into()))
    }

    /// Short shape label used in decode error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Term::Null => "null",
            Term::Literal(_) => "literal",
            Term::List(_) => "list",
            Term::Application { .. } => "application",
            Term::Variable(_) => "variable",
        }
    }
}
