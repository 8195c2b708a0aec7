//! Structured queries and the query-string parser.
//!
//! A [`Query`] is a tree over the fixed schema. [`parser::QueryParser`]
//! produces one from query text; the searcher evaluates it against a
//! snapshot.

pub mod parser;

use std::fmt;

use crate::schema::SearchField;

pub use parser::QueryParser;

/// How a clause takes part in a boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    /// The clause must match.
    Must,
    /// The clause may match and contributes to the score when it does.
    Should,
    /// The clause must not match.
    MustNot,
}

/// One clause of a boolean query.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub occur: Occur,
    pub query: Query,
}

impl Clause {
    pub fn new(occur: Occur, query: Query) -> Self {
        Clause { occur, query }
    }
}

/// A query over the index schema.
///
/// Terms are already normalized: lower-cased and, for full-text fields,
/// analyzed the way indexed values are.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every live document, constant score.
    MatchAll,
    /// No document.
    MatchNone,
    /// Documents containing `term` in `field`.
    Term { field: SearchField, term: String },
    /// Documents containing a term of `field` that starts with `prefix`,
    /// constant score.
    Prefix { field: SearchField, prefix: String },
    /// Documents containing `terms` at consecutive positions of `field`.
    Phrase { field: SearchField, terms: Vec<String> },
    /// A combination of clauses.
    ///
    /// With at least one `Must` clause, documents must match every `Must`
    /// clause and `Should` clauses only add score. Without, at least one
    /// `Should` clause must match. A query with only `MustNot` clauses
    /// matches every document the clauses do not.
    Boolean(Vec<Clause>),
}

impl Query {
    pub fn term(field: SearchField, term: impl Into<String>) -> Self {
        Query::Term {
            field,
            term: term.into(),
        }
    }

    /// Wrap a query with an occurrence, collapsing the trivial cases.
    pub(crate) fn with_occur(self, occur: Occur) -> Self {
        match occur {
            Occur::Should | Occur::Must => self,
            Occur::MustNot => Query::Boolean(vec![Clause::new(Occur::MustNot, self)]),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::MatchAll => write!(f, "*:*"),
            Query::MatchNone => write!(f, "<none>"),
            Query::Term { field, term } => write!(f, "{field}:{term:?}"),
            Query::Prefix { field, prefix } => write!(f, "{field}:{prefix}*"),
            Query::Phrase { field, terms } => write!(f, "{field}:\"{}\"", terms.join(" ")),
            Query::Boolean(clauses) => {
                write!(f, "(")?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match clause.occur {
                        Occur::Must => write!(f, "+")?,
                        Occur::MustNot => write!(f, "-")?,
                        Occur::Should => {}
                    }
                    write!(f, "{}", clause.query)?;
                }
                write!(f, ")")
            }
        }
    }
}
