//! Query parser for converting query text into a [`Query`].
//!
//! Supported syntax:
//! - Terms: `hello` (searches the default field)
//! - Field terms: `PageTitle:hello`, `URL:"http://a.onion/"`
//! - Phrases: `"hello world"`
//! - Prefixes: `hel*`
//! - Required and prohibited clauses: `+hello -world`
//! - Operators: `AND`, `OR`, `NOT`, with `AND` binding tighter than `OR`
//! - Grouping: `(a OR b) AND c`, `PageTitle:(a b)`
//! - Match all: `*:*` or `*`
//!
//! Clauses without an operator between them are optional (`OR`). A
//! backslash escapes the next character.

use std::iter::Peekable;
use std::str::Chars;
use std::vec::IntoIter;

use crate::error::{OnionIndexError, Result};
use crate::query::{Clause, Occur, Query};
use crate::schema::{FieldType, SearchField};

/// Schema-aware query parser.
#[derive(Debug, Clone)]
pub struct QueryParser {
    default_field: SearchField,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryParser {
    /// Create a parser whose unqualified terms search [`SearchField::DEFAULT`].
    pub fn new() -> Self {
        QueryParser {
            default_field: SearchField::DEFAULT,
        }
    }

    /// Set the field unqualified terms search.
    pub fn with_default_field(mut self, field: SearchField) -> Self {
        self.default_field = field;
        self
    }

    pub fn default_field(&self) -> SearchField {
        self.default_field
    }

    /// Parse query text.
    ///
    /// ```
    /// use onion_index::query::{Query, QueryParser};
    /// use onion_index::schema::SearchField;
    ///
    /// let query = QueryParser::new().parse("World").unwrap();
    /// assert_eq!(query, Query::term(SearchField::PageContent, "world"));
    ///
    /// assert!(QueryParser::new().parse("Missing:term").is_err());
    /// ```
    pub fn parse(&self, query_str: &str) -> Result<Query> {
        let lexemes = Lexer::new(query_str).tokenize()?;
        if lexemes.is_empty() {
            return Err(OnionIndexError::query_syntax("empty query"));
        }

        QueryStringParser {
            lexemes: lexemes.into_iter().peekable(),
        }
        .parse(self.default_field)
        .map_err(|e| e.during(&format!("{query_str:?}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    LParen,
    RParen,
    Plus,
    Minus,
    And,
    Or,
    Not,
    /// `field:(` opening a group searched against `field`.
    FieldGroup(String),
    Term {
        field: Option<String>,
        text: String,
        quoted: bool,
        /// Ended in an unescaped `*`, which is not part of `text`.
        wildcard: bool,
    },
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Lexer {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Lexeme>> {
        let mut lexemes = Vec::new();

        loop {
            self.skip_whitespace();
            let Some(&ch) = self.chars.peek() else {
                break;
            };

            let lexeme = match ch {
                '(' => {
                    self.chars.next();
                    Lexeme::LParen
                }
                ')' => {
                    self.chars.next();
                    Lexeme::RParen
                }
                '+' => {
                    self.chars.next();
                    Lexeme::Plus
                }
                '-' => {
                    self.chars.next();
                    Lexeme::Minus
                }
                '"' => Lexeme::Term {
                    field: None,
                    text: self.quoted()?,
                    quoted: true,
                    wildcard: false,
                },
                _ => self.word()?,
            };
            lexemes.push(lexeme);
        }

        Ok(lexemes)
    }

    fn word(&mut self) -> Result<Lexeme> {
        let mut field = None;
        let mut text = String::new();
        let mut escaped = false;
        let mut wildcard = false;

        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | '"') {
                break;
            }
            self.chars.next();

            match ch {
                '\\' => {
                    let next = self.chars.next().ok_or_else(|| {
                        OnionIndexError::query_syntax("escape character at end of query")
                    })?;
                    text.push(next);
                    escaped = true;
                    wildcard = false;
                }
                ':' if field.is_none() && !text.is_empty() => {
                    field = Some(std::mem::take(&mut text));
                    wildcard = false;
                }
                '*' => {
                    text.push(ch);
                    wildcard = true;
                }
                _ => {
                    text.push(ch);
                    wildcard = false;
                }
            }
        }

        if wildcard {
            text.pop();
        }

        if let Some(name) = field {
            if text.is_empty() && !wildcard {
                return match self.chars.peek() {
                    Some('"') => Ok(Lexeme::Term {
                        field: Some(name),
                        text: self.quoted()?,
                        quoted: true,
                        wildcard: false,
                    }),
                    Some('(') => {
                        self.chars.next();
                        Ok(Lexeme::FieldGroup(name))
                    }
                    _ => Err(OnionIndexError::query_syntax(format!(
                        "missing value for field {name}"
                    ))),
                };
            }
            return Ok(Lexeme::Term {
                field: Some(name),
                text,
                quoted: false,
                wildcard,
            });
        }

        if !escaped && !wildcard {
            match text.as_str() {
                "AND" | "&&" => return Ok(Lexeme::And),
                "OR" | "||" => return Ok(Lexeme::Or),
                "NOT" => return Ok(Lexeme::Not),
                _ => {}
            }
        }

        Ok(Lexeme::Term {
            field: None,
            text,
            quoted: false,
            wildcard,
        })
    }

    fn quoted(&mut self) -> Result<String> {
        self.chars.next();
        let mut text = String::new();

        loop {
            match self.chars.next() {
                Some('"') => return Ok(text),
                Some('\\') => match self.chars.next() {
                    Some(ch) => text.push(ch),
                    None => break,
                },
                Some(ch) => text.push(ch),
                None => break,
            }
        }

        Err(OnionIndexError::query_syntax("unterminated quote"))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }
}

/// Recursive descent over lexemes:
///
/// ```text
/// query   := or EOF
/// or      := and ((OR)? and)*
/// and     := unary (AND unary)*
/// unary   := ('+' | '-' | NOT)? primary
/// primary := '(' or ')' | FIELD '(' or ')' | TERM
/// ```
struct QueryStringParser {
    lexemes: Peekable<IntoIter<Lexeme>>,
}

impl QueryStringParser {
    fn parse(mut self, default_field: SearchField) -> Result<Query> {
        let query = self.parse_or_expression(default_field)?;
        match self.lexemes.next() {
            None => Ok(query),
            Some(Lexeme::RParen) => Err(OnionIndexError::query_syntax("unbalanced ')'")),
            Some(other) => Err(OnionIndexError::query_syntax(format!(
                "unexpected {other:?}"
            ))),
        }
    }

    fn at_group_end(&mut self) -> bool {
        matches!(self.lexemes.peek(), None | Some(Lexeme::RParen))
    }

    fn parse_or_expression(&mut self, field: SearchField) -> Result<Query> {
        let mut clauses = vec![self.parse_and_expression(field)?];

        while !self.at_group_end() {
            if self.lexemes.peek() == Some(&Lexeme::Or) {
                self.lexemes.next();
                if self.at_group_end() {
                    return Err(OnionIndexError::query_syntax("OR without right operand"));
                }
            }
            clauses.push(self.parse_and_expression(field)?);
        }

        if clauses.len() == 1 {
            let clause = clauses.remove(0);
            return Ok(clause.query.with_occur(clause.occur));
        }
        Ok(Query::Boolean(clauses))
    }

    fn parse_and_expression(&mut self, field: SearchField) -> Result<Clause> {
        let first = self.parse_unary(field)?;
        if self.lexemes.peek() != Some(&Lexeme::And) {
            return Ok(first);
        }

        let mut clauses = vec![required(first)];
        while self.lexemes.peek() == Some(&Lexeme::And) {
            self.lexemes.next();
            if self.at_group_end()
                || matches!(self.lexemes.peek(), Some(Lexeme::And | Lexeme::Or))
            {
                return Err(OnionIndexError::query_syntax("AND without right operand"));
            }
            clauses.push(required(self.parse_unary(field)?));
        }

        Ok(Clause::new(Occur::Should, Query::Boolean(clauses)))
    }

    fn parse_unary(&mut self, field: SearchField) -> Result<Clause> {
        let occur = match self.lexemes.peek() {
            Some(Lexeme::Plus) => Occur::Must,
            Some(Lexeme::Minus | Lexeme::Not) => Occur::MustNot,
            _ => Occur::Should,
        };
        if occur != Occur::Should {
            self.lexemes.next();
        }

        Ok(Clause::new(occur, self.parse_primary(field)?))
    }

    fn parse_primary(&mut self, field: SearchField) -> Result<Query> {
        match self.lexemes.next() {
            None => Err(OnionIndexError::query_syntax("unexpected end of query")),
            Some(Lexeme::LParen) => self.parse_group(field),
            Some(Lexeme::FieldGroup(name)) => {
                let field = resolve_field(&name)?;
                self.parse_group(field)
            }
            Some(Lexeme::Term {
                field: name,
                text,
                quoted,
                wildcard,
            }) => term_query(field, name.as_deref(), &text, quoted, wildcard),
            Some(Lexeme::RParen) => Err(OnionIndexError::query_syntax("unexpected ')'")),
            Some(Lexeme::And | Lexeme::Or) => Err(OnionIndexError::query_syntax(
                "operator without left operand",
            )),
            Some(Lexeme::Plus | Lexeme::Minus | Lexeme::Not) => {
                Err(OnionIndexError::query_syntax("repeated operator"))
            }
        }
    }

    fn parse_group(&mut self, field: SearchField) -> Result<Query> {
        let query = self.parse_or_expression(field)?;
        match self.lexemes.next() {
            Some(Lexeme::RParen) => Ok(query),
            _ => Err(OnionIndexError::query_syntax("missing ')'")),
        }
    }
}

fn required(clause: Clause) -> Clause {
    match clause.occur {
        Occur::Should => Clause::new(Occur::Must, clause.query),
        _ => clause,
    }
}

fn resolve_field(name: &str) -> Result<SearchField> {
    SearchField::from_name(name)
        .ok_or_else(|| OnionIndexError::query_syntax(format!("unknown field {name}")))
}

fn term_query(
    default_field: SearchField,
    field_name: Option<&str>,
    text: &str,
    quoted: bool,
    wildcard: bool,
) -> Result<Query> {
    if field_name == Some("*") {
        return if wildcard && text.is_empty() {
            Ok(Query::MatchAll)
        } else {
            Err(OnionIndexError::query_syntax("field * only supports *:*"))
        };
    }
    if field_name.is_none() && wildcard && text.is_empty() {
        return Ok(Query::MatchAll);
    }

    let field = match field_name {
        Some(name) => resolve_field(name)?,
        None => default_field,
    };

    if wildcard {
        if field.field_type() == FieldType::Integer {
            return Err(OnionIndexError::query_syntax(format!(
                "prefix query on integer field {field}"
            )));
        }
        return Ok(Query::Prefix {
            field,
            prefix: text.to_lowercase(),
        });
    }

    match field.field_type() {
        FieldType::ExactString => Ok(Query::term(field, text.to_lowercase())),
        FieldType::Integer => text
            .trim()
            .parse::<i64>()
            .map(|number| Query::term(field, number.to_string()))
            .map_err(|_| {
                OnionIndexError::query_syntax(format!(
                    "{text:?} is not an integer value for field {field}"
                ))
            }),
        FieldType::FullText => {
            let mut terms = match field.field_type().analyzer() {
                Some(analyzer) => analyzer.terms(text),
                None => Vec::new(),
            };
            match terms.len() {
                0 => Ok(Query::MatchNone),
                1 => Ok(Query::term(field, terms.remove(0))),
                _ if quoted => Ok(Query::Phrase { field, terms }),
                _ => Ok(Query::Boolean(
                    terms
                        .into_iter()
                        .map(|term| Clause::new(Occur::Must, Query::term(field, term)))
                        .collect(),
                )),
            }
        }
    }
}
