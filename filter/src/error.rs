use std::error::Error as StdError;
use std::fmt;

use tracing_error::SpanTrace;

/// Categorizes filter syntax errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterErrorKind {
    /// A filter component did not start with `(`.
    MissingOpenParen,

    /// A filter component was not closed with `)`.
    MissingCloseParen,

    /// The input ended in the middle of a filter component.
    UnexpectedEnd,

    /// An `&` or `|` component contained no operands.
    EmptyFilterList,

    /// A comparison had no attribute name before the operator.
    MissingAttribute,

    /// The comparison operator was not one of `=`, `~=`, `>=` or `<=`.
    InvalidOperator,

    /// A value contained an unescaped `(`.
    InvalidValue,

    /// A backslash escape was not followed by a character.
    InvalidEscape,

    /// Input remained after the outermost component was closed.
    TrailingInput,

    /// Components were nested deeper than [`MAX_DEPTH`](crate::MAX_DEPTH).
    TooDeep,
}

impl fmt::Display for FilterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterErrorKind::MissingOpenParen => write!(f, "expected '('"),
            FilterErrorKind::MissingCloseParen => write!(f, "expected ')'"),
            FilterErrorKind::UnexpectedEnd => write!(f, "unexpected end of filter"),
            FilterErrorKind::EmptyFilterList => write!(f, "empty filter list"),
            FilterErrorKind::MissingAttribute => write!(f, "missing attribute name"),
            FilterErrorKind::InvalidOperator => write!(f, "invalid comparison operator"),
            FilterErrorKind::InvalidValue => write!(f, "unescaped '(' in value"),
            FilterErrorKind::InvalidEscape => write!(f, "dangling escape"),
            FilterErrorKind::TrailingInput => write!(f, "unexpected trailing input"),
            FilterErrorKind::TooDeep => write!(f, "filter nested too deeply"),
        }
    }
}

/// A filter string could not be parsed.
///
/// Carries the offending input and the byte offset where parsing stopped,
/// along with the span trace active when the error was raised.
#[derive(Debug)]
pub struct FilterError {
    kind: FilterErrorKind,
    input: String,
    position: usize,
    span_trace: Box<SpanTrace>,
}

impl FilterError {
    pub(crate) fn new(kind: FilterErrorKind, input: &str, position: usize) -> Self {
        Self {
            kind,
            input: input.to_owned(),
            position,
            span_trace: Box::new(SpanTrace::capture()),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> FilterErrorKind {
        self.kind
    }

    /// Returns the filter text which failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns the byte offset into the input where parsing failed.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the span trace captured when the error was created.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid filter [{}] at offset {}: {:?}",
            self.kind, self.position, self.input
        )
    }
}

impl StdError for FilterError {}
