use crate::error::{FilterError, FilterErrorKind};
use crate::expr::{Filter, Operator, Substring};

/// Deepest nesting of filter components accepted by the parser.
pub const MAX_DEPTH: usize = 256;

pub(crate) fn parse(input: &str) -> Result<Filter, FilterError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
    };
    let filter = parser.filter()?;
    parser.skip_whitespace();
    if parser.pos != input.len() {
        return Err(parser.error(FilterErrorKind::TrailingInput));
    }
    Ok(filter)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, kind: FilterErrorKind) -> FilterError {
        FilterError::new(kind, self.input, self.pos)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn filter(&mut self) -> Result<Filter, FilterError> {
        self.skip_whitespace();
        if self.depth == MAX_DEPTH {
            return Err(self.error(FilterErrorKind::TooDeep));
        }

        self.depth += 1;
        let filter = self.component();
        self.depth -= 1;
        filter
    }

    fn component(&mut self) -> Result<Filter, FilterError> {
        match self.peek() {
            Some('(') => {
                self.bump();
            }
            None => return Err(self.error(FilterErrorKind::UnexpectedEnd)),
            Some(_) => return Err(self.error(FilterErrorKind::MissingOpenParen)),
        }

        self.skip_whitespace();
        let filter = match self.peek() {
            Some('&') => {
                self.bump();
                Filter::And(self.filter_list()?)
            }
            Some('|') => {
                self.bump();
                Filter::Or(self.filter_list()?)
            }
            Some('!') => {
                self.bump();
                Filter::Not(Box::new(self.filter()?))
            }
            None => return Err(self.error(FilterErrorKind::UnexpectedEnd)),
            Some(_) => self.item()?,
        };

        self.skip_whitespace();
        match self.peek() {
            Some(')') => {
                self.bump();
                Ok(filter)
            }
            _ => Err(self.error(FilterErrorKind::MissingCloseParen)),
        }
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut operands = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('(') {
                break;
            }
            operands.push(self.filter()?);
        }

        if operands.is_empty() {
            return Err(self.error(FilterErrorKind::EmptyFilterList));
        }
        Ok(operands)
    }

    fn item(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.bump();
        }

        let attribute = self.input[start..self.pos].trim();
        if attribute.is_empty() {
            return Err(FilterError::new(
                FilterErrorKind::MissingAttribute,
                self.input,
                start,
            ));
        }
        let attribute = attribute.to_owned();

        let operator = self.operator()?;

        // Unescaped '*' only splits the value for plain equality.
        let mut segments = vec![String::new()];
        loop {
            match self.peek() {
                None => return Err(self.error(FilterErrorKind::UnexpectedEnd)),
                Some(')') => break,
                Some('(') => return Err(self.error(FilterErrorKind::InvalidValue)),
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some(c) => push(&mut segments, c),
                        None => return Err(self.error(FilterErrorKind::InvalidEscape)),
                    }
                }
                Some('*') if operator == Operator::Equal => {
                    self.bump();
                    segments.push(String::new());
                }
                Some(c) => {
                    self.bump();
                    push(&mut segments, c);
                }
            }
        }

        Ok(build(attribute, operator, segments))
    }

    fn operator(&mut self) -> Result<Operator, FilterError> {
        let start = self.pos;
        let operator = match self.bump() {
            Some('=') => return Ok(Operator::Equal),
            Some('~') => Operator::Approx,
            Some('>') => Operator::GreaterEq,
            Some('<') => Operator::LessEq,
            None => return Err(self.error(FilterErrorKind::UnexpectedEnd)),
            Some(_) => {
                return Err(FilterError::new(
                    FilterErrorKind::InvalidOperator,
                    self.input,
                    start,
                ))
            }
        };

        match self.bump() {
            Some('=') => Ok(operator),
            _ => Err(FilterError::new(
                FilterErrorKind::InvalidOperator,
                self.input,
                start,
            )),
        }
    }
}

fn push(segments: &mut [String], c: char) {
    if let Some(last) = segments.last_mut() {
        last.push(c);
    }
}

fn build(attribute: String, operator: Operator, mut segments: Vec<String>) -> Filter {
    if segments.len() == 1 {
        return Filter::Compare {
            attribute,
            operator,
            value: segments.pop().unwrap_or_default(),
        };
    }

    if segments.len() == 2 && segments.iter().all(String::is_empty) {
        return Filter::Present { attribute };
    }

    let last = segments.pop().filter(|s| !s.is_empty());
    let mut segments = segments.into_iter();
    let initial = segments.next().filter(|s| !s.is_empty());
    let any = segments.filter(|s| !s.is_empty()).collect();

    Filter::Substring {
        attribute,
        pattern: Substring { initial, any, last },
    }
}
