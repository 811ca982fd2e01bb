use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;
use crate::value::{Properties, PropertyValue};

/// Comparison operator of a simple filter item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Equal,

    /// `~=`: equality ignoring case and whitespace for strings.
    Approx,

    /// `>=`
    GreaterEq,

    /// `<=`
    LessEq,
}

impl Operator {
    fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::Approx => "~=",
            Operator::GreaterEq => ">=",
            Operator::LessEq => "<=",
        }
    }
}

/// The pieces of a substring pattern such as `ab*cd*ef`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Substring {
    /// Text the value must start with.
    pub initial: Option<String>,

    /// Text which must appear, in order, between the initial and final parts.
    pub any: Vec<String>,

    /// Text the value must end with.
    pub last: Option<String>,
}

impl Substring {
    fn matches(&self, value: &str) -> bool {
        let mut rest = value;

        if let Some(initial) = &self.initial {
            match rest.strip_prefix(initial.as_str()) {
                Some(r) => rest = r,
                None => return false,
            }
        }

        if let Some(last) = &self.last {
            match rest.strip_suffix(last.as_str()) {
                Some(r) => rest = r,
                None => return false,
            }
        }

        for part in &self.any {
            match rest.find(part.as_str()) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }

        true
    }
}

/// A parsed RFC 1960 filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    /// `(&(a)(b)...)`: every operand matches.
    And(Vec<Filter>),

    /// `(|(a)(b)...)`: at least one operand matches.
    Or(Vec<Filter>),

    /// `(!(a))`: the operand does not match.
    Not(Box<Filter>),

    /// `(attr op value)`
    Compare {
        /// Attribute name.
        attribute: String,
        /// Comparison operator.
        operator: Operator,
        /// Unescaped comparison value.
        value: String,
    },

    /// `(attr=*)`: the attribute is present.
    Present {
        /// Attribute name.
        attribute: String,
    },

    /// `(attr=a*b*c)`
    Substring {
        /// Attribute name.
        attribute: String,
        /// The substring pattern.
        pattern: Substring,
    },
}

impl Filter {
    /// Parse a filter string.
    #[tracing::instrument(level = "trace")]
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        crate::parse::parse(input)
    }

    /// Evaluate the filter against a set of properties.
    pub fn matches(&self, properties: &Properties) -> bool {
        match self {
            Filter::And(operands) => operands.iter().all(|f| f.matches(properties)),
            Filter::Or(operands) => operands.iter().any(|f| f.matches(properties)),
            Filter::Not(operand) => !operand.matches(properties),
            Filter::Present { attribute } => properties.contains_key(attribute),
            Filter::Compare {
                attribute,
                operator,
                value,
            } => properties
                .get(attribute)
                .is_some_and(|property| compare(property, *operator, value)),
            Filter::Substring { attribute, pattern } => properties
                .get(attribute)
                .is_some_and(|property| substring(property, pattern)),
        }
    }
}

fn compare(property: &PropertyValue, operator: Operator, value: &str) -> bool {
    match property {
        PropertyValue::String(s) => match operator {
            Operator::Equal => s == value,
            Operator::Approx => normalize(s) == normalize(value),
            Operator::GreaterEq => s.as_str() >= value,
            Operator::LessEq => s.as_str() <= value,
        },
        PropertyValue::Long(n) => match value.trim().parse::<i64>() {
            Ok(v) => ordered(n, &v, operator),
            Err(_) => false,
        },
        PropertyValue::Double(n) => match value.trim().parse::<f64>() {
            Ok(v) => ordered(n, &v, operator),
            Err(_) => false,
        },
        PropertyValue::Boolean(b) => {
            let value = value.trim();
            if value.eq_ignore_ascii_case("true") {
                *b
            } else if value.eq_ignore_ascii_case("false") {
                !*b
            } else {
                false
            }
        }
        PropertyValue::List(items) => items.iter().any(|item| compare(item, operator, value)),
    }
}

fn ordered<T: PartialOrd>(lhs: &T, rhs: &T, operator: Operator) -> bool {
    match operator {
        Operator::Equal | Operator::Approx => lhs == rhs,
        Operator::GreaterEq => lhs >= rhs,
        Operator::LessEq => lhs <= rhs,
    }
}

fn substring(property: &PropertyValue, pattern: &Substring) -> bool {
    match property {
        PropertyValue::String(s) => pattern.matches(s),
        PropertyValue::List(items) => items.iter().any(|item| substring(item, pattern)),
        _ => false,
    }
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for Filter {
    type Err = FilterError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            if matches!(c, '\\' | '*' | '(' | ')') {
                write!(f, "\\")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(operands) => {
                write!(f, "(&")?;
                for operand in operands {
                    operand.fmt(f)?;
                }
                write!(f, ")")
            }
            Filter::Or(operands) => {
                write!(f, "(|")?;
                for operand in operands {
                    operand.fmt(f)?;
                }
                write!(f, ")")
            }
            Filter::Not(operand) => write!(f, "(!{operand})"),
            Filter::Compare {
                attribute,
                operator,
                value,
            } => write!(f, "({attribute}{}{})", operator.symbol(), Escaped(value)),
            Filter::Present { attribute } => write!(f, "({attribute}=*)"),
            Filter::Substring { attribute, pattern } => {
                write!(f, "({attribute}=")?;
                if let Some(initial) = &pattern.initial {
                    Escaped(initial).fmt(f)?;
                }
                write!(f, "*")?;
                for part in &pattern.any {
                    write!(f, "{}*", Escaped(part))?;
                }
                if let Some(last) = &pattern.last {
                    Escaped(last).fmt(f)?;
                }
                write!(f, ")")
            }
        }
    }
}
