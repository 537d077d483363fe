//! Builder for the vendor's `$filter` query expression.
//!
//! Expressions render to the vendor's OData-ish text form, e.g.
//! `name eq 'Q1 Spiff' and startDate ge '2024-01-01'`. Use [`Filter::raw`]
//! to pass a prebuilt expression through untouched.

use std::fmt;

/// A `$filter` expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// A single field comparison.
    Compare {
        field: String,
        op: &'static str,
        value: String,
    },
    /// Operands joined by `and` / `or`. Nested groups are parenthesized.
    Group {
        op: &'static str,
        operands: Vec<Filter>,
    },
    /// A literal expression, passed through as-is.
    Raw(String),
}

impl Filter {
    fn compare(field: &str, op: &'static str, value: &str) -> Self {
        Filter::Compare {
            field: field.to_string(),
            op,
            value: value.to_string(),
        }
    }

    pub fn eq(field: &str, value: &str) -> Self {
        Self::compare(field, "eq", value)
    }

    pub fn ne(field: &str, value: &str) -> Self {
        Self::compare(field, "ne", value)
    }

    pub fn gt(field: &str, value: &str) -> Self {
        Self::compare(field, "gt", value)
    }

    pub fn ge(field: &str, value: &str) -> Self {
        Self::compare(field, "ge", value)
    }

    pub fn lt(field: &str, value: &str) -> Self {
        Self::compare(field, "lt", value)
    }

    pub fn le(field: &str, value: &str) -> Self {
        Self::compare(field, "le", value)
    }

    pub fn raw(expr: impl Into<String>) -> Self {
        Filter::Raw(expr.into())
    }

    pub fn and(self, other: Filter) -> Self {
        self.join("and", other)
    }

    pub fn or(self, other: Filter) -> Self {
        self.join("or", other)
    }

    fn join(self, op: &'static str, other: Filter) -> Self {
        match self {
            // Extending a group of the same operator keeps the rendering
            // flat instead of nesting parentheses.
            Filter::Group { op: own, mut operands } if own == op => {
                operands.push(other);
                Filter::Group { op, operands }
            }
            lhs => Filter::Group {
                op,
                operands: vec![lhs, other],
            },
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { field, op, value } => {
                // Single quotes inside values are doubled, the vendor's
                // escape convention.
                write!(f, "{field} {op} '{}'", value.replace('\'', "''"))
            }
            Filter::Group { op, operands } => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {op} ")?;
                    }
                    match operand {
                        Filter::Group { .. } => write!(f, "({operand})")?,
                        _ => write!(f, "{operand}")?,
                    }
                }
                Ok(())
            }
            Filter::Raw(expr) => f.write_str(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_quotes_value() {
        assert_eq!(Filter::eq("name", "Q1 Spiff").to_string(), "name eq 'Q1 Spiff'");
        assert_eq!(Filter::ge("startDate", "2024-01-01").to_string(), "startDate ge '2024-01-01'");
    }

    #[test]
    fn embedded_quote_is_doubled() {
        assert_eq!(Filter::eq("name", "O'Brien").to_string(), "name eq 'O''Brien'");
    }

    #[test]
    fn chained_and_renders_flat() {
        let filter = Filter::eq("calendar", "1")
            .and(Filter::eq("periodType", "2"))
            .and(Filter::ne("name", "ignored"));
        assert_eq!(
            filter.to_string(),
            "calendar eq '1' and periodType eq '2' and name ne 'ignored'",
        );
    }

    #[test]
    fn mixed_groups_are_parenthesized() {
        let filter = Filter::eq("a", "1")
            .or(Filter::eq("b", "2"))
            .and(Filter::eq("c", "3"));
        assert_eq!(filter.to_string(), "(a eq '1' or b eq '2') and c eq '3'");
    }

    #[test]
    fn raw_passes_through() {
        let filter = Filter::raw("name in ('a', 'b')");
        assert_eq!(filter.to_string(), "name in ('a', 'b')");
    }
}
