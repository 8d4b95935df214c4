//! Build tags and evaluation of visibility conditional expressions.
//!
//! Grammar: `expr := or`, `or := and ("or" and)*`, `and := not ("and" not)*`,
//! `not := "not" not | atom`, `atom := NAME | "(" expr ")"`.

use std::collections::BTreeSet;

use crate::error::Error;

/// The active build tag set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    /// Active tag names.
    active: BTreeSet<String>,
}

/// Recursive-descent evaluator over a token list.
struct Evaluator<'a> {
    /// Position of the next token.
    pos: usize,
    /// Tags the names are checked against.
    tags: &'a Tags,
    /// Tokenized expression.
    tokens: Vec<&'a str>,
}

impl Tags {
    /// Whether a tag is active.
    pub fn contains(&self, tag: &str) -> bool {
        return self.active.contains(tag);
    }

    /// Evaluate a conditional expression against the active tags.
    ///
    /// # Errors
    ///
    /// Returns `Error::TagExpression` if the expression is malformed.
    pub fn eval_condition(&self, expr: &str) -> Result<bool, Error> {
        let tokens = tokenize(expr);
        if tokens.is_empty() {
            return Err(expression_error(expr, "empty expression"));
        }
        let mut evaluator = Evaluator { pos: 0, tags: self, tokens };
        let value = evaluator.or_expr().map_err(|reason| return expression_error(expr, reason))?;
        if let Some(extra) = evaluator.peek() {
            return Err(expression_error(expr, &format!("unexpected token `{extra}`")));
        }
        return Ok(value);
    }

    /// Build a tag set from names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        return Self {
            active: names.into_iter().map(Into::into).collect(),
        };
    }
}

impl<'a> Evaluator<'a> {
    /// `and := not ("and" not)*`
    fn and_expr(&mut self) -> Result<bool, &'static str> {
        let mut value = self.not_expr()?;
        while self.peek() == Some("and") {
            self.pos = self.pos.saturating_add(1);
            let rhs = self.not_expr()?;
            value = value && rhs;
        }
        return Ok(value);
    }

    /// `atom := NAME | "(" expr ")"`
    fn atom(&mut self) -> Result<bool, &'static str> {
        let Some(token) = self.next() else {
            return Err("unexpected end of expression");
        };
        return match token {
            "(" => {
                let value = self.or_expr()?;
                if self.next() != Some(")") {
                    return Err("missing closing parenthesis");
                }
                Ok(value)
            },
            ")" | "and" | "or" | "not" => Err("expected a tag name"),
            name => Ok(self.tags.contains(name)),
        };
    }

    /// Consume and return the next token.
    fn next(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos = self.pos.saturating_add(1);
        }
        return token;
    }

    /// `not := "not" not | atom`
    fn not_expr(&mut self) -> Result<bool, &'static str> {
        if self.peek() == Some("not") {
            self.pos = self.pos.saturating_add(1);
            return Ok(!self.not_expr()?);
        }
        return self.atom();
    }

    /// `or := and ("or" and)*`
    fn or_expr(&mut self) -> Result<bool, &'static str> {
        let mut value = self.and_expr()?;
        while self.peek() == Some("or") {
            self.pos = self.pos.saturating_add(1);
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        return Ok(value);
    }

    /// The next token without consuming it.
    fn peek(&self) -> Option<&'a str> {
        return self.tokens.get(self.pos).copied();
    }
}

/// Build an expression error.
fn expression_error(expr: &str, reason: &str) -> Error {
    return Error::TagExpression {
        expr: expr.to_string(),
        reason: reason.to_string(),
    };
}

/// Split an expression into names, keywords, and parentheses.
fn tokenize(expr: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, ch) in expr.char_indices() {
        let is_name_char = !ch.is_whitespace() && ch != '(' && ch != ')';
        if is_name_char {
            start.get_or_insert(idx);
            continue;
        }
        if let Some(begin) = start.take() {
            tokens.extend(expr.get(begin..idx));
        }
        if ch == '(' || ch == ')' {
            tokens.extend(expr.get(idx..idx.saturating_add(1)));
        }
    }
    if let Some(begin) = start {
        tokens.extend(expr.get(begin..));
    }
    return tokens;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_boolean_operators() {
        let tags = Tags::new(["html", "draft"]);
        assert!(tags.eval_condition("html").unwrap());
        assert!(!tags.eval_condition("latex").unwrap());
        assert!(tags.eval_condition("html and not latex").unwrap());
        assert!(tags.eval_condition("latex or draft").unwrap());
        assert!(!tags.eval_condition("not (html or latex)").unwrap());
        assert!(tags.eval_condition("(html)and(draft)").unwrap());
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let tags = Tags::new(["a"]);
        assert!(tags.eval_condition("a or b and c").unwrap());
        assert!(!tags.eval_condition("(a or b) and c").unwrap());
    }

    #[test]
    fn malformed_expressions_are_errors() {
        let tags = Tags::default();
        assert!(tags.eval_condition("").is_err());
        assert!(tags.eval_condition("html and").is_err());
        assert!(tags.eval_condition("(html").is_err());
        assert!(tags.eval_condition("html latex").is_err());
    }
}
