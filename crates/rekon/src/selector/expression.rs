//! Selector expressions: `<key> <OPERATOR> (<v1>, <v2>, ...)`.
//!
//! Keys: `kind`, `apiVersion`, `metadata.name`, `metadata.labels.<k>`,
//! `metadata.annotations.<k>`. Any other key (including dotted ones such as
//! `app.kubernetes.io/name`) is read as a label key. `key=value` and
//! `key!=value` are shorthands for label `IN` and `NOTIN`.

use regex::Regex;

use super::{Selectable, Selector};
use crate::error::SelectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorKey {
    Kind,
    ApiVersion,
    Name,
    Label(String),
    Annotation(String),
}

impl SelectorKey {
    fn parse(raw: &str, expression: &str) -> Result<Self, SelectorError> {
        let syntax = |reason: &str| SelectorError::Syntax {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };
        match raw {
            "" => Err(syntax("missing key")),
            "kind" => Ok(SelectorKey::Kind),
            "apiVersion" => Ok(SelectorKey::ApiVersion),
            "metadata.name" => Ok(SelectorKey::Name),
            _ => {
                if let Some(label) = raw.strip_prefix("metadata.labels.") {
                    if label.is_empty() {
                        return Err(syntax("missing label key"));
                    }
                    Ok(SelectorKey::Label(label.to_string()))
                } else if let Some(annotation) = raw.strip_prefix("metadata.annotations.") {
                    if annotation.is_empty() {
                        return Err(syntax("missing annotation key"));
                    }
                    Ok(SelectorKey::Annotation(annotation.to_string()))
                } else if raw.starts_with("metadata.") {
                    Err(syntax(&format!("unsupported metadata key '{}'", raw)))
                } else {
                    Ok(SelectorKey::Label(raw.to_string()))
                }
            }
        }
    }

    fn extract(&self, item: &dyn Selectable) -> Option<String> {
        match self {
            SelectorKey::Kind => Some(item.kind().to_string()),
            SelectorKey::ApiVersion => Some(item.api_version()),
            SelectorKey::Name => Some(item.metadata().name.clone()),
            SelectorKey::Label(key) => item.metadata().labels.get(key).cloned(),
            SelectorKey::Annotation(key) => item.metadata().annotations.get(key).cloned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    Matches,
    DoesNotMatch,
}

impl SelectorOperator {
    fn takes_values(&self) -> bool {
        !matches!(self, SelectorOperator::Exists | SelectorOperator::DoesNotExist)
    }
}

impl std::str::FromStr for SelectorOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IN" => Ok(SelectorOperator::In),
            "NOTIN" => Ok(SelectorOperator::NotIn),
            "EXISTS" => Ok(SelectorOperator::Exists),
            "DOESNOTEXIST" => Ok(SelectorOperator::DoesNotExist),
            "MATCHES" => Ok(SelectorOperator::Matches),
            "DOESNOTMATCH" => Ok(SelectorOperator::DoesNotMatch),
            _ => Err(format!("unknown operator '{}'", s)),
        }
    }
}

/// A single parsed selector expression.
#[derive(Debug, Clone)]
pub struct ExpressionSelector {
    expression: String,
    key: SelectorKey,
    operator: SelectorOperator,
    values: Vec<String>,
    patterns: Vec<Regex>,
}

impl ExpressionSelector {
    pub fn parse(expression: &str) -> Result<Self, SelectorError> {
        let trimmed = expression.trim();
        let syntax = |reason: String| SelectorError::Syntax {
            expression: expression.to_string(),
            reason,
        };
        if trimmed.is_empty() {
            return Err(syntax("empty expression".to_string()));
        }

        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };

        // `=` ahead of any value list means `key=value`, with or without spaces.
        let shorthand = match (trimmed.find('='), trimmed.find('(')) {
            (Some(eq), Some(paren)) => eq < paren,
            (Some(_), None) => true,
            _ => false,
        };
        if shorthand || rest.is_empty() {
            return Self::parse_shorthand(trimmed, expression);
        }

        let key = SelectorKey::parse(head, expression)?;
        let (op_token, remainder) = match rest.split_once(|c: char| c.is_whitespace() || c == '(') {
            Some((op, _)) => (op, rest[op.len()..].trim()),
            None => (rest, ""),
        };
        let operator = op_token.parse::<SelectorOperator>().map_err(syntax)?;

        let values = if operator.takes_values() {
            let inner = remainder
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| syntax(format!("expected '(...)' after {}", op_token)))?;
            let values: Vec<String> = split_values(inner)
                .into_iter()
                .map(|v| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
                .filter(|v| !v.is_empty())
                .collect();
            if values.is_empty() {
                return Err(syntax(format!("{} requires at least one value", op_token)));
            }
            values
        } else {
            if !remainder.is_empty() {
                return Err(syntax(format!("{} takes no values", op_token)));
            }
            Vec::new()
        };

        Self::build(expression, key, operator, values)
    }

    fn parse_shorthand(trimmed: &str, expression: &str) -> Result<Self, SelectorError> {
        let (key, operator, value) = if let Some((k, v)) = trimmed.split_once("!=") {
            (k, SelectorOperator::NotIn, v)
        } else if let Some((k, v)) = trimmed.split_once("==") {
            (k, SelectorOperator::In, v)
        } else if let Some((k, v)) = trimmed.split_once('=') {
            (k, SelectorOperator::In, v)
        } else {
            return Err(SelectorError::Syntax {
                expression: expression.to_string(),
                reason: "missing operator".to_string(),
            });
        };
        let key = SelectorKey::parse(key.trim(), expression)?;
        Self::build(expression, key, operator, vec![value.trim().to_string()])
    }

    fn build(
        expression: &str,
        key: SelectorKey,
        operator: SelectorOperator,
        values: Vec<String>,
    ) -> Result<Self, SelectorError> {
        let patterns = match operator {
            SelectorOperator::Matches | SelectorOperator::DoesNotMatch => values
                .iter()
                .map(|p| {
                    Regex::new(&format!("^(?:{})$", p)).map_err(|e| SelectorError::InvalidPattern {
                        pattern: p.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };
        Ok(Self {
            expression: expression.trim().to_string(),
            key,
            operator,
            values,
            patterns,
        })
    }

    pub fn key(&self) -> &SelectorKey {
        &self.key
    }

    pub fn operator(&self) -> SelectorOperator {
        self.operator
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Splits a value list on commas outside brackets, braces, parentheses and
/// quotes, so `a{1,3}` or `[,;]` stay one value.
fn split_values(inner: &str) -> Vec<&str> {
    let mut values = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut in_class = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            _ if quote.is_some() => {
                if Some(c) == quote {
                    quote = None;
                }
            }
            ']' if in_class => in_class = false,
            _ if in_class => {}
            '"' | '\'' => quote = Some(c),
            '[' => in_class = true,
            '(' | '{' => depth += 1,
            ')' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                values.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    values.push(&inner[start..]);
    values
}

impl std::str::FromStr for ExpressionSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Selector for ExpressionSelector {
    fn matches(&self, item: &dyn Selectable) -> bool {
        let value = self.key.extract(item);
        match (self.operator, value) {
            (SelectorOperator::Exists, value) => value.is_some(),
            (SelectorOperator::DoesNotExist, value) => value.is_none(),
            (_, None) => false,
            (SelectorOperator::In, Some(v)) => self.values.iter().any(|x| *x == v),
            (SelectorOperator::NotIn, Some(v)) => !self.values.iter().any(|x| *x == v),
            (SelectorOperator::Matches, Some(v)) => self.patterns.iter().any(|p| p.is_match(&v)),
            (SelectorOperator::DoesNotMatch, Some(v)) => {
                !self.patterns.iter().any(|p| p.is_match(&v))
            }
        }
    }
}
