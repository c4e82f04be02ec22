// ABOUTME: Expression evaluation for IF conditions and SET assignments
// ABOUTME: Substitutes scope values into the token stream, then parses and evaluates

pub mod parser;

use tracing::trace;

use self::parser::{tokenize, Parser, Token};
use super::error::{Result, TemplateError};
use super::path::{self, is_word_char};
use super::scope::Scope;
use super::value::{has_leading_zero, parse_numeric, Value};

/// Longest bare identifier eligible for the atomic truthiness shortcut
const MAX_ATOMIC_IDENTIFIER: usize = 64;

/// Evaluate an expression against the scope.
///
/// A lone bare identifier short-circuits to the truthiness of its binding
/// (absent names are simply false). Anything else goes through substitution
/// and the parser; syntax errors and runtime faults become
/// [`TemplateError::Evaluation`].
pub fn evaluate(expression: &str, scope: &Scope) -> Result<Value> {
    let raw = expression.trim();
    if let Some(truth) = atomic_truthiness(raw, scope) {
        return Ok(Value::Bool(truth));
    }

    let tokens = tokenize(raw).map_err(|message| TemplateError::evaluation(raw, message))?;
    let tokens = substitute(tokens, scope, has_arithmetic_operator(raw));
    trace!(expression = raw, ?tokens, "evaluating expression");

    Parser::new(tokens)
        .parse()
        .and_then(|expr| expr.eval())
        .map_err(|message| TemplateError::evaluation(raw, message))
}

/// Evaluate the right-hand side of an assignment. A sole name or path that
/// resolves to something is stored as-is, so collections and zero-padded
/// codes keep their shape; everything else is evaluated.
pub fn evaluate_assignment(expression: &str, scope: &Scope) -> Result<Value> {
    let raw = expression.trim();
    let whole = if path::is_dotted_path(raw) {
        path::resolve(raw, scope)
    } else if is_bare_identifier(raw) {
        scope.get(raw).cloned().unwrap_or_default()
    } else {
        Value::Null
    };
    if whole.is_null() {
        evaluate(raw, scope)
    } else {
        Ok(whole)
    }
}

/// Empty values turn into `0` instead of `""` when the expression contains
/// any arithmetic operator character. Operators inside string literals count
/// too; this heuristic is deliberately kept as-is.
pub fn has_arithmetic_operator(expression: &str) -> bool {
    expression.contains(['+', '-', '*', '/'])
}

fn atomic_truthiness(raw: &str, scope: &Scope) -> Option<bool> {
    if raw.len() > MAX_ATOMIC_IDENTIFIER || !is_bare_identifier(raw) {
        return None;
    }
    if matches!(raw.to_ascii_lowercase().as_str(), "true" | "false" | "null") {
        return None;
    }
    Some(scope.get(raw).map(Value::is_truthy).unwrap_or(false))
}

fn is_bare_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_') && chars.all(is_word_char)
}

fn substitute(tokens: Vec<Token>, scope: &Scope, arithmetic: bool) -> Vec<Token> {
    tokens
        .into_iter()
        .map(|token| match token {
            Token::Ident(name) if name.contains('.') => {
                literal_for(&path::resolve(&name, scope), arithmetic)
            }
            Token::Ident(name) => match scope.get(&name) {
                Some(value) => literal_for(value, arithmetic),
                None => Token::Ident(name),
            },
            other => other,
        })
        .collect()
}

/// Turn a resolved value into the literal the parser sees
fn literal_for(value: &Value, arithmetic: bool) -> Token {
    if value.is_collection() {
        return Token::Literal(Value::Bool(value.is_truthy()));
    }
    let text = value.to_text();
    if text.trim().is_empty() {
        return Token::Literal(if arithmetic {
            Value::Number(0.0)
        } else {
            Value::String(String::new())
        });
    }
    match parse_numeric(&text) {
        Some(number) if !has_leading_zero(&text) => Token::Literal(Value::Number(number)),
        _ => Token::Literal(Value::String(text)),
    }
}
