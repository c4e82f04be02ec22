// ABOUTME: SET directive evaluation storing values in the engine's global table
// ABOUTME: Globals outlive the placeholder so later placeholders and loop iterations see them

use std::borrow::Cow;
use std::sync::Arc;

use crate::template::engine::Renderer;
use crate::template::error::TemplateError;
use crate::template::expression;
use crate::template::path;
use crate::template::scope::Scope;
use crate::template::value::Value;

fn parse_assignment(argument: &str) -> Option<(&str, &str)> {
    let (name, expression) = argument.split_once('=')?;
    let name = name.trim();
    let valid = name.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && name.chars().all(path::is_word_char);
    valid.then_some((name, expression.trim()))
}

/// Evaluate `set name = expression`. Renders as empty text on success;
/// faults are recorded and leave the placeholder without a value.
pub(crate) fn evaluate(renderer: &mut Renderer<'_>, directive: &str, scope: &Arc<Scope>) -> Value {
    let argument = directive
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest)
        .unwrap_or_default();
    let Some((name, expression)) = parse_assignment(argument) else {
        renderer.record(TemplateError::block(
            "set",
            format!("expected 'name = expression', got '{}'", argument.trim()),
        ));
        return Value::Null;
    };

    if !renderer.has_global(name) {
        renderer.set_global(name, Value::Null);
    }
    let scope = if scope.contains(name) {
        Cow::Borrowed(scope.as_ref())
    } else {
        Cow::Owned(Scope::layered([Arc::clone(scope)]).with(name, Value::Null))
    };

    match expression::evaluate_assignment(expression, &scope) {
        Ok(value) => {
            renderer.set_global(name, value);
            Value::String(String::new())
        }
        Err(error) => {
            renderer.record(error);
            Value::Null
        }
    }
}
