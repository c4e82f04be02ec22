// ABOUTME: Dotted path resolution against a scope
// ABOUTME: Walks model attributes, record keys and sequence indexes, yielding Null on any miss

use super::scope::Scope;
use super::value::Value;

/// Resolve `a.b.c` against the scope.
///
/// A binding whose key is the whole dotted path wins. Otherwise the root
/// segment is looked up (exact, then case-insensitive) and each following
/// segment is read from the current model, record or sequence. Missing
/// pieces resolve to [`Value::Null`] rather than failing.
pub fn resolve(path: &str, scope: &Scope) -> Value {
    let path = path.trim();
    if let Some(value) = scope.get(path) {
        return value.clone();
    }

    let mut segments = path.split('.');
    let root = match segments.next().and_then(|name| scope.get_ignore_case(name)) {
        Some(value) if value.is_collection() => value.clone(),
        _ => return Value::Null,
    };

    segments.try_fold(root, |current, segment| step(&current, segment.trim())).unwrap_or_default()
}

/// Read one segment from a value
pub fn step(current: &Value, segment: &str) -> Option<Value> {
    if segment.is_empty() {
        return None;
    }
    match current {
        Value::Model(model) => model.attribute(segment),
        Value::Record(map) => map.get(segment).cloned(),
        Value::Sequence(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index))
            .cloned(),
        _ => None,
    }
}

/// True for `name.attr` style tokens made of word characters
pub fn is_dotted_path(text: &str) -> bool {
    text.contains('.')
        && !text.starts_with(|c: char| c.is_ascii_digit())
        && text
            .split('.')
            .all(|segment| !segment.is_empty() && segment.chars().all(is_word_char))
}

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
