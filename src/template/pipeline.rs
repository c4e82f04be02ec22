// ABOUTME: Directive pipeline dispatcher for value-output placeholders
// ABOUTME: Splits `a | b(x; y)` into stages and resolves each against paths, scope, built-ins and custom directives

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::diagnostics::Diagnostics;
use super::directives::{self, DirectiveContext, MAX_ARGUMENTS};
use super::error::TemplateError;
use super::format::Formatter;
use super::path;
use super::scope::Scope;
use super::value::Value;

pub const DEFAULT_ARG_SEPARATOR: char = ';';

/// A host-supplied directive. Receives the running value and the raw,
/// unsplit argument text.
pub type DirectiveFn = Arc<dyn Fn(&Value, Option<&str>) -> Value + Send + Sync>;

/// Registry of custom directives, looked up by exact name
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    directives: HashMap<String, DirectiveFn>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directive, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, directive: F)
    where
        F: Fn(&Value, Option<&str>) -> Value + Send + Sync + 'static,
    {
        self.directives.insert(name.into(), Arc::new(directive));
    }

    pub fn get(&self, name: &str) -> Option<&DirectiveFn> {
        self.directives.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.directives.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("directives", &self.names())
            .finish()
    }
}

/// One `name(args)` stage of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Stage<'a> {
    pub name: &'a str,
    pub raw_args: Option<&'a str>,
}

/// Split text on `delimiter` wherever it is not inside single or double quotes
fn split_unquoted(text: &str, delimiter: char, limit: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (index, c) in text.char_indices() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == delimiter && parts.len() + 1 < limit => {
                parts.push(&text[start..index]);
                start = index + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

pub fn split_stages(pipeline: &str) -> Vec<&str> {
    split_unquoted(pipeline, '|', usize::MAX)
        .into_iter()
        .map(str::trim)
        .filter(|stage| !stage.is_empty())
        .collect()
}

pub fn parse_stage(stage: &str) -> Stage<'_> {
    match stage.split_once('(') {
        Some((name, rest)) => {
            let rest = rest.trim();
            let rest = rest.strip_suffix(')').unwrap_or(rest).trim();
            Stage {
                name: name.trim(),
                raw_args: (!rest.is_empty()).then_some(rest),
            }
        }
        None => Stage {
            name: stage.trim(),
            raw_args: None,
        },
    }
}

/// Split raw arguments on the separator, trimming each; at most three are
/// produced and the last keeps any remaining separators
pub fn split_args(raw: &str, separator: char) -> Vec<String> {
    let raw = raw.trim_matches(|c: char| c.is_whitespace() || c == separator);
    if raw.is_empty() {
        return Vec::new();
    }
    split_unquoted(raw, separator, MAX_ARGUMENTS)
        .into_iter()
        .map(|arg| arg.trim().to_string())
        .collect()
}

/// Everything a pipeline needs to resolve its stages
pub struct Dispatcher<'a> {
    pub scope: &'a Scope,
    pub formatter: &'a dyn Formatter,
    pub directives: &'a DirectiveRegistry,
    pub separator: char,
}

impl<'a> Dispatcher<'a> {
    /// Run every stage of the pipeline over `current`. Failing stages leave
    /// the value unchanged and record a diagnostic.
    pub fn apply(&self, pipeline: &str, current: Value, diagnostics: &mut Diagnostics) -> Value {
        split_stages(pipeline)
            .into_iter()
            .fold(current, |value, stage| self.apply_stage(parse_stage(stage), value, diagnostics))
    }

    fn apply_stage(&self, stage: Stage<'_>, current: Value, diagnostics: &mut Diagnostics) -> Value {
        let name = stage.name;
        if name.is_empty() {
            return current;
        }

        if name.contains('.') {
            let resolved = path::resolve(name, self.scope);
            return match (resolved.is_null(), current.is_null()) {
                (true, _) => current,
                (false, true) => resolved,
                (false, false) => Value::String(
                    format!("{} {}", current.to_text(), resolved.to_text())
                        .trim()
                        .to_string(),
                ),
            };
        }

        if let Some(value) = self.scope.get(name) {
            return value.clone();
        }

        if let Some(builtin) = directives::builtin(name) {
            let args = stage
                .raw_args
                .map(|raw| split_args(raw, self.separator))
                .unwrap_or_default();
            let ctx = DirectiveContext {
                formatter: self.formatter,
                scope: self.scope,
            };
            return match builtin(&ctx, current.clone(), &args) {
                Ok(value) => value,
                Err(message) => {
                    diagnostics.record(TemplateError::directive(name, message));
                    current
                }
            };
        }

        if let Some(custom) = self.directives.get(name) {
            return custom(&current, stage.raw_args);
        }

        diagnostics.record(TemplateError::UnsupportedDirective(name.to_string()));
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::format::DefaultFormatter;
    use serde_json::json;

    fn run(pipeline: &str, registry: &DirectiveRegistry, separator: char) -> (Value, Diagnostics) {
        let scope = Scope::from_json(json!({
            "customer": {"name": "John Doe", "email": "john@doe.com"},
            "robert": "Robert",
            "price": 12.5
        }));
        let formatter = DefaultFormatter::new();
        let dispatcher = Dispatcher {
            scope: &scope,
            formatter: &formatter,
            directives: registry,
            separator,
        };
        let mut diagnostics = Diagnostics::new();
        let value = dispatcher.apply(pipeline, Value::Null, &mut diagnostics);
        (value, diagnostics)
    }

    #[test]
    fn test_split_stages_respects_quotes() {
        assert_eq!(
            split_stages("name | replace(\"a|b\"; 'c') | upper"),
            vec!["name", "replace(\"a|b\"; 'c')", "upper"]
        );
        assert_eq!(split_stages(" | upper |"), vec!["upper"]);
    }

    #[test]
    fn test_parse_stage() {
        assert_eq!(
            parse_stage("truncate(8; \"XYZ\")"),
            Stage {
                name: "truncate",
                raw_args: Some("8; \"XYZ\"")
            }
        );
        assert_eq!(parse_stage("upper"), Stage { name: "upper", raw_args: None });
        assert_eq!(parse_stage("round()"), Stage { name: "round", raw_args: None });
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("8; \"XYZ\"", ';'), vec!["8", "\"XYZ\""]);
        assert_eq!(split_args("'a;b'; c", ';'), vec!["'a;b'", "c"]);
        assert_eq!(split_args("a, b, c, d", ','), vec!["a", "b", "c, d"]);
        assert!(split_args(" ; ", ';').is_empty());
    }

    #[test]
    fn test_path_stages_append() {
        let registry = DirectiveRegistry::new();
        let (value, diagnostics) = run(
            "customer.name | concat(\"with contact email\") | customer.email",
            &registry,
            ';',
        );
        assert_eq!(value.to_text(), "John Doe with contact email john@doe.com");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_scope_key_replaces_running_value() {
        let registry = DirectiveRegistry::new();
        let (value, _) = run("customer.name | robert | upper", &registry, ';');
        assert_eq!(value.to_text(), "ROBERT");
    }

    #[test]
    fn test_custom_directive_receives_raw_args() {
        let mut registry = DirectiveRegistry::new();
        registry.register("coloredText", |value: &Value, args: Option<&str>| {
            Value::String(format!(
                "<span style=\"color: {}\">{}</span>",
                args.unwrap_or("black"),
                value.to_text()
            ))
        });
        let (value, _) = run("robert | coloredText(red)", &registry, ';');
        assert_eq!(value.to_text(), "<span style=\"color: red\">Robert</span>");
    }

    #[test]
    fn test_unsupported_directive_is_recorded() {
        let registry = DirectiveRegistry::new();
        let (value, diagnostics) = run("robert | sparkle | upper", &registry, ';');
        assert_eq!(value.to_text(), "ROBERT");
        assert_eq!(diagnostics.entries()[0].message, "Unsupported directive [sparkle]");
    }

    #[test]
    fn test_failing_builtin_keeps_value() {
        let registry = DirectiveRegistry::new();
        let (value, diagnostics) = run("robert | truncate(lots)", &registry, ';');
        assert_eq!(value.to_text(), "Robert");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_alternate_separator() {
        let registry = DirectiveRegistry::new();
        let (value, _) = run("concat('BBB', '+') | concat('AAA', ' - ')", &registry, ',');
        assert_eq!(value.to_text(), "BBB - AAA");
    }
}
