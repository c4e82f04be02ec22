// ABOUTME: Import directive that renders another template in place
// ABOUTME: The imported text sees the current scope and SET globals

use std::sync::Arc;
use tracing::debug;

use crate::template::directives::unquote;
use crate::template::engine::Renderer;
use crate::template::error::{Result, TemplateError};
use crate::template::scope::Scope;
use crate::template::value::Value;

/// Evaluate `import name`. Loading failures abort the render; a template
/// that imports itself, directly or indirectly, is recorded and skipped.
pub(crate) fn evaluate(renderer: &mut Renderer<'_>, directive: &str, scope: &Arc<Scope>) -> Result<Value> {
    let argument = directive
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default();
    let name = unquote(argument).unwrap_or(argument);

    let text = match renderer.source() {
        Some(source) => source.load(name)?,
        None => return Err(TemplateError::NoTemplateSource(name.to_string())),
    };

    if !renderer.enter_import(name) {
        renderer.record(TemplateError::block("import", format!("'{}' imports itself", name)));
        return Ok(Value::Null);
    }
    debug!("Importing template '{}'", name);
    let rendered = renderer.render(&text, scope);
    renderer.leave_import();

    Ok(Value::String(rendered?))
}
