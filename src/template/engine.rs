// ABOUTME: Template engine that renders {{ ... }} placeholders against a scope
// ABOUTME: Owns settings, SET globals, diagnostics and render resources for one engine instance

use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace};

use super::blocks;
use super::diagnostics::{self, Diagnostic, Diagnostics};
use super::error::{Result, TemplateError};
use super::format::{DefaultFormatter, Formatter};
use super::pipeline::{DirectiveRegistry, Dispatcher, DEFAULT_ARG_SEPARATOR};
use super::scanner::{self, DirectiveKind, Placeholder};
use super::scope::Scope;
use super::source::{FileSystemSource, TemplateSource};
use super::value::Value;

/// What to write for a placeholder that produced no value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForceReplace {
    /// Leave the placeholder text in the document
    #[default]
    Off,
    /// Remove the placeholder
    Empty,
    /// Write this text instead
    Literal(String),
}

/// Snapshot of what the engine has rendered so far
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderResources {
    /// Placeholder text to the substitution written for it
    pub results: IndexMap<String, String>,
    /// Placeholder text to its trimmed directive
    pub placeholders: IndexMap<String, String>,
    /// Excerpt of the first top-level template rendered
    pub first_template: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub force_replace: ForceReplace,
    pub arg_separator: char,
    pub log_errors: bool,
    pub directives: DirectiveRegistry,
    pub formatter: Arc<dyn Formatter>,
    pub source: Option<Arc<dyn TemplateSource>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            force_replace: ForceReplace::Off,
            arg_separator: DEFAULT_ARG_SEPARATOR,
            log_errors: true,
            directives: DirectiveRegistry::new(),
            formatter: Arc::new(DefaultFormatter::new()),
            source: None,
        }
    }
}

/// Renders templates. Rendering takes `&mut self` because SET globals,
/// diagnostics and resources are updated; clone the engine to render from
/// several threads.
#[derive(Debug)]
pub struct TemplateEngine {
    settings: Arc<Settings>,
    globals: Arc<Scope>,
    diagnostics: Diagnostics,
    resources: RenderResources,
}

impl TemplateEngine {
    /// Create a new template engine with default settings
    pub fn new() -> Self {
        Self {
            settings: Arc::new(Settings::default()),
            globals: Arc::default(),
            diagnostics: Diagnostics::new(),
            resources: RenderResources::default(),
        }
    }

    fn settings_mut(&mut self) -> &mut Settings {
        Arc::make_mut(&mut self.settings)
    }

    pub fn set_force_replace(&mut self, force_replace: ForceReplace) {
        self.settings_mut().force_replace = force_replace;
    }

    pub fn with_force_replace(mut self, force_replace: ForceReplace) -> Self {
        self.set_force_replace(force_replace);
        self
    }

    pub fn force_replace(&self) -> &ForceReplace {
        &self.settings.force_replace
    }

    pub fn set_arg_separator(&mut self, separator: char) {
        self.settings_mut().arg_separator = separator;
    }

    pub fn with_arg_separator(mut self, separator: char) -> Self {
        self.set_arg_separator(separator);
        self
    }

    pub fn arg_separator(&self) -> char {
        self.settings.arg_separator
    }

    /// Log pending diagnostics when they are flushed or the engine is dropped
    pub fn set_log_errors(&mut self, log_errors: bool) {
        self.settings_mut().log_errors = log_errors;
    }

    pub fn with_log_errors(mut self, log_errors: bool) -> Self {
        self.set_log_errors(log_errors);
        self
    }

    /// Register a custom directive, callable as `{{ value | name(args) }}`
    pub fn register_directive<F>(&mut self, name: impl Into<String>, directive: F)
    where
        F: Fn(&Value, Option<&str>) -> Value + Send + Sync + 'static,
    {
        self.settings_mut().directives.register(name, directive);
    }

    pub fn with_directive<F>(mut self, name: impl Into<String>, directive: F) -> Self
    where
        F: Fn(&Value, Option<&str>) -> Value + Send + Sync + 'static,
    {
        self.register_directive(name, directive);
        self
    }

    pub fn set_formatter(&mut self, formatter: impl Formatter + 'static) {
        self.settings_mut().formatter = Arc::new(formatter);
    }

    pub fn with_formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.set_formatter(formatter);
        self
    }

    pub fn set_source(&mut self, source: impl TemplateSource + 'static) {
        self.settings_mut().source = Some(Arc::new(source));
    }

    pub fn with_source(mut self, source: impl TemplateSource + 'static) -> Self {
        self.set_source(source);
        self
    }

    /// Load `@name` references, `import` directives and files from this directory
    pub fn with_template_root(self, root: impl Into<PathBuf>) -> Self {
        self.with_source(FileSystemSource::new(root))
    }

    /// Render a template, starting from an empty global table
    pub fn render(&mut self, template: &str, scope: &Scope) -> Result<String> {
        self.render_with(template, scope, true)
    }

    /// Render a template, optionally keeping globals set by earlier renders.
    ///
    /// Text of the form `@name` is loaded through the template source first.
    /// Only template loading failures are returned as errors; every other
    /// fault is kept as a diagnostic and the placeholder is left to the
    /// force-replace policy.
    pub fn render_with(&mut self, template: &str, scope: &Scope, reset_globals: bool) -> Result<String> {
        if reset_globals {
            self.globals = Arc::default();
        }

        let loaded;
        let template = match reference_name(template) {
            Some(name) => {
                loaded = self.load(name)?;
                loaded.as_str()
            }
            None => template,
        };

        if self.resources.first_template.is_none() {
            self.resources.first_template = Some(diagnostics::excerpt(template));
        }

        self.renderer().render(template, &Arc::new(scope.clone()))
    }

    /// Load a template by name from the template source and render it
    pub fn render_file(&mut self, name: &str, scope: &Scope) -> Result<String> {
        let template = self.load(name)?;
        self.render(&template, scope)
    }

    fn load(&self, name: &str) -> Result<String> {
        match &self.settings.source {
            Some(source) => source.load(name),
            None => Err(TemplateError::NoTemplateSource(name.to_string())),
        }
    }

    fn renderer(&mut self) -> Renderer<'_> {
        Renderer {
            settings: &self.settings,
            globals: &mut self.globals,
            diagnostics: &mut self.diagnostics,
            resources: &mut self.resources,
            imports: Vec::new(),
        }
    }

    /// Variables assigned with SET during the last render
    pub fn globals(&self) -> &Scope {
        &self.globals
    }

    pub fn errors(&self) -> &[Diagnostic] {
        self.diagnostics.entries()
    }

    pub fn clear_errors(&mut self) {
        self.diagnostics.clear();
    }

    /// Log pending diagnostics through `tracing` if logging is enabled, then clear them
    pub fn flush_errors(&mut self) {
        if self.settings.log_errors {
            let template = self.resources.first_template.as_deref();
            self.diagnostics.flush(template);
        } else {
            self.diagnostics.clear();
        }
    }

    pub fn resources(&self) -> &RenderResources {
        &self.resources
    }

    pub fn reset_resources(&mut self) {
        self.resources = RenderResources::default();
    }

    /// Check if a string contains template expressions
    pub fn has_placeholders(text: &str) -> bool {
        scanner::has_placeholders(text)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones share settings and globals but start with no diagnostics or resources
impl Clone for TemplateEngine {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            globals: Arc::clone(&self.globals),
            diagnostics: Diagnostics::new(),
            resources: RenderResources::default(),
        }
    }
}

impl Drop for TemplateEngine {
    fn drop(&mut self) {
        if !self.diagnostics.is_empty() {
            self.flush_errors();
        }
    }
}

/// `@name` with no whitespace names a template to load
fn reference_name(template: &str) -> Option<&str> {
    let name = template.strip_prefix('@')?;
    (!name.is_empty() && !name.contains(char::is_whitespace)).then_some(name)
}

/// One render pass. Borrows the engine's settings immutably and its
/// mutable state exclusively, so block evaluators can recurse through it.
pub(crate) struct Renderer<'a> {
    settings: &'a Settings,
    globals: &'a mut Arc<Scope>,
    diagnostics: &'a mut Diagnostics,
    resources: &'a mut RenderResources,
    /// Names of the templates currently being imported, innermost last
    imports: Vec<String>,
}

impl<'a> Renderer<'a> {
    /// Render text whose placeholders see `scope` overlaid with the globals
    pub fn render(&mut self, template: &str, scope: &Arc<Scope>) -> Result<String> {
        if !scanner::has_placeholders(template) {
            return Ok(template.to_string());
        }

        let placeholders = scanner::scan(template);
        debug!("Rendering {} placeholders", placeholders.len());

        let mut output = String::with_capacity(template.len());
        let mut cursor = 0;
        for placeholder in &placeholders {
            let bindings = Arc::new(Scope::layered([Arc::clone(self.globals), Arc::clone(scope)]));
            let value = self.evaluate(placeholder, &bindings)?;
            let replacement = match value {
                Value::Null => match &self.settings.force_replace {
                    ForceReplace::Off => None,
                    ForceReplace::Empty => Some(String::new()),
                    ForceReplace::Literal(text) => Some(text.clone()),
                },
                value => Some(value.to_text()),
            };
            trace!(placeholder = %placeholder.text, ?replacement, "evaluated placeholder");

            self.resources
                .placeholders
                .insert(placeholder.text.clone(), placeholder.directive.clone());
            output.push_str(&template[cursor..placeholder.start]);
            match replacement {
                Some(text) => {
                    output.push_str(&text);
                    self.resources.results.insert(placeholder.text.clone(), text);
                }
                None => output.push_str(&placeholder.text),
            }
            cursor = placeholder.end;
        }
        output.push_str(&template[cursor..]);

        Ok(output)
    }

    fn evaluate(&mut self, placeholder: &Placeholder, scope: &Arc<Scope>) -> Result<Value> {
        if placeholder.unterminated {
            let (block, closer) = match placeholder.kind {
                DirectiveKind::Loop => ("for", "endfor"),
                _ => ("if", "endif"),
            };
            self.record(TemplateError::block(block, format!("missing {{{{ {} }}}}", closer)));
            return Ok(Value::Null);
        }

        match placeholder.kind {
            DirectiveKind::Conditional => blocks::conditional::evaluate(self, &placeholder.directive, scope),
            DirectiveKind::Loop => blocks::loops::evaluate(self, &placeholder.directive, scope),
            DirectiveKind::Assignment => Ok(blocks::assign::evaluate(self, &placeholder.directive, scope)),
            DirectiveKind::Import => blocks::import::evaluate(self, &placeholder.directive, scope),
            DirectiveKind::Pipeline => {
                let dispatcher = Dispatcher {
                    scope: scope.as_ref(),
                    formatter: self.settings.formatter.as_ref(),
                    directives: &self.settings.directives,
                    separator: self.settings.arg_separator,
                };
                Ok(dispatcher.apply(&placeholder.directive, Value::Null, self.diagnostics))
            }
        }
    }

    pub fn record(&mut self, error: TemplateError) {
        self.diagnostics.record(error);
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        Arc::make_mut(self.globals).insert(name, value);
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    pub fn source(&self) -> Option<&dyn TemplateSource> {
        self.settings.source.as_deref()
    }

    /// Mark a template as being imported; false if it already is
    pub fn enter_import(&mut self, name: &str) -> bool {
        if self.imports.iter().any(|active| active == name) {
            return false;
        }
        self.imports.push(name.to_string());
        true
    }

    pub fn leave_import(&mut self) {
        self.imports.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Scope {
        Scope::from_json(json!({
            "name": "John",
            "customer": {"name": "John Doe", "email": "john@doe.com"},
            "items": [1, 2, 3]
        }))
    }

    #[test]
    fn test_basic_template_rendering() {
        let mut engine = TemplateEngine::new();
        let result = engine.render("Hello {{ name }}!", &scope()).unwrap();
        assert_eq!(result, "Hello John!");
    }

    #[test]
    fn test_text_without_placeholders_is_unchanged() {
        let mut engine = TemplateEngine::new();
        assert_eq!(engine.render("plain {{ text", &scope()).unwrap(), "plain {{ text");
    }

    #[test]
    fn test_force_replace_modes() {
        let template = "Hi {{ nobody }} and {{ name }}";

        let mut engine = TemplateEngine::new();
        assert_eq!(engine.render(template, &scope()).unwrap(), "Hi {{ nobody }} and John");

        engine.set_force_replace(ForceReplace::Empty);
        assert_eq!(engine.render(template, &scope()).unwrap(), "Hi  and John");

        engine.set_force_replace(ForceReplace::Literal("?".to_string()));
        assert_eq!(engine.render(template, &scope()).unwrap(), "Hi ? and John");
    }

    #[test]
    fn test_unsupported_directive_recorded_once_per_occurrence() {
        let mut engine = TemplateEngine::new().with_log_errors(false);
        engine
            .render("{{ name | sparkle }} {{ name | sparkle }}", &scope())
            .unwrap();
        assert_eq!(engine.errors().len(), 2);
        engine.clear_errors();
        assert!(engine.errors().is_empty());
    }

    #[test]
    fn test_globals_reset_unless_kept() {
        let mut engine = TemplateEngine::new();
        engine.render("{{ set total = 5 }}", &scope()).unwrap();
        assert_eq!(engine.globals().get("total"), Some(&Value::Number(5.0)));

        let kept = engine.render_with("{{ total }}", &scope(), false).unwrap();
        assert_eq!(kept, "5");

        let reset = engine.render("{{ total }}", &scope()).unwrap();
        assert_eq!(reset, "{{ total }}");
    }

    #[test]
    fn test_resources_track_results() {
        let mut engine = TemplateEngine::new();
        engine.render("A {{ customer.name | upper }} B", &scope()).unwrap();

        let resources = engine.resources();
        assert_eq!(resources.results["{{ customer.name | upper }}"], "JOHN DOE");
        assert_eq!(resources.placeholders["{{ customer.name | upper }}"], "customer.name | upper");
        assert_eq!(resources.first_template.as_deref(), Some("A {{ customer.name | upper }} B"));

        engine.reset_resources();
        assert!(engine.resources().results.is_empty());
    }

    #[test]
    fn test_reference_without_source_fails() {
        let mut engine = TemplateEngine::new();
        let result = engine.render("@invoice.html", &scope());
        assert!(matches!(result, Err(TemplateError::NoTemplateSource(_))));
        assert_eq!(engine.render("@ not a reference", &scope()).unwrap(), "@ not a reference");
    }

    #[test]
    fn test_clone_shares_settings_not_diagnostics() {
        let mut engine = TemplateEngine::new()
            .with_log_errors(false)
            .with_directive("shout", |value: &Value, _: Option<&str>| {
                Value::String(format!("{}!", value.to_text()))
            });
        engine.render("{{ name | nope }}", &scope()).unwrap();

        let mut copy = engine.clone();
        assert!(copy.errors().is_empty());
        assert_eq!(copy.render("{{ name | shout }}", &scope()).unwrap(), "John!");
    }

    #[test]
    fn test_unterminated_block_is_a_diagnostic() {
        let mut engine = TemplateEngine::new().with_log_errors(false);
        let result = engine.render("{{ if name }}never closed", &scope()).unwrap();
        assert_eq!(result, "{{ if name }}never closed");
        assert_eq!(engine.errors().len(), 1);
    }
}
