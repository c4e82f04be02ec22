// ABOUTME: Recoverable render faults collected while a document is processed
// ABOUTME: Diagnostics never abort a render; they are inspected by callers or logged on flush

use serde::Serialize;
use std::fmt;
use tracing::{debug, error};

use super::error::TemplateError;

/// Longest template excerpt attached to logged diagnostics
const EXCERPT_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Evaluation,
    UnsupportedDirective,
    Directive,
    Block,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<TemplateError> for Diagnostic {
    fn from(error: TemplateError) -> Self {
        let kind = match &error {
            TemplateError::Evaluation { .. } => DiagnosticKind::Evaluation,
            TemplateError::UnsupportedDirective(_) => DiagnosticKind::UnsupportedDirective,
            TemplateError::Directive { .. } => DiagnosticKind::Directive,
            TemplateError::Block { .. } => DiagnosticKind::Block,
            _ => DiagnosticKind::Other,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: TemplateError) {
        let diagnostic = Diagnostic::from(error);
        debug!(kind = ?diagnostic.kind, "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Log every pending diagnostic at error level and forget them
    pub fn flush(&mut self, template: Option<&str>) {
        let excerpt = template.map(excerpt).unwrap_or_default();
        for diagnostic in self.entries.drain(..) {
            error!(kind = ?diagnostic.kind, template = %excerpt, "{}", diagnostic.message);
        }
    }
}

/// First line-collapsed characters of a template
pub fn excerpt(template: &str) -> String {
    let collapsed: String = template.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= EXCERPT_CHARS {
        return collapsed;
    }
    let head: String = collapsed.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", head)
}
