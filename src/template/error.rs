// ABOUTME: Error types for template engine operations
// ABOUTME: Defines hard faults returned to callers and the recoverable faults kept as diagnostics

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Expression error: {message} in expression [{expression}]")]
    Evaluation { expression: String, message: String },

    #[error("Unsupported directive [{0}]")]
    UnsupportedDirective(String),

    #[error("Directive '{directive}' failed: {message}")]
    Directive { directive: String, message: String },

    #[error("Invalid {block} block: {message}")]
    Block {
        block: &'static str,
        message: String,
    },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template path '{path}' escapes template root {}", .root.display())]
    PathEscapesRoot { path: String, root: PathBuf },

    #[error("Template root does not exist: {}", .0.display())]
    MissingTemplateRoot(PathBuf),

    #[error("No template source configured, cannot load '{0}'")]
    NoTemplateSource(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TemplateError {
    pub(crate) fn evaluation(expression: &str, message: impl Into<String>) -> Self {
        Self::Evaluation {
            expression: expression.trim().to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn directive(directive: &str, message: impl Into<String>) -> Self {
        Self::Directive {
            directive: directive.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn block(block: &'static str, message: impl Into<String>) -> Self {
        Self::Block {
            block,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;
