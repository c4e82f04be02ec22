// ABOUTME: Template engine module for {{ ... }} placeholder documents
// ABOUTME: Provides scanning, expression evaluation, directive pipelines and block rendering

pub(crate) mod blocks;
pub mod diagnostics;
pub mod directives;
pub mod engine;
pub mod error;
pub mod expression;
pub mod format;
pub mod model;
pub mod path;
pub mod pipeline;
pub mod scanner;
pub mod scope;
pub mod source;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use engine::{ForceReplace, RenderResources, TemplateEngine};
pub use error::{Result, TemplateError};
pub use format::{DefaultFormatter, Formatter};
pub use model::Model;
pub use pipeline::DirectiveRegistry;
pub use scope::Scope;
pub use source::{FileSystemSource, TemplateSource};
pub use value::Value;
