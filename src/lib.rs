// ABOUTME: Main library module for the stencil template engine
// ABOUTME: Exports the template engine and the command line application

pub mod cli;
pub mod template;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use template::{
    DefaultFormatter, FileSystemSource, ForceReplace, Formatter, Model, Scope, TemplateEngine,
    TemplateError, TemplateSource, Value,
};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
