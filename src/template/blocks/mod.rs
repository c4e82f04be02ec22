// ABOUTME: Block evaluators for IF, FOR, SET and import placeholders
// ABOUTME: Each evaluator receives the directive text and renders nested bodies through the renderer

pub mod assign;
pub mod conditional;
pub mod import;
pub mod loops;

use super::engine::Renderer;
use std::sync::Arc;

use super::error::Result;
use super::scope::Scope;

/// Render the trimmed text between two byte offsets of a block
fn render_body(renderer: &mut Renderer<'_>, block: &str, start: usize, end: usize, scope: &Arc<Scope>) -> Result<String> {
    let body = block.get(start..end).unwrap_or_default().trim();
    renderer.render(body, scope)
}
