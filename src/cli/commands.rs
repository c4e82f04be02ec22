// ABOUTME: Command implementations for the stencil CLI
// ABOUTME: Handles execution of the render and check commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::config::Config;
use crate::template::scanner::{self, DirectiveKind};
use crate::template::{DiagnosticKind, Scope, TemplateEngine};

/// Inputs of the render command
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub templates: Vec<PathBuf>,
    pub data: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub keep_globals: bool,
}

/// Render templates in order and write the documents to the output file or stdout
pub async fn render_templates(request: RenderRequest, config: &Config) -> Result<()> {
    let scope = build_scope(request.data.as_deref(), config).await?;
    info!("Rendering {} template(s) with {} variables", request.templates.len(), scope.len());

    let mut engine = engine_for(config, request.templates.first().map(PathBuf::as_path));
    let mut documents = Vec::with_capacity(request.templates.len());

    for (index, template_path) in request.templates.iter().enumerate() {
        let template = tokio::fs::read_to_string(template_path)
            .await
            .with_context(|| format!("Failed to read template {}", template_path.display()))?;

        let reset_globals = index == 0 || !request.keep_globals;
        let rendered = engine
            .render_with(&template, &scope, reset_globals)
            .with_context(|| format!("Failed to render {}", template_path.display()))?;

        let problems = engine.errors().len();
        if problems > 0 {
            warn!("{} problem(s) while rendering {}", problems, template_path.display());
        }
        engine.flush_errors();
        documents.push(rendered);
    }

    let document = documents.join("\n");
    match request.output {
        Some(output_path) => {
            tokio::fs::write(&output_path, &document)
                .await
                .with_context(|| format!("Failed to write output file {}", output_path.display()))?;
            info!("Rendered document written to: {}", output_path.display());
        }
        None => print!("{}", document),
    }

    Ok(())
}

/// List the placeholders of a template and fail on structural problems
pub async fn check_template(template_path: PathBuf, config: &Config) -> Result<()> {
    info!("Checking template: {}", template_path.display());

    let template = tokio::fs::read_to_string(&template_path)
        .await
        .with_context(|| format!("Failed to read template {}", template_path.display()))?;

    let placeholders = scanner::scan(&template);
    for placeholder in &placeholders {
        let marker = if placeholder.unterminated { " (unterminated)" } else { "" };
        println!(
            "{:<12} {}{}",
            kind_label(placeholder.kind),
            first_line(&placeholder.directive),
            marker
        );
    }

    let mut engine = engine_for(config, Some(&template_path)).with_log_errors(false);
    engine
        .render(&template, &Scope::new())
        .with_context(|| format!("Failed to render {}", template_path.display()))?;

    let structural: Vec<_> = engine
        .errors()
        .iter()
        .filter(|diagnostic| diagnostic.kind == DiagnosticKind::Block)
        .collect();
    for diagnostic in &structural {
        println!("error: {}", diagnostic);
    }

    if !structural.is_empty() {
        return Err(anyhow::anyhow!(
            "Template {} has {} structural problem(s)",
            template_path.display(),
            structural.len()
        ));
    }

    println!("✓ Template '{}' is valid", template_path.display());
    println!("  Placeholders: {}", placeholders.len());

    Ok(())
}

/// Engine from the config; without a configured root, imports resolve next to the template
fn engine_for(config: &Config, template_path: Option<&Path>) -> TemplateEngine {
    let engine = config.template_engine();
    if config.template_root.is_some() {
        return engine;
    }
    match template_path.and_then(Path::parent) {
        Some(parent) if parent.as_os_str().is_empty() => engine.with_template_root("."),
        Some(parent) => engine.with_template_root(parent),
        None => engine,
    }
}

/// Variables from the data file, overlaid with configured and command line variables
async fn build_scope(data: Option<&Path>, config: &Config) -> Result<Scope> {
    let mut scope = match data {
        Some(path) => load_data(path).await?,
        None => Scope::new(),
    };
    scope.extend(config.template_vars.clone());
    Ok(scope)
}

/// Load a JSON or YAML mapping of template variables
pub async fn load_data(path: &Path) -> Result<Scope> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read data file {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let data: serde_json::Value = if is_yaml {
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?
    };

    if !data.is_object() {
        return Err(anyhow::anyhow!(
            "Data file {} must contain a mapping of variables",
            path.display()
        ));
    }
    Ok(Scope::from_json(data))
}

fn kind_label(kind: DirectiveKind) -> &'static str {
    match kind {
        DirectiveKind::Conditional => "if",
        DirectiveKind::Loop => "for",
        DirectiveKind::Assignment => "set",
        DirectiveKind::Import => "import",
        DirectiveKind::Pipeline => "value",
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
