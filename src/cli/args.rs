// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and the render and check subcommands for stencil

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stencil")]
#[command(about = "Render {{ placeholder }} templates with conditions, loops and directive pipelines")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render one or more template files in order
    Render {
        #[arg(required = true, help = "Template files to render")]
        templates: Vec<PathBuf>,

        #[arg(short = 'V', long = "var", help = "Template variable (key=value)")]
        vars: Vec<String>,

        #[arg(short, long, help = "JSON or YAML file with template variables")]
        data: Option<PathBuf>,

        #[arg(short, long, help = "Write the rendered document to this file")]
        output: Option<PathBuf>,

        #[arg(
            long,
            help = "Replace placeholders without a value with this text (empty to remove them)"
        )]
        force_replace: Option<String>,

        #[arg(long, help = "Separator between directive arguments")]
        arg_separator: Option<char>,

        #[arg(long, help = "Directory that imports and @references are loaded from")]
        root: Option<PathBuf>,

        #[arg(long, help = "Keep SET globals from one template to the next")]
        keep_globals: bool,
    },

    /// List the placeholders of a template and report structural problems
    Check {
        #[arg(help = "Path to the template file")]
        template: PathBuf,

        #[arg(long, help = "Directory that imports and @references are loaded from")]
        root: Option<PathBuf>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format
    pub fn parse_variables(vars: &[String]) -> anyhow::Result<HashMap<String, String>> {
        let mut variables = HashMap::new();

        for var in vars {
            if let Some((key, value)) = var.split_once('=') {
                let key = key.trim();
                if key.is_empty() {
                    return Err(anyhow::anyhow!("Variable '{}' has an empty name", var));
                }
                variables.insert(key.to_string(), value.to_string());
            } else {
                return Err(anyhow::anyhow!(
                    "Invalid variable format '{}'. Expected 'key=value'",
                    var
                ));
            }
        }

        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variables() {
        let vars = vec![
            "name=John Doe".to_string(),
            "expr=a=b".to_string(),
            "empty=".to_string(),
        ];

        let parsed = Args::parse_variables(&vars).unwrap();

        assert_eq!(parsed.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(parsed.get("expr"), Some(&"a=b".to_string()));
        assert_eq!(parsed.get("empty"), Some(&String::new()));
    }

    #[test]
    fn test_parse_variables_invalid() {
        assert!(Args::parse_variables(&["invalid_format".to_string()]).is_err());
        assert!(Args::parse_variables(&["=value".to_string()]).is_err());
    }

    #[test]
    fn test_render_arguments() {
        let args = Args::try_parse_from([
            "stencil",
            "render",
            "invoice.html",
            "-V",
            "name=John",
            "--force-replace",
            "",
            "--arg-separator",
            ",",
        ])
        .unwrap();

        match args.command {
            Commands::Render {
                templates,
                vars,
                force_replace,
                arg_separator,
                keep_globals,
                ..
            } => {
                assert_eq!(templates, vec![PathBuf::from("invoice.html")]);
                assert_eq!(vars, vec!["name=John".to_string()]);
                assert_eq!(force_replace, Some(String::new()));
                assert_eq!(arg_separator, Some(','));
                assert!(!keep_globals);
            }
            Commands::Check { .. } => panic!("expected render"),
        }
    }
}
