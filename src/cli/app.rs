// ABOUTME: Main application orchestration for the stencil CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands::{self, RenderRequest};
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration. Logs go to stderr so
    /// rendered documents can be piped from stdout.
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        match self.config.logging.format.as_str() {
            "compact" => {
                tracing_subscriber::fmt()
                    .compact()
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting stencil v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Render {
                templates,
                vars,
                data,
                output,
                force_replace,
                arg_separator,
                root,
                keep_globals,
            } => {
                let variables = Args::parse_variables(&vars)?;
                self.config.merge_variables(variables);
                if force_replace.is_some() {
                    self.config.force_replace = force_replace;
                }
                if let Some(separator) = arg_separator {
                    self.config.arg_separator = separator;
                }
                if root.is_some() {
                    self.config.template_root = root;
                }

                let request = RenderRequest {
                    templates,
                    data,
                    output,
                    keep_globals,
                };
                commands::render_templates(request, &self.config).await
            }

            Commands::Check { template, root } => {
                if root.is_some() {
                    self.config.template_root = root;
                }
                commands::check_template(template, &self.config).await
            }
        }
    }

    /// Create application from command line arguments
    pub async fn from_args(args: &Args) -> Result<Self> {
        let config = Config::load(args.config.clone())?;
        Ok(Self::new(config))
    }
}
