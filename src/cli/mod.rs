//! Command-line interface for pixbatch
//!
//! Argument parsing with clap, logging setup, and dispatch to the command
//! implementations in [`commands`].

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

pub mod commands;
mod output;

pub use output::Output;

/// pixbatch - generate resized, grayscale and blurred derivatives for a directory of images
#[derive(Parser)]
#[command(
    name = "pixbatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Bounded-parallel batch generation of image derivatives",
    long_about = "pixbatch turns every image in a directory into thumbnail, small, medium, large, \
                  grayscale and blurred JPEG derivatives, running a bounded number of workers at once."
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Run as if started in <DIR> instead of current working directory
    #[arg(short = 'C', long = "directory", global = true)]
    pub directory: Option<String>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Generate derivatives for every image in a directory
    Run(commands::run::RunArgs),
    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Show version information
    Version,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved configuration
    Show {
        /// Output format
        #[arg(long, value_enum, default_value = "toml")]
        format: commands::config::ConfigFormat,
    },
    /// Validate the resolved configuration
    Validate,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);

        match self.command {
            Some(Commands::Run(args)) => commands::run::execute(args, self.config.as_deref(), &output).await,
            Some(Commands::Config(cmd)) => commands::config::execute(cmd, self.config.as_deref(), &output).await,
            Some(Commands::Version) => commands::version::execute(&output).await,
            None => {
                // Show help when no command is provided
                let mut cmd = Cli::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info,ignore=warn,globset=warn"),
        2 => tracing_subscriber::EnvFilter::new("debug,ignore=warn,globset=warn"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
