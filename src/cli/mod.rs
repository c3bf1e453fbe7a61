pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{app, ConfigResult, Container};

#[derive(Parser)]
#[command(name = "rest-reference")]
#[command(about = "REST reference API - serve, inspect configuration, issue tokens")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Environment to build (defaults to APP_ENV, then dev)")]
    pub env: Option<String>,

    #[arg(long, global = true, help = "Directory holding <env>.yaml layers")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve(commands::serve::ServeArgs),

    #[command(about = "Inspect the resolved configuration")]
    Config {
        #[command(subcommand)]
        cmd: commands::config::ConfigCommands,
    },

    #[command(about = "Token utilities")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Environment and config directory chosen on the command line
#[derive(Debug, Clone)]
pub struct Target {
    pub environment: String,
    pub config_dir: PathBuf,
}

impl Target {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            environment: cli.env.clone().unwrap_or_else(app::active_environment),
            config_dir: cli.config_dir.clone().unwrap_or_else(app::config_dir),
        }
    }

    pub fn build(&self) -> ConfigResult<Container> {
        app::build_container(&self.environment, &self.config_dir)
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let target = Target::from_cli(&cli);

    match cli.command {
        None => commands::serve::handle(commands::serve::ServeArgs::default(), &target).await,
        Some(Commands::Serve(args)) => commands::serve::handle(args, &target).await,
        Some(Commands::Config { cmd }) => commands::config::handle(cmd, &target, output_format),
        Some(Commands::Token { cmd }) => commands::token::handle(cmd, &target, output_format),
    }
}
