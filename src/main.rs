use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod build;
mod commands;
mod config;
mod util;

#[derive(Parser)]
#[command(name = "quire", version, about = "A static site generator for Markdown blogs")]
struct Args {
    /// Log what each build stage is doing
    #[arg(short, long, global = true)]
    verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    command: QuireCommand,
}

#[derive(Parser)]
struct InitArgs {
    /// The path to initialize the project in
    path: PathBuf,

    /// Whether to create the directory if it doesn't exist
    #[arg(long, default_value = "false")]
    create: bool,

    /// Title written to the new config file
    #[arg(long, default_value = "My Quire Blog")]
    title: String,
}

#[derive(Parser)]
struct BuildArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "quire.yaml")]
    config_file: Option<PathBuf>,

    /// Remove files in the output directory that this build doesn't produce
    #[arg(long, default_value = "false")]
    clean: bool,

    /// Include posts marked as drafts
    #[arg(long, default_value = "false")]
    drafts: bool,
}

#[derive(Parser)]
struct ServeArgs {
    /// The address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// The port to bind to
    #[arg(short, long, default_value = "4000")]
    port: u16,

    /// Open the site in the default browser
    #[arg(short, long, default_value = "false")]
    open: bool,

    /// The path to the configuration file
    #[arg(short, long, default_value = "quire.yaml")]
    config_file: Option<PathBuf>,

    /// Whether to watch for changes and rebuild automatically
    #[arg(short, long, default_value = "true", action = clap::ArgAction::Set)]
    watch: bool,

    /// Include posts marked as drafts
    #[arg(long, default_value = "false")]
    drafts: bool,
}

#[derive(Parser)]
struct CleanArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "quire.yaml")]
    config_file: Option<PathBuf>,

    /// Only print what would be deleted
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

#[derive(Subcommand)]
enum QuireCommand {
    /// Initialize a new Quire blog
    Init(InitArgs),

    /// Build the site once
    Build(BuildArgs),

    /// Build the site and serve it on a local port
    Serve(ServeArgs),

    /// Remove the generated site
    Clean(CleanArgs),
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    // --verbose enables DEBUG for quire, otherwise use RUST_LOG or default to INFO
    let filter = if args.verbose {
        EnvFilter::new("quire=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        QuireCommand::Init(args) => {
            commands::init::run(&args).await?;
        }
        QuireCommand::Build(args) => {
            commands::build::run(&args).await?;
        }
        QuireCommand::Serve(args) => {
            commands::serve::run(&args).await?;
        }
        QuireCommand::Clean(args) => {
            commands::clean::run(&args).await?;
        }
    }

    Ok(())
}
