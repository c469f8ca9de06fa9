use clap::Parser;
use hashup::cli::cmd::Commands;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CommandLine {
    #[clap(subcommand)]
    command: Commands,
}

pub fn main() -> ExitCode {
    let command_line = CommandLine::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match command_line.command {
        Commands::Consul { command } => hashup::cli::cmd::consul::run(command),
        Commands::Nomad { command } => hashup::cli::cmd::nomad::run(command),
        Commands::Vault { command } => hashup::cli::cmd::vault::run(command),
        Commands::Boundary { command } => hashup::cli::cmd::boundary::run(command),
    }
}
