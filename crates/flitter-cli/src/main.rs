mod ast_ron;
mod cli;
mod commands;
mod loader;
mod state_ron;

use clap::Parser;

use cli::{Cli, Command};

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => commands::run::run(args),
        Command::Dump(args) => commands::dump::run(args),
        Command::Check(args) => commands::check::run(args),
    }
}
