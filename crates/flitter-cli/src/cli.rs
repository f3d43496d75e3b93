//! Argument parsing (§11): a `#[derive(Parser)]` `Cli`/`Command` pair, in
//! the style of `plotnik-cli::cli`'s derive-based surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "flitter", bin_name = "flitter")]
#[command(about = "Live-coded declarative scene-language engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile and run one frame, printing the graph, pragmas, errors, and logs
    Run(RunArgs),
    /// Print the simplified instruction stream for a compiled program
    Dump(DumpArgs),
    /// Compile without running; exits non-zero on internal compile errors
    Check(CheckArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Debug-AST file to compile and run (.fl.ron)
    pub file: PathBuf,

    /// RON-serialized persistent state to seed this run from, and to write
    /// back to once the run finishes
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Instruction budget for this run; unlimited if omitted
    #[arg(long, value_name = "N")]
    pub fuel: Option<u64>,

    /// Seed a global variable as `name=value`, where `value` is a RON
    /// literal (`Num([1.0])`, `Str("hi")`); repeatable
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

#[derive(Args)]
pub struct DumpArgs {
    /// Debug-AST file to compile and disassemble (.fl.ron)
    pub file: PathBuf,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Debug-AST file to compile and validate (.fl.ron)
    pub file: PathBuf,
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    s.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())).ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_splits_on_first_equals() {
        assert_eq!(parse_var("x=1").unwrap(), ("x".to_string(), "1".to_string()));
        assert_eq!(parse_var("path=a=b").unwrap(), ("path".to_string(), "a=b".to_string()));
    }

    #[test]
    fn parse_var_rejects_missing_equals() {
        assert!(parse_var("x").is_err());
    }
}
