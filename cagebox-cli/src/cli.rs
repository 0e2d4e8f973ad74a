//! CLI definition for cagebox-cli.
//!
//! Argument parsing is a thin external collaborator, not part of the
//! sandboxing core. This module exists only so the workspace has a
//! runnable entry point that wires the core components together behind
//! a small, stable command-line grammar.

use std::path::PathBuf;

use clap::Parser;

/// Form: `cagebox --profile=<name> [--bind=<spec>]... -- <program> [arg...]`.
#[derive(Parser, Debug)]
#[command(name = "cagebox", author, version, about = "Kernel-enforced process sandbox launcher")]
pub struct Cli {
    /// Required, exactly one.
    #[arg(long)]
    pub profile: String,

    /// `<source>:<target>[:ro]`, repeatable.
    #[arg(long = "bind")]
    pub bind: Vec<String>,

    /// Extra profile search directories, checked before the compiled-in
    /// defaults.
    #[arg(long, env = "CAGEBOX_PROFILE_PATH", value_delimiter = ':')]
    pub profile_path: Vec<PathBuf>,

    /// Everything after the `--` terminator: the target program and argv.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}
