mod cli;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cagebox::orchestrator::{self, SandboxConfig};
use cagebox::{BindMount, ProfileLoader};
use cli::Cli;

fn default_profile_search_path() -> Vec<PathBuf> {
    let mut path = vec![PathBuf::from("/etc/cagebox/profiles"), PathBuf::from("./profiles")];
    if let Some(data_dir) = dirs::data_dir() {
        path.push(data_dir.join("cagebox/profiles"));
    }
    path
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut search_path = cli.profile_path;
    search_path.extend(default_profile_search_path());

    let loader = ProfileLoader::new(search_path);
    let profile = loader.load(&cli.profile)?;

    let binds = cli
        .bind
        .iter()
        .map(|spec| BindMount::parse(spec))
        .collect::<Result<Vec<_>, _>>()?;

    let config = SandboxConfig {
        profile,
        binds,
        argv: cli.command,
    };

    let classification = orchestrator::run(config)?;
    tracing::info!(?classification, "sandboxed child terminated");
    Ok(classification.exit_code())
}

fn main() {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("cagebox: {error}");
            process::exit(1);
        }
    }
}
