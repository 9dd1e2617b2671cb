//! Muuk CLI - a Cargo-like package manager and build orchestrator for C++

use std::path::Path;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};
use muuk::ops;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("muuk=debug")
    } else if cli.quiet {
        EnvFilter::new("muuk=error")
    } else {
        EnvFilter::new("muuk=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let root = Path::new(".");

    match cli.command {
        Commands::Init(args) => ops::init::execute(root, args.name.as_deref()),
        Commands::Add(args) => ops::add::execute(
            root,
            &ops::AddOptions {
                spec: args.spec,
                version: args.version,
                git: args.git,
                muuk_path: args.muuk_path,
                system: args.system,
                target: args.target,
            },
        ),
        Commands::Remove(args) => ops::remove::execute(root, &args.name),
        Commands::Install => ops::install::execute(root),
        Commands::Build(args) => ops::build::execute(
            root,
            &ops::BuildOptions {
                target: args.target,
                compiler: args.compiler,
                profile: args.profile,
            },
        ),
        Commands::Clean => ops::clean::execute(root),
        Commands::Run(args) => ops::run::execute(root, &args.script, &args.args),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            clap_complete::generate(args.shell, &mut command, "muuk", &mut std::io::stdout());
            Ok(())
        }
    }
}
