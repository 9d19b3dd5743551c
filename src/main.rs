//! Bengal - an incremental static site generator.

#![allow(dead_code)]

mod asset;
mod build;
mod cache;
mod cli;
mod config;
mod content;
mod core;
mod devloop;
mod incremental;
mod logger;
mod postprocess;
mod render;
mod theme;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, NewTarget};
use config::{SiteConfig, init_config};

fn main() -> Result<()> {
    // Global Ctrl+C handler before any blocking operations.
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {
            // NO_COLOR and non-TTY stdout disable color.
            if std::env::var_os("NO_COLOR").is_some() {
                owo_colors::set_override(false);
            }
        }
    }

    let code = match cli.command {
        Commands::Build { build_args } => cli::build::run(build_args),
        Commands::Serve {
            build_args,
            host,
            port,
            open,
            watch: _,
            no_watch,
        } => cli::serve::run(build_args, host, port, open, no_watch),
        Commands::New { target } => match target {
            NewTarget::Site { name } => exit_from(cli::new::new_site(&name)),
            NewTarget::Page { path } => {
                let config = load_config()?;
                exit_from(cli::new::new_page(&config, &path))
            }
        },
        Commands::Clean { force } => {
            let config = load_config()?;
            exit_from(cli::clean::run(&config, force))
        }
        Commands::Theme { action } => {
            let config = load_config()?;
            exit_from(cli::theme::run(&config, &action))
        }
        Commands::Autodoc { kind } => {
            let config = load_config()?;
            exit_from(cli::autodoc::run(&config, kind.as_deref()))
        }
        Commands::Graph { tree, stats } => {
            let config = load_config()?;
            exit_from(cli::graph::run(&config, tree, stats))
        }
    };

    std::process::exit(code);
}

fn load_config() -> Result<std::sync::Arc<SiteConfig>> {
    let cwd = std::env::current_dir()?;
    Ok(init_config(SiteConfig::discover(&cwd)?))
}

fn exit_from(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            log!("error"; "{e:#}");
            1
        }
    }
}
