//! The `build` command driver.
//!
//! Exit codes: 0 success, 2 page errors under --strict, 3 fatal
//! config/discovery error.

use std::sync::Arc;

use anyhow::Result;

use super::args::BuildArgs;
use crate::build::{self, BuildInput, ExplainMode};
use crate::config::{SiteConfig, init_config};
use crate::core::BuildMode;
use crate::devloop::StatsWire;
use crate::logger;
use crate::utils::plural;

pub const EXIT_OK: i32 = 0;
pub const EXIT_PAGE_ERRORS: i32 = 2;
pub const EXIT_FATAL: i32 = 3;

/// Resolve config, honoring the output override.
pub fn load_config(args: &BuildArgs) -> Result<Arc<SiteConfig>> {
    let cwd = std::env::current_dir()?;
    let mut config = SiteConfig::discover(&cwd)?;
    if let Some(output) = &args.output {
        config.build.output_dir = output.clone();
    }
    if args.strict {
        config.build.strict = true;
    }
    Ok(init_config(config))
}

/// Translate CLI flags into a BuildInput.
pub fn build_input(config: &SiteConfig, args: &BuildArgs, mode: BuildMode) -> BuildInput {
    let mut input = BuildInput::new(mode, config.config_hash());
    input.incremental = args.incremental;
    input.force = args.force;
    input.dry_run = args.dry_run;
    input.strict = args.strict || config.build.strict;
    input.drafts = args.drafts;
    input.parallel = if args.sequential {
        Some(false)
    } else {
        args.parallel
    };
    input.explain = if args.explain_json {
        ExplainMode::Json
    } else if args.explain {
        ExplainMode::Table
    } else {
        ExplainMode::Off
    };
    input
}

/// Run one build; returns the process exit code.
pub fn run(mut args: BuildArgs) -> i32 {
    args.apply_profile();
    logger::set_verbose(args.verbose);
    logger::set_quiet(args.quiet);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            crate::log!("error"; "{e:#}");
            return EXIT_FATAL;
        }
    };

    // Out-of-process builds get their input handed over as JSON.
    let input = match &args.input_json {
        Some(path) => match read_input(path) {
            Ok(input) => input,
            Err(e) => {
                crate::log!("error"; "{e:#}");
                return EXIT_FATAL;
            }
        },
        None => build_input(&config, &args, BuildMode::Production),
    };

    let strict = input.strict;
    match build::build(&config, &input) {
        Ok(stats) => {
            if let Some(path) = &args.emit_stats {
                let wire = StatsWire::from_stats(&stats);
                if let Ok(body) = serde_json::to_vec(&wire) {
                    let _ = crate::utils::atomic::write_atomic(path, &body);
                }
            }
            if stats.page_errors.is_empty() {
                EXIT_OK
            } else {
                crate::log!("error"; "{} page{} failed",
                    stats.page_errors.len(), plural::s(stats.page_errors.len()));
                for error in &stats.page_errors {
                    crate::log!("error"; "  {error}");
                }
                if strict { EXIT_PAGE_ERRORS } else { EXIT_OK }
            }
        }
        Err(e) => {
            crate::log!("error"; "{e:#}");
            EXIT_FATAL
        }
    }
}

fn read_input(path: &std::path::Path) -> Result<BuildInput> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}
