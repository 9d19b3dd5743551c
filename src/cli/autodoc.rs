//! The `autodoc` command: run documentation extractors.
//!
//! Extractors are external commands configured under `[autodoc.*]`; their
//! output lands in `.bengal/generated/` and is discovered as autodoc pages
//! on the next build.

use anyhow::{Context, Result, bail};

use crate::config::SiteConfig;
use crate::config::section::Extractor;

const KINDS: &[&str] = &["python", "api", "cli"];

pub fn run(config: &SiteConfig, kind: Option<&str>) -> Result<()> {
    let selected: Vec<&str> = match kind {
        Some(kind) => {
            if !KINDS.contains(&kind) {
                bail!("unknown extractor {kind:?}; expected one of {KINDS:?}");
            }
            vec![kind]
        }
        None => KINDS.to_vec(),
    };

    let mut ran = 0;
    for kind in selected {
        let Some(extractor) = config.autodoc.extractor(kind) else {
            continue;
        };
        run_extractor(config, kind, extractor)?;
        ran += 1;
    }

    if ran == 0 {
        crate::log!("autodoc"; "no extractors configured; add [autodoc.python] etc. to bengal.toml");
    } else {
        crate::log!("autodoc"; "{ran} extractor(s) finished; run a build to publish");
    }
    Ok(())
}

fn run_extractor(config: &SiteConfig, kind: &str, extractor: &Extractor) -> Result<()> {
    let Some(program) = extractor.command.first() else {
        bail!("[autodoc.{kind}] has an empty command");
    };

    let output_dir = config
        .generated_dir()
        .join(extractor.output.clone().unwrap_or_else(|| kind.into()));
    std::fs::create_dir_all(&output_dir)?;

    crate::log!("autodoc"; "running {kind} extractor: {}", extractor.command.join(" "));
    let status = std::process::Command::new(program)
        .args(&extractor.command[1..])
        .current_dir(&config.root)
        .env("BENGAL_AUTODOC_OUT", &output_dir)
        .status()
        .with_context(|| format!("failed to start [autodoc.{kind}] command {program:?}"))?;

    if !status.success() {
        bail!("[autodoc.{kind}] extractor exited with {status}");
    }
    Ok(())
}
