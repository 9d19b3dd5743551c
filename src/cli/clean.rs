//! The `clean` command: delete the output directory.

use std::io::Write;

use anyhow::Result;

use crate::config::SiteConfig;

pub fn run(config: &SiteConfig, force: bool) -> Result<()> {
    let output_dir = config.output_dir();
    if !output_dir.exists() {
        crate::log!("clean"; "nothing to clean");
        return Ok(());
    }

    if !force && !confirm(&format!("delete {}?", output_dir.display()))? {
        crate::log!("clean"; "aborted");
        return Ok(());
    }

    std::fs::remove_dir_all(&output_dir)?;
    crate::log!("clean"; "removed {}", output_dir.display());
    Ok(())
}

/// Interactive confirmation; non-interactive sessions must pass --force.
fn confirm(question: &str) -> Result<bool> {
    if !crate::logger::is_interactive() {
        crate::log!("clean"; "non-interactive session, pass --force to confirm");
        return Ok(false);
    }
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn force_removes_output() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        std::fs::create_dir_all(config.output_dir().join("docs")).unwrap();
        std::fs::write(config.output_dir().join("index.html"), "x").unwrap();

        run(&config, true).unwrap();
        assert!(!config.output_dir().exists());
    }

    #[test]
    fn missing_output_is_fine() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        run(&config, true).unwrap();
    }
}
